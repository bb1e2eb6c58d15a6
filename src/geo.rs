use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::registry::{Province, PROVINCES};

/// Geolocation is a best-effort enhancement, so its timeout is short and
/// independent of the main fetch timeout.
const GEO_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_CITY: &str = "istanbul";

/// One representative city per supported country. Unmapped countries fall
/// back to the default city.
const COUNTRY_CITIES: &[(&str, &str)] = &[
    ("TR", "istanbul"),
    ("DE", "berlin"),
    ("NL", "amsterdam"),
    ("FR", "paris"),
    ("GB", "londra"),
    ("US", "new-york"),
    ("AT", "viyana"),
    ("BE", "bruksel"),
    ("CH", "zurih"),
    ("SE", "stokholm"),
    ("DK", "kopenhag"),
    ("NO", "oslo"),
    ("AU", "sidney"),
    ("CA", "toronto"),
    ("AZ", "baku"),
    ("SA", "riyad"),
    ("AE", "dubai"),
];

pub fn representative_city(country_code: &str) -> Option<&'static str> {
    COUNTRY_CITIES
        .iter()
        .find(|(code, _)| *code == country_code)
        .map(|(_, city)| *city)
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    city: Option<String>,
}

/// Best-effort (countryCode, cityName) for a caller address.
#[derive(Debug, Clone)]
pub struct GeoLocation {
    pub country_code: String,
    pub city: String,
}

/// Addresses the third-party lookup can never place: loopback, unspecified,
/// RFC 1918 / link-local v4, and non-global v6 ranges.
pub fn is_private_or_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local and fe80::/10 link-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Look up a caller address with the third-party geolocation service.
///
/// Returns None ("undetected") on any failure: private/loopback address,
/// timeout, non-success status in the payload, or missing fields. Callers
/// fall back to the default city; this never surfaces as an error.
pub async fn locate_ip(client: &reqwest::Client, base_url: &str, ip: IpAddr) -> Option<GeoLocation> {
    if is_private_or_loopback(ip) {
        tracing::debug!("geo: {} is private/loopback, skipping lookup", ip);
        return None;
    }

    let url = format!("{}/json/{}?fields=status,countryCode,city", base_url, ip);
    let response = client
        .get(&url)
        .timeout(GEO_TIMEOUT)
        .send()
        .await
        .ok()?
        .json::<IpApiResponse>()
        .await
        .ok()?;

    if response.status != "success" {
        tracing::debug!("geo: lookup for {} returned status {}", ip, response.status);
        return None;
    }
    Some(GeoLocation {
        country_code: response.country_code?,
        city: response.city?,
    })
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Closest province to a coordinate. Ties go to the earlier table entry.
pub fn nearest_province(lat: f64, lng: f64) -> (&'static Province, f64) {
    let mut best = &PROVINCES[0];
    let mut best_distance = haversine_km(lat, lng, best.lat, best.lng);
    for province in &PROVINCES[1..] {
        let distance = haversine_km(lat, lng, province.lat, province.lng);
        if distance < best_distance {
            best = province;
            best_distance = distance;
        }
    }
    (best, best_distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_haversine_zero_at_same_point() {
        assert_eq!(haversine_km(41.01, 28.98, 41.01, 28.98), 0.0);
    }

    #[test]
    fn test_haversine_istanbul_ankara() {
        let km = haversine_km(41.01, 28.98, 39.93, 32.86);
        // Roughly 350 km between the two city centers.
        assert!((300.0..400.0).contains(&km), "got {km}");
    }

    #[test]
    fn test_nearest_exact_coordinates() {
        let (province, distance) = nearest_province(41.01, 28.98);
        assert_eq!(province.name, "İstanbul");
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_nearest_offset_point() {
        // A point in the Ankara region.
        let (province, distance) = nearest_province(39.8, 32.9);
        assert_eq!(province.name, "Ankara");
        assert!(distance < 50.0);
    }

    #[test]
    fn test_representative_city() {
        assert_eq!(representative_city("DE"), Some("berlin"));
        assert_eq!(representative_city("TR"), Some("istanbul"));
        assert_eq!(representative_city("ZZ"), None);
    }

    #[test]
    fn test_private_and_loopback_detection() {
        assert!(is_private_or_loopback("127.0.0.1".parse().unwrap()));
        assert!(is_private_or_loopback("10.0.0.5".parse().unwrap()));
        assert!(is_private_or_loopback("192.168.1.1".parse().unwrap()));
        assert!(is_private_or_loopback("::1".parse().unwrap()));
        assert!(is_private_or_loopback("fe80::1".parse().unwrap()));
        assert!(!is_private_or_loopback("8.8.8.8".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_locate_ip_skips_loopback() {
        let client = reqwest::Client::new();
        // No server behind this base URL; must short-circuit before any I/O.
        let result = locate_ip(&client, "http://127.0.0.1:9", "127.0.0.1".parse().unwrap()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_locate_ip_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/8.8.8.8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "countryCode": "US",
                "city": "Mountain View",
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let location = locate_ip(&client, &server.uri(), "8.8.8.8".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(location.country_code, "US");
        assert_eq!(location.city, "Mountain View");
    }

    #[tokio::test]
    async fn test_locate_ip_failure_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail",
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let result = locate_ip(&client, &server.uri(), "8.8.8.8".parse().unwrap()).await;
        assert!(result.is_none());
    }
}
