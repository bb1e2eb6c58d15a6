use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{FixedOffset, Utc};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::cache::TtlCache;
use crate::error::ApiError;
use crate::extract::extract;
use crate::fetch::{fetch_html, FetchOptions};
use crate::geo::{locate_ip, nearest_province, representative_city, GeoLocation, DEFAULT_CITY};
use crate::registry::{slugify, CityRegistry, PROVINCES};
use crate::resolve::{discover, resolve, Resolution, Sources};

/// How many registry entries the bulk endpoint fetches concurrently.
const BULK_PREFIX: usize = 10;

pub struct AppState {
    pub client: reqwest::Client,
    pub registry: CityRegistry,
    /// Standard lookups, 30 min TTL by default.
    pub cache: TtlCache,
    /// Auto/global lookups, 15 min TTL by default.
    pub auto_cache: TtlCache,
    pub fetch_opts: FetchOptions,
    pub sources: Sources,
    pub geo_base: String,
    pub start_time: Instant,
}

/// Today in Turkish local time (UTC+3), formatted DD.MM.YYYY.
fn today_tr() -> String {
    let turkey = FixedOffset::east_opt(3 * 3600).expect("valid offset");
    Utc::now().with_timezone(&turkey).format("%d.%m.%Y").to_string()
}

/// Host part of a source base URL, used as the record's source tag.
fn source_tag(base: &str) -> &str {
    base.trim_start_matches("https://").trim_start_matches("http://")
}

/// The data-fetch-and-normalize pipeline behind every prayer-time route:
/// resolve the identifier, short-circuit on a cache hit, fetch with retries,
/// extract, fall back to the secondary source on a content-shape miss, then
/// cache the record.
async fn lookup_city(state: &AppState, input: &str, cache: &TtlCache) -> Result<Value, ApiError> {
    let resolution = resolve(&state.registry, input).await;

    let cache_key = match &resolution {
        Resolution::Known(m) => m.slug.clone(),
        Resolution::RawDistrict { district_id } => format!("district-{district_id}"),
        Resolution::NeedsDiscovery { slug } => slug.clone(),
    };

    if let Some(mut cached) = cache.get(&cache_key).await {
        tracing::info!("{}: cache hit", cache_key);
        cached["source"] = json!("cache");
        return Ok(cached);
    }

    // Only now is discovery worth its probe cost.
    let mapping = match resolution {
        Resolution::Known(m) => Some(m),
        Resolution::NeedsDiscovery { slug } => Some(
            discover(&state.client, &state.registry, &state.sources, &slug)
                .await
                .ok_or_else(|| ApiError::UnknownCity {
                    requested: input.to_string(),
                })?,
        ),
        Resolution::RawDistrict { .. } => None,
    };

    let primary_url = match (&mapping, resolution_district_id(&cache_key)) {
        (Some(m), _) => state.sources.primary_url(m.district_id, &m.slug),
        (None, Some(id)) => state.sources.raw_district_url(id),
        (None, None) => unreachable!("raw district resolution always carries an id"),
    };

    tracing::info!("{}: fetching {}", cache_key, primary_url);
    let html = fetch_html(&state.client, &primary_url, &state.fetch_opts)
        .await
        .map_err(|e| ApiError::Upstream {
            city: input.to_string(),
            source: e,
        })?;

    let mut extracted = extract(&html);
    let mut source = source_tag(&state.sources.primary_base).to_string();

    // Primary page fetched but yielded nothing usable: try the news portal
    // before giving up. Its failure is not fatal here.
    if extracted.times.is_empty() {
        if let Some(m) = &mapping {
            let secondary_url = state.sources.secondary_url(&m.slug);
            tracing::info!("{}: primary had no fields, trying {}", cache_key, secondary_url);
            match fetch_html(&state.client, &secondary_url, &state.fetch_opts).await {
                Ok(html) => {
                    let fallback = extract(&html);
                    if !fallback.times.is_empty() {
                        extracted = fallback;
                        source = source_tag(&state.sources.secondary_base).to_string();
                    }
                }
                Err(e) => tracing::warn!("{}: secondary source failed: {}", cache_key, e),
            }
        }
    }

    if extracted.times.is_empty() {
        return Err(ApiError::NoData {
            city: input.to_string(),
        });
    }

    let city_label = extracted
        .city_label
        .or_else(|| mapping.as_ref().map(|m| m.label.clone()))
        .unwrap_or_else(|| input.to_string());

    let record = json!({
        "success": true,
        "city": city_label,
        "date": today_tr(),
        "prayerTimes": extracted.times,
        "source": source,
        "timestamp": Utc::now().to_rfc3339(),
    });

    cache.set(&cache_key, record.clone()).await;
    Ok(record)
}

fn resolution_district_id(cache_key: &str) -> Option<&str> {
    cache_key.strip_prefix("district-")
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "🕌 Namaz Vakitleri API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/prayer-times/:city": "Şehir namaz vakitleri (81 il destekleniyor)",
            "/prayer-times/:city/:date": "Belirli bir tarih için namaz vakitleri",
            "/all-prayer-times": "Toplu namaz vakitleri",
            "/prayer-times-by-location": "Koordinata en yakın şehir (?lat=&lng=)",
            "/prayer-times-auto": "IP adresine göre otomatik şehir",
            "/prayer-times-global": "IP adresine göre otomatik şehir (yurt dışı)",
            "/cities": "Tüm illerin listesi",
            "/health": "Sağlık kontrolü",
        },
        "examples": [
            "/prayer-times/istanbul",
            "/prayer-times/ankara",
            "/prayer-times/izmir",
            "/prayer-times/antalya",
        ],
        "totalCities": PROVINCES.len(),
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "cacheEntries": state.cache.entry_count().await + state.auto_cache.entry_count().await,
        "uptimeSecs": state.start_time.elapsed().as_secs(),
    }))
}

pub async fn cities() -> Json<Value> {
    let slugs = CityRegistry::city_slugs();
    Json(json!({
        "success": true,
        "count": slugs.len(),
        "cities": slugs,
        "note": "Tüm 81 il için namaz vakitleri mevcut",
    }))
}

pub async fn prayer_times(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = lookup_city(&state, &city, &state.cache).await?;
    Ok(Json(record))
}

/// Same pipeline; the supplied date is echoed back literally, not validated
/// against the source page's date.
pub async fn prayer_times_for_date(
    State(state): State<Arc<AppState>>,
    Path((city, date)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let mut record = lookup_city(&state, &city, &state.cache).await?;
    record["date"] = json!(date);
    Ok(Json(record))
}

/// Concurrently fetch a fixed prefix of the registry, tolerating individual
/// failures. Partial results are returned, never an overall failure.
pub async fn all_prayer_times(State(state): State<Arc<AppState>>) -> Json<Value> {
    let targets: Vec<String> = PROVINCES
        .iter()
        .take(BULK_PREFIX)
        .map(|p| slugify(p.name))
        .collect();

    let lookups = targets
        .iter()
        .map(|slug| lookup_city(&state, slug, &state.cache));
    let results = join_all(lookups).await;

    let mut cities = Vec::new();
    let mut failures = Vec::new();
    for (slug, result) in targets.iter().zip(results) {
        match result {
            Ok(record) => cities.push(record),
            Err(e) => failures.push(json!({ "city": slug, "message": e.to_string() })),
        }
    }

    Json(json!({
        "successfulCities": cities.len(),
        "failedCities": failures.len(),
        "cities": cities,
        "failures": failures,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: f64,
    pub lng: f64,
}

pub async fn prayer_times_by_location(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<Value>, ApiError> {
    let (province, distance_km) = nearest_province(query.lat, query.lng);
    tracing::info!(
        "location ({}, {}): closest city {} at {:.1} km",
        query.lat,
        query.lng,
        province.name,
        distance_km
    );

    let mut record = lookup_city(&state, &slugify(province.name), &state.cache).await?;
    record["closestCity"] = json!(province.name);
    record["distanceKm"] = json!((distance_km * 100.0).round() / 100.0);
    record["coordinates"] = json!({ "lat": query.lat, "lng": query.lng });
    Ok(Json(record))
}

/// Pick a city for a geolocated caller. A Turkish city reported by the
/// lookup is used directly when the registry knows it; otherwise the
/// country's representative city; otherwise the default.
fn city_for_location(location: &GeoLocation) -> String {
    if location.country_code == "TR" {
        let slug = slugify(&location.city);
        if CityRegistry::static_lookup(&slug).is_some() {
            return slug;
        }
    }
    representative_city(&location.country_code)
        .unwrap_or(DEFAULT_CITY)
        .to_string()
}

fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| addr.ip())
}

/// IP-derived lookup with the emergency fallback chain: primary city via the
/// normal pipeline, then the default city's cache entry, then a fresh fetch
/// of the default city, then hard failure.
async fn auto_lookup(state: &AppState, ip: IpAddr) -> Result<(Value, Option<GeoLocation>), ApiError> {
    let location = locate_ip(&state.client, &state.geo_base, ip).await;
    let chosen = match &location {
        Some(loc) => city_for_location(loc),
        None => DEFAULT_CITY.to_string(),
    };
    tracing::info!("auto: {} -> {}", ip, chosen);

    match lookup_city(state, &chosen, &state.auto_cache).await {
        Ok(record) => Ok((record, location)),
        Err(primary_err) if chosen != DEFAULT_CITY => {
            tracing::warn!(
                "auto: lookup for {} failed ({}), falling back to {}",
                chosen,
                primary_err,
                DEFAULT_CITY
            );
            if let Some(mut cached) = state.auto_cache.get(DEFAULT_CITY).await {
                cached["source"] = json!("cache");
                return Ok((cached, location));
            }
            let record = lookup_city(state, DEFAULT_CITY, &state.auto_cache).await?;
            Ok((record, location))
        }
        Err(e) => Err(e),
    }
}

pub async fn prayer_times_auto(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let ip = client_ip(&headers, addr);
    let (record, _) = auto_lookup(&state, ip).await?;
    Ok(Json(record))
}

/// Same as the auto endpoint but includes what the geolocation detected.
pub async fn prayer_times_global(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let ip = client_ip(&headers, addr);
    let (mut record, location) = auto_lookup(&state, ip).await?;
    record["location"] = match location {
        Some(loc) => json!({ "country": loc.country_code, "detectedCity": loc.city }),
        None => json!({ "country": null, "detectedCity": null }),
    };
    Ok(Json(record))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Endpoint bulunamadı",
        })),
    )
}
