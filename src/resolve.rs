use std::time::Duration;

use crate::fetch::{fetch_html, FetchOptions};
use crate::registry::{slugify, CityRegistry, Mapping};

/// Upstream source portals. Base URLs are injected so tests can point them
/// at a local mock server.
#[derive(Debug, Clone)]
pub struct Sources {
    pub primary_base: String,
    pub secondary_base: String,
}

impl Sources {
    pub fn new(primary_base: impl Into<String>, secondary_base: impl Into<String>) -> Self {
        Self {
            primary_base: primary_base.into(),
            secondary_base: secondary_base.into(),
        }
    }

    /// Official portal page for a known district.
    pub fn primary_url(&self, district_id: u32, slug: &str) -> String {
        format!(
            "{}/tr-TR/{}/{}-icin-namaz-vakti",
            self.primary_base, district_id, slug
        )
    }

    /// Official portal page addressed by district ID alone.
    pub fn raw_district_url(&self, district_id: &str) -> String {
        format!("{}/tr-TR/{}", self.primary_base, district_id)
    }

    /// News portal page for a city slug.
    pub fn secondary_url(&self, slug: &str) -> String {
        format!("{}/{}-namaz-vakitleri", self.secondary_base, slug)
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self::new(
            "https://namazvakitleri.diyanet.gov.tr",
            "https://www.sabah.com.tr",
        )
    }
}

/// Outcome of resolving a user-supplied identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A known mapping, from the static table or a previous discovery.
    Known(Mapping),
    /// Numeric input outside the plate-code range, used directly as a
    /// district-ID path segment.
    RawDistrict { district_id: String },
    /// Nothing known; the caller must run discovery before retrying.
    NeedsDiscovery { slug: String },
}

/// Map a city name or numeric ID to a resolution.
///
/// Purely numeric input is treated as a province plate code first; if that
/// lookup fails the number is passed through as a raw district ID.
/// Alphabetic input is folded and looked up in the registry.
pub async fn resolve(registry: &CityRegistry, input: &str) -> Resolution {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        if let Some(province) = input
            .parse::<u16>()
            .ok()
            .and_then(CityRegistry::by_plate)
        {
            return Resolution::Known(Mapping {
                district_id: province.district_id,
                slug: slugify(province.name),
                label: province.name.to_string(),
            });
        }
        return Resolution::RawDistrict {
            district_id: input.to_string(),
        };
    }

    let slug = slugify(input);
    match registry.lookup(&slug).await {
        Some(mapping) => Resolution::Known(mapping),
        None => Resolution::NeedsDiscovery { slug },
    }
}

// Candidate district-ID bands probed during discovery, stepping by 10.
const DISCOVERY_BANDS: &[(u32, u32)] = &[
    (9100, 9200),
    (9300, 9400),
    (9500, 9600),
    (9700, 9800),
    (9900, 10000),
];
const DISCOVERY_STEP: u32 = 10;
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Title-case a slug for use as the page marker ("new-york" -> "New York").
fn marker_for(slug: &str) -> String {
    slug.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Brute-force probe the candidate ID bands for an unmapped city.
///
/// One GET per candidate with a short timeout and no retries; the first
/// response body containing the expected city-name marker wins, and the
/// discovered mapping is recorded in the registry for the rest of the
/// process lifetime. Worst case is ~50 probes, each bounded by the probe
/// timeout.
pub async fn discover(
    client: &reqwest::Client,
    registry: &CityRegistry,
    sources: &Sources,
    slug: &str,
) -> Option<Mapping> {
    let marker = marker_for(slug);
    let probe_opts = FetchOptions {
        timeout: PROBE_TIMEOUT,
        retries: 0,
        base_delay: Duration::ZERO,
    };

    tracing::info!("discovery: probing for '{}' (marker '{}')", slug, marker);
    for &(start, end) in DISCOVERY_BANDS {
        for district_id in (start..end).step_by(DISCOVERY_STEP as usize) {
            let url = sources.primary_url(district_id, slug);
            let body = match fetch_html(client, &url, &probe_opts).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("discovery: probe {} failed: {}", district_id, e);
                    continue;
                }
            };
            if body.contains(&marker) {
                let mapping = Mapping {
                    district_id,
                    slug: slug.to_string(),
                    label: marker,
                };
                registry.learn(slug, mapping.clone()).await;
                return Some(mapping);
            }
        }
    }
    tracing::warn!("discovery: exhausted all bands for '{}'", slug);
    None
}
