use std::collections::HashMap;

use tokio::sync::RwLock;

/// One province of the static reference list: plate code, display name,
/// the source portal's district ID and the city-center coordinates.
#[derive(Debug)]
pub struct Province {
    pub plate: u16,
    pub name: &'static str,
    pub district_id: u32,
    pub lat: f64,
    pub lng: f64,
}

/// All 81 provinces, in plate-code order.
pub const PROVINCES: &[Province] = &[
    Province { plate: 1, name: "Adana", district_id: 9146, lat: 37.00, lng: 35.32 },
    Province { plate: 2, name: "Adıyaman", district_id: 9158, lat: 37.76, lng: 38.28 },
    Province { plate: 3, name: "Afyonkarahisar", district_id: 9167, lat: 38.76, lng: 30.54 },
    Province { plate: 4, name: "Ağrı", district_id: 9185, lat: 39.72, lng: 43.05 },
    Province { plate: 5, name: "Amasya", district_id: 9198, lat: 40.65, lng: 35.83 },
    Province { plate: 6, name: "Ankara", district_id: 9206, lat: 39.93, lng: 32.86 },
    Province { plate: 7, name: "Antalya", district_id: 9225, lat: 36.88, lng: 30.70 },
    Province { plate: 8, name: "Artvin", district_id: 9246, lat: 41.18, lng: 41.82 },
    Province { plate: 9, name: "Aydın", district_id: 9252, lat: 37.84, lng: 27.84 },
    Province { plate: 10, name: "Balıkesir", district_id: 9270, lat: 39.65, lng: 27.89 },
    Province { plate: 11, name: "Bilecik", district_id: 9297, lat: 40.15, lng: 29.98 },
    Province { plate: 12, name: "Bingöl", district_id: 9303, lat: 38.88, lng: 40.49 },
    Province { plate: 13, name: "Bitlis", district_id: 9311, lat: 38.40, lng: 42.11 },
    Province { plate: 14, name: "Bolu", district_id: 9315, lat: 40.74, lng: 31.61 },
    Province { plate: 15, name: "Burdur", district_id: 9327, lat: 37.72, lng: 30.29 },
    Province { plate: 16, name: "Bursa", district_id: 9335, lat: 40.19, lng: 29.06 },
    Province { plate: 17, name: "Çanakkale", district_id: 9352, lat: 40.15, lng: 26.41 },
    Province { plate: 18, name: "Çankırı", district_id: 9359, lat: 40.60, lng: 33.62 },
    Province { plate: 19, name: "Çorum", district_id: 9370, lat: 40.55, lng: 34.95 },
    Province { plate: 20, name: "Denizli", district_id: 9392, lat: 37.77, lng: 29.09 },
    Province { plate: 21, name: "Diyarbakır", district_id: 9402, lat: 37.91, lng: 40.24 },
    Province { plate: 22, name: "Edirne", district_id: 9419, lat: 41.68, lng: 26.56 },
    Province { plate: 23, name: "Elazığ", district_id: 9432, lat: 38.68, lng: 39.22 },
    Province { plate: 24, name: "Erzincan", district_id: 9440, lat: 39.75, lng: 39.49 },
    Province { plate: 25, name: "Erzurum", district_id: 9451, lat: 39.90, lng: 41.27 },
    Province { plate: 26, name: "Eskişehir", district_id: 9470, lat: 39.78, lng: 30.52 },
    Province { plate: 27, name: "Gaziantep", district_id: 9479, lat: 37.07, lng: 37.38 },
    Province { plate: 28, name: "Giresun", district_id: 9494, lat: 40.91, lng: 38.39 },
    Province { plate: 29, name: "Gümüşhane", district_id: 9501, lat: 40.46, lng: 39.48 },
    Province { plate: 30, name: "Hakkari", district_id: 9507, lat: 37.57, lng: 43.74 },
    Province { plate: 31, name: "Hatay", district_id: 9515, lat: 36.40, lng: 36.35 },
    Province { plate: 32, name: "Isparta", district_id: 9528, lat: 37.76, lng: 30.56 },
    Province { plate: 33, name: "Mersin", district_id: 9737, lat: 36.80, lng: 34.63 },
    Province { plate: 34, name: "İstanbul", district_id: 9541, lat: 41.01, lng: 28.98 },
    Province { plate: 35, name: "İzmir", district_id: 9560, lat: 38.42, lng: 27.13 },
    Province { plate: 36, name: "Kars", district_id: 9610, lat: 40.60, lng: 43.08 },
    Province { plate: 37, name: "Kastamonu", district_id: 9616, lat: 41.38, lng: 33.78 },
    Province { plate: 38, name: "Kayseri", district_id: 9620, lat: 38.73, lng: 35.49 },
    Province { plate: 39, name: "Kırklareli", district_id: 9629, lat: 41.73, lng: 27.22 },
    Province { plate: 40, name: "Kırşehir", district_id: 9635, lat: 39.15, lng: 34.16 },
    Province { plate: 41, name: "Kocaeli", district_id: 9654, lat: 40.85, lng: 29.88 },
    Province { plate: 42, name: "Konya", district_id: 9676, lat: 37.87, lng: 32.48 },
    Province { plate: 43, name: "Kütahya", district_id: 9689, lat: 39.42, lng: 29.99 },
    Province { plate: 44, name: "Malatya", district_id: 9703, lat: 38.35, lng: 38.31 },
    Province { plate: 45, name: "Manisa", district_id: 9716, lat: 38.61, lng: 27.43 },
    Province { plate: 46, name: "Kahramanmaraş", district_id: 9587, lat: 37.58, lng: 36.93 },
    Province { plate: 47, name: "Mardin", district_id: 9726, lat: 37.31, lng: 40.74 },
    Province { plate: 48, name: "Muğla", district_id: 9747, lat: 37.22, lng: 28.36 },
    Province { plate: 49, name: "Muş", district_id: 9751, lat: 38.73, lng: 41.49 },
    Province { plate: 50, name: "Nevşehir", district_id: 9760, lat: 38.62, lng: 34.71 },
    Province { plate: 51, name: "Niğde", district_id: 9766, lat: 37.97, lng: 34.68 },
    Province { plate: 52, name: "Ordu", district_id: 9782, lat: 40.98, lng: 37.88 },
    Province { plate: 53, name: "Rize", district_id: 9799, lat: 41.02, lng: 40.52 },
    Province { plate: 54, name: "Sakarya", district_id: 9807, lat: 40.76, lng: 30.40 },
    Province { plate: 55, name: "Samsun", district_id: 9819, lat: 41.29, lng: 36.33 },
    Province { plate: 56, name: "Siirt", district_id: 9828, lat: 37.93, lng: 41.94 },
    Province { plate: 57, name: "Sinop", district_id: 9833, lat: 42.03, lng: 35.15 },
    Province { plate: 58, name: "Sivas", district_id: 9845, lat: 39.75, lng: 37.02 },
    Province { plate: 59, name: "Tekirdağ", district_id: 9856, lat: 40.98, lng: 27.51 },
    Province { plate: 60, name: "Tokat", district_id: 9862, lat: 40.31, lng: 36.55 },
    Province { plate: 61, name: "Trabzon", district_id: 9868, lat: 41.00, lng: 39.73 },
    Province { plate: 62, name: "Tunceli", district_id: 9875, lat: 39.11, lng: 39.55 },
    Province { plate: 63, name: "Şanlıurfa", district_id: 9882, lat: 37.16, lng: 38.79 },
    Province { plate: 64, name: "Uşak", district_id: 9887, lat: 38.68, lng: 29.40 },
    Province { plate: 65, name: "Van", district_id: 9892, lat: 38.49, lng: 43.41 },
    Province { plate: 66, name: "Yozgat", district_id: 9906, lat: 39.82, lng: 34.81 },
    Province { plate: 67, name: "Zonguldak", district_id: 9919, lat: 41.45, lng: 31.79 },
    Province { plate: 68, name: "Aksaray", district_id: 9193, lat: 38.37, lng: 34.03 },
    Province { plate: 69, name: "Bayburt", district_id: 9283, lat: 40.26, lng: 40.22 },
    Province { plate: 70, name: "Karaman", district_id: 9598, lat: 37.18, lng: 33.22 },
    Province { plate: 71, name: "Kırıkkale", district_id: 9623, lat: 39.84, lng: 33.52 },
    Province { plate: 72, name: "Batman", district_id: 9275, lat: 37.88, lng: 41.13 },
    Province { plate: 73, name: "Şırnak", district_id: 9851, lat: 37.52, lng: 42.46 },
    Province { plate: 74, name: "Bartın", district_id: 9261, lat: 41.63, lng: 32.34 },
    Province { plate: 75, name: "Ardahan", district_id: 9235, lat: 41.11, lng: 42.70 },
    Province { plate: 76, name: "Iğdır", district_id: 9522, lat: 39.92, lng: 44.04 },
    Province { plate: 77, name: "Yalova", district_id: 9898, lat: 40.65, lng: 29.27 },
    Province { plate: 78, name: "Karabük", district_id: 9593, lat: 41.20, lng: 32.62 },
    Province { plate: 79, name: "Kilis", district_id: 9641, lat: 36.72, lng: 37.12 },
    Province { plate: 80, name: "Osmaniye", district_id: 9791, lat: 37.07, lng: 36.25 },
    Province { plate: 81, name: "Düzce", district_id: 9414, lat: 40.84, lng: 31.16 },
];

/// Fold Turkish diacritics to ASCII and lowercase.
///
/// Source sites mix diacritic and ASCII spellings ("Öğle" vs "ogle"), and
/// `İ`.to_lowercase() produces `i` + U+0307, so the combining dot is stripped
/// as well.
pub fn fold_turkish(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'ç' => Some('c'),
            'ğ' => Some('g'),
            'ı' => Some('i'),
            'ö' => Some('o'),
            'ş' => Some('s'),
            'ü' => Some('u'),
            '\u{0307}' => None,
            other => Some(other),
        })
        .collect()
}

/// Derive the URL slug for a city name: fold diacritics, hyphenate spaces.
pub fn slugify(name: &str) -> String {
    fold_turkish(name.trim()).replace(' ', "-")
}

/// A resolvable city mapping: source district ID, URL slug, display label.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub district_id: u32,
    pub slug: String,
    pub label: String,
}

impl Mapping {
    fn from_province(p: &Province) -> Self {
        Mapping {
            district_id: p.district_id,
            slug: slugify(p.name),
            label: p.name.to_string(),
        }
    }
}

/// Static provinces plus mappings learned at runtime through discovery.
///
/// Learned entries live only for the process lifetime. Single-writer,
/// multi-reader; each insert is an independent key overwrite, so no
/// cross-key invariant needs protecting.
pub struct CityRegistry {
    learned: RwLock<HashMap<String, Mapping>>,
}

impl CityRegistry {
    pub fn new() -> Self {
        Self {
            learned: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a folded city slug in the static province table.
    pub fn static_lookup(slug: &str) -> Option<Mapping> {
        PROVINCES
            .iter()
            .find(|p| slugify(p.name) == slug)
            .map(Mapping::from_province)
    }

    /// Look up a folded city slug, static table first, then learned entries.
    pub async fn lookup(&self, slug: &str) -> Option<Mapping> {
        if let Some(m) = Self::static_lookup(slug) {
            return Some(m);
        }
        self.learned.read().await.get(slug).cloned()
    }

    /// Record a mapping discovered at runtime.
    pub async fn learn(&self, slug: &str, mapping: Mapping) {
        tracing::info!("registry: learned {} -> {}", slug, mapping.district_id);
        self.learned.write().await.insert(slug.to_string(), mapping);
    }

    /// Snapshot of the runtime-learned entries.
    pub async fn known_mappings_snapshot(&self) -> HashMap<String, Mapping> {
        self.learned.read().await.clone()
    }

    pub fn by_plate(plate: u16) -> Option<&'static Province> {
        PROVINCES.iter().find(|p| p.plate == plate)
    }

    /// Sorted slugs of all statically known cities.
    pub fn city_slugs() -> Vec<String> {
        let mut slugs: Vec<String> = PROVINCES.iter().map(|p| slugify(p.name)).collect();
        slugs.sort();
        slugs
    }
}

impl Default for CityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fold_turkish() {
        assert_eq!(fold_turkish("Öğle"), "ogle");
        assert_eq!(fold_turkish("OGLE"), "ogle");
        assert_eq!(fold_turkish("İstanbul"), "istanbul");
        assert_eq!(fold_turkish("Şanlıurfa"), "sanliurfa");
        assert_eq!(fold_turkish("Güneş"), "gunes");
    }

    #[test]
    fn test_slugify_hyphenates() {
        assert_eq!(slugify(" Afyonkarahisar "), "afyonkarahisar");
        assert_eq!(slugify("Yeni Şehir"), "yeni-sehir");
    }

    #[test]
    fn test_province_table_complete() {
        assert_eq!(PROVINCES.len(), 81);
        let ids: HashSet<u32> = PROVINCES.iter().map(|p| p.district_id).collect();
        assert_eq!(ids.len(), 81);
        let plates: HashSet<u16> = PROVINCES.iter().map(|p| p.plate).collect();
        assert_eq!(plates.len(), 81);
    }

    #[test]
    fn test_static_lookup() {
        let m = CityRegistry::static_lookup("istanbul").unwrap();
        assert_eq!(m.district_id, 9541);
        assert_eq!(m.label, "İstanbul");
        assert!(CityRegistry::static_lookup("atlantis").is_none());
    }

    #[test]
    fn test_by_plate() {
        assert_eq!(CityRegistry::by_plate(34).unwrap().name, "İstanbul");
        assert_eq!(CityRegistry::by_plate(6).unwrap().name, "Ankara");
        assert!(CityRegistry::by_plate(82).is_none());
        assert!(CityRegistry::by_plate(0).is_none());
    }

    #[tokio::test]
    async fn test_learned_entries() {
        let registry = CityRegistry::new();
        assert!(registry.lookup("berlin").await.is_none());

        let mapping = Mapping {
            district_id: 11230,
            slug: "berlin".into(),
            label: "Berlin".into(),
        };
        registry.learn("berlin", mapping.clone()).await;

        assert_eq!(registry.lookup("berlin").await.unwrap(), mapping);
        let snapshot = registry.known_mappings_snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["berlin"], mapping);
    }

    #[tokio::test]
    async fn test_static_shadows_learned() {
        let registry = CityRegistry::new();
        let bogus = Mapping {
            district_id: 1,
            slug: "istanbul".into(),
            label: "Bogus".into(),
        };
        registry.learn("istanbul", bogus).await;

        // Static table wins over learned entries.
        assert_eq!(registry.lookup("istanbul").await.unwrap().district_id, 9541);
    }
}
