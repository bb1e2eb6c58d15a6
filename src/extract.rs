use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::registry::fold_turkish;

/// The six daily prayer-time slots. Values are "HH:MM" free text taken from
/// the source page as-is; any subset may be missing when extraction fails
/// per-field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imsak: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gunes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ogle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ikindi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aksam: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yatsi: Option<String>,
}

impl PrayerTimes {
    /// All six slots unset. An empty result after both strategies means the
    /// page had no recognizable prayer-time content.
    pub fn is_empty(&self) -> bool {
        self.imsak.is_none()
            && self.gunes.is_none()
            && self.ogle.is_none()
            && self.ikindi.is_none()
            && self.aksam.is_none()
            && self.yatsi.is_none()
    }
}

/// Extraction result: times plus the city label as printed on the page.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub city_label: Option<String>,
    pub times: PrayerTimes,
}

/// Extract a prayer-time record from page HTML.
///
/// Tries the embedded-script strategy first (official portal format); the
/// DOM-table strategy runs only as a fallback when the script strategy
/// yielded zero time fields.
pub fn extract(html: &str) -> Extracted {
    let from_script = extract_script(html);
    if !from_script.times.is_empty() {
        return from_script;
    }
    let from_dom = extract_dom(html);
    if from_dom.times.is_empty() && from_dom.city_label.is_none() {
        return from_script;
    }
    from_dom
}

fn capture_first(text: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Strategy 1: the official portal embeds the times as inline script
/// variables (`var _imsakTime = "05:32";` etc.). Scope to the first script
/// block carrying the sentinel variable, then pull each assignment
/// independently.
fn extract_script(html: &str) -> Extracted {
    let document = Html::parse_document(html);
    let script_sel = Selector::parse("script").expect("static selector");

    let script = document
        .select(&script_sel)
        .map(|s| s.inner_html())
        .find(|body| body.contains("var _imsakTime"));

    let Some(script) = script else {
        return Extracted::default();
    };

    let time_var = |name: &str| capture_first(&script, &format!(r#"var _{name}Time = "([^"]+)""#));

    Extracted {
        city_label: capture_first(&script, r#"var srSehirAdi = "([^"]+)""#),
        times: PrayerTimes {
            imsak: time_var("imsak"),
            gunes: time_var("gunes"),
            ogle: time_var("ogle"),
            ikindi: time_var("ikindi"),
            aksam: time_var("aksam"),
            yatsi: time_var("yatsi"),
        },
    }
}

/// Strategy 2: the news portal renders label/value pairs in a list. Labels
/// are classified by diacritic-insensitive substring match; a value is only
/// accepted when it contains a colon.
fn extract_dom(html: &str) -> Extracted {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse(".vakitler ul li").expect("static selector");
    let label_sel = Selector::parse("strong").expect("static selector");
    let value_sel = Selector::parse("span").expect("static selector");
    let caption_sel = Selector::parse(".captionWidget").expect("static selector");

    let city_label = document
        .select(&caption_sel)
        .next()
        .map(|el| {
            el.text()
                .collect::<String>()
                .trim()
                .replace(" Namaz Vakitleri", "")
        })
        .filter(|s| !s.is_empty());

    let mut times = PrayerTimes::default();
    for item in document.select(&item_sel) {
        let label: String = match item.select(&label_sel).next() {
            Some(el) => el.text().collect::<String>().trim().to_string(),
            None => continue,
        };
        let value: String = match item.select(&value_sel).next() {
            Some(el) => el.text().collect::<String>().trim().to_string(),
            None => continue,
        };
        if label.is_empty() || !value.contains(':') {
            continue;
        }

        let folded = fold_turkish(&label);
        let slot = if folded.contains("imsak") {
            &mut times.imsak
        } else if folded.contains("gunes") {
            &mut times.gunes
        } else if folded.contains("ogle") {
            &mut times.ogle
        } else if folded.contains("ikindi") {
            &mut times.ikindi
        } else if folded.contains("aksam") {
            &mut times.aksam
        } else if folded.contains("yatsi") {
            &mut times.yatsi
        } else {
            continue;
        };
        *slot = Some(value);
    }

    Extracted { city_label, times }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT_PAGE: &str = r#"<html><head><script>
        var srSehirAdi = "İSTANBUL";
        var _imsakTime = "05:32";
        var _gunesTime = "07:01";
        var _ogleTime = "13:07";
        var _ikindiTime = "16:42";
        var _aksamTime = "19:58";
        var _yatsiTime = "21:20";
    </script></head><body></body></html>"#;

    const DOM_PAGE: &str = r#"<html><body>
        <h1 class="captionWidget">Ankara Namaz Vakitleri</h1>
        <div class="vakitler"><ul>
            <li><strong>İmsak</strong><span>05:40</span></li>
            <li><strong>GÜNEŞ</strong><span>07:10</span></li>
            <li><strong>ogle</strong><span>13:00</span></li>
            <li><strong>İkindi</strong><span>16:30</span></li>
            <li><strong>Akşam</strong><span>19:45</span></li>
            <li><strong>Yatsı</strong><span>21:05</span></li>
        </ul></div>
    </body></html>"#;

    #[test]
    fn test_script_strategy_full() {
        let extracted = extract(SCRIPT_PAGE);
        assert_eq!(extracted.city_label.as_deref(), Some("İSTANBUL"));
        assert_eq!(extracted.times.imsak.as_deref(), Some("05:32"));
        assert_eq!(extracted.times.yatsi.as_deref(), Some("21:20"));
        assert!(!extracted.times.is_empty());
    }

    #[test]
    fn test_script_strategy_partial() {
        // Missing akşam: five of six slots populated, still a valid record.
        let html = r#"<script>
            var _imsakTime = "05:32";
            var _gunesTime = "07:01";
            var _ogleTime = "13:07";
            var _ikindiTime = "16:42";
            var _yatsiTime = "21:20";
        </script>"#;
        let extracted = extract(html);
        assert!(extracted.times.aksam.is_none());
        assert_eq!(extracted.times.ikindi.as_deref(), Some("16:42"));
        assert!(!extracted.times.is_empty());
    }

    #[test]
    fn test_dom_strategy_diacritic_labels() {
        // Mixed diacritic, ASCII-folded and uppercase labels all classify.
        let extracted = extract(DOM_PAGE);
        assert_eq!(extracted.city_label.as_deref(), Some("Ankara"));
        assert_eq!(extracted.times.imsak.as_deref(), Some("05:40"));
        assert_eq!(extracted.times.gunes.as_deref(), Some("07:10"));
        assert_eq!(extracted.times.ogle.as_deref(), Some("13:00"));
        assert_eq!(extracted.times.aksam.as_deref(), Some("19:45"));
    }

    #[test]
    fn test_dom_rejects_values_without_colon() {
        let html = r#"<div class="vakitler"><ul>
            <li><strong>İmsak</strong><span>yükleniyor</span></li>
            <li><strong>Öğle</strong><span>13:00</span></li>
        </ul></div>"#;
        let extracted = extract(html);
        assert!(extracted.times.imsak.is_none());
        assert_eq!(extracted.times.ogle.as_deref(), Some("13:00"));
    }

    #[test]
    fn test_script_wins_when_it_has_fields() {
        // Both formats present: DOM is fallback only.
        let combined = format!("{SCRIPT_PAGE}{DOM_PAGE}");
        let extracted = extract(&combined);
        assert_eq!(extracted.times.imsak.as_deref(), Some("05:32"));
        assert_eq!(extracted.city_label.as_deref(), Some("İSTANBUL"));
    }

    #[test]
    fn test_no_data_page_is_empty() {
        let extracted = extract("<html><body><p>Sayfa bulunamadı</p></body></html>");
        assert!(extracted.times.is_empty());
        assert!(extracted.city_label.is_none());
    }

    #[test]
    fn test_times_serde_round_trip() {
        let times = PrayerTimes {
            imsak: Some("05:32".into()),
            gunes: None,
            ogle: Some("13:07".into()),
            ikindi: Some("16:42".into()),
            aksam: Some("19:58".into()),
            yatsi: Some("21:20".into()),
        };
        let json = serde_json::to_string(&times).unwrap();
        // Unset slots are omitted from the wire format entirely.
        assert!(!json.contains("gunes"));
        let back: PrayerTimes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, times);
    }
}
