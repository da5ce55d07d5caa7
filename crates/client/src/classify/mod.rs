//! Response body classification.
//!
//! Turns a raw response body (plus the final URL and HTTP status) into a
//! status and a handful of structured fields. The rules live behind the
//! [`Classify`] trait so tools and tests can swap the engine; the default
//! implementation is marker- and regex-based.

use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use idsweep_core::{ListingId, ScanResult, ScanStatus};

/// Markers whose presence means the listing page no longer exists.
const NOT_FOUND_MARKERS: [&str; 3] = [
    "Šiame puslapyje nėra informacijos, kurios jūs ieškote",
    "Siame puslapyje nera informacijos, kurios jus ieskote",
    "block-404",
];

/// Markers of an anti-bot interstitial rather than a real page.
const CHALLENGE_MARKERS: [&str; 4] = [
    "Just a moment",
    "Enable JavaScript and cookies to continue",
    "cdn-cgi/challenge-platform",
    "_cf_chl_opt",
];

/// Snippet radius around a watchword hit, in bytes (clamped to char bounds).
const SNIPPET_RADIUS: usize = 120;

/// Structured output of classifying one response body.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    pub status: ScanStatus,
    pub inserted_date: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub final_url: Option<String>,
    pub watchword_found: bool,
    pub watchword_snippet_html: Option<String>,
}

impl Classification {
    /// Assemble the full result for a completed fetch.
    pub fn into_result(self, id: ListingId, http_status: Option<u16>) -> ScanResult {
        ScanResult {
            id,
            checked_at: Utc::now(),
            http_status,
            status: self.status,
            error: None,
            final_url: self.final_url,
            city: self.city,
            district: self.district,
            inserted_date: self.inserted_date,
            watchword_found: self.watchword_found,
            watchword_snippet_html: self.watchword_snippet_html,
        }
    }
}

/// Pluggable classifier contract: body text in, classification out.
/// No network, no caching.
pub trait Classify: Send + Sync {
    fn classify(&self, body: &str, final_url: Option<&str>, http_status: Option<u16>) -> Classification;
}

/// Default classifier: not-found/challenge markers, an insertion-date regex,
/// city/district extraction from the page title with a final-URL fallback,
/// and a highlighted watchword snippet.
pub struct MarkerClassifier {
    hit_re: Regex,
    date_re: Regex,
    vilnius_re: Regex,
    h1_sel: Selector,
    og_title_sel: Selector,
    title_sel: Selector,
}

impl MarkerClassifier {
    pub fn new(watchword: &str) -> Self {
        let hit_re = Regex::new(&format!("(?i)({})", regex::escape(watchword))).expect("invalid watchword pattern");
        Self {
            hit_re,
            date_re: Regex::new(r"(?i)(?:Įdėtas|Idetas)\s*(\d{4}-\d{2}-\d{2})").expect("invalid regex"),
            vilnius_re: Regex::new(r"(?i)\bvilni(?:us|uje|aus)\b").expect("invalid regex"),
            h1_sel: Selector::parse("h1").expect("invalid selector"),
            og_title_sel: Selector::parse(r#"meta[property="og:title"]"#).expect("invalid selector"),
            title_sel: Selector::parse("title").expect("invalid selector"),
        }
    }

    fn detect_status(&self, body: &str, http_status: Option<u16>) -> ScanStatus {
        if http_status == Some(404) {
            return ScanStatus::NotFound;
        }
        let low = body.to_lowercase();
        if NOT_FOUND_MARKERS.iter().any(|m| low.contains(&m.to_lowercase())) {
            return ScanStatus::NotFound;
        }
        if CHALLENGE_MARKERS.iter().any(|m| low.contains(&m.to_lowercase())) {
            return ScanStatus::Challenge;
        }
        ScanStatus::Found
    }

    /// HTML-escaped excerpt around the first watchword hit, with the hit
    /// wrapped in `<span class="hit">`. `None` when the watchword is absent.
    fn snippet(&self, body: &str) -> Option<String> {
        let m = self.hit_re.find(body)?;

        let mut start = m.start().saturating_sub(SNIPPET_RADIUS);
        while start > 0 && !body.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (m.end() + SNIPPET_RADIUS).min(body.len());
        while end < body.len() && !body.is_char_boundary(end) {
            end += 1;
        }

        let escaped = html_escape::encode_text(&body[start..end]).into_owned();
        let highlighted = self.hit_re.replace_all(&escaped, "<span class=\"hit\">$1</span>");

        let prefix = if start > 0 { "… " } else { "" };
        let suffix = if end < body.len() { " …" } else { "" };
        Some(format!("{prefix}{highlighted}{suffix}"))
    }

    fn title_text(&self, doc: &Html) -> String {
        if let Some(h1) = doc.select(&self.h1_sel).next() {
            let joined = h1.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ");
            if !joined.is_empty() {
                return joined;
            }
        }
        if let Some(og) = doc.select(&self.og_title_sel).next()
            && let Some(content) = og.value().attr("content")
        {
            return content.trim().to_string();
        }
        if let Some(title) = doc.select(&self.title_sel).next() {
            return title.text().collect::<String>().trim().to_string();
        }
        String::new()
    }
}

fn city_district_from_title(title: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = title.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.len() >= 2 {
        (Some(parts[0].to_string()), Some(parts[1].to_string()))
    } else {
        (None, None)
    }
}

/// Last-resort extraction from the final URL's slug, e.g.
/// `.../butai-vilniuje-senamiestyje-...` yields ("Vilnius", "senamiestyje").
fn city_district_from_url(final_url: &str) -> (Option<String>, Option<String>) {
    let Ok(url) = Url::parse(final_url) else {
        return (None, None);
    };
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return (None, None);
    }
    let slug = path.rsplit('/').next().unwrap_or(path).to_lowercase();

    let tokens: Vec<&str> = slug.split('-').collect();
    if let Some(i) = tokens.iter().position(|t| t.contains("vilniuje")) {
        let district = tokens.get(i + 1).filter(|t| !t.is_empty()).map(|t| (*t).to_string());
        return (Some("Vilnius".to_string()), district);
    }
    (None, None)
}

impl Classify for MarkerClassifier {
    fn classify(&self, body: &str, final_url: Option<&str>, http_status: Option<u16>) -> Classification {
        let status = self.detect_status(body, http_status);
        let snippet = self.snippet(body);

        let mut out = Classification {
            status,
            inserted_date: None,
            city: None,
            district: None,
            final_url: final_url.filter(|u| !u.is_empty()).map(ToString::to_string),
            watchword_found: snippet.is_some(),
            watchword_snippet_html: snippet,
        };

        if status != ScanStatus::Found {
            // challenge/not-found pages carry no usable markup; the URL slug
            // is the only hint left
            if let Some(url) = final_url {
                let (city, district) = city_district_from_url(url);
                out.city = city;
                out.district = district;
            }
            return out;
        }

        let doc = Html::parse_document(body);
        let title = self.title_text(&doc);
        let (mut city, mut district) = city_district_from_title(&title);

        let text = doc.root_element().text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join("\n");
        out.inserted_date = self.date_re.captures(&text).map(|c| c[1].to_string());

        if city.is_none() {
            if self.vilnius_re.is_match(&text) {
                city = Some("Vilnius".to_string());
            } else if let Some(url) = final_url {
                city = city_district_from_url(url).0;
            }
        }

        if city.as_deref().is_some_and(|c| c.trim().eq_ignore_ascii_case("vilnius")) {
            if district.is_none()
                && let Some(url) = final_url
            {
                district = city_district_from_url(url).1;
            }
        } else {
            // only Vilnius listings surface location fields
            city = None;
            district = None;
        }

        out.city = city;
        out.district = district;
        out
    }
}
