//! Reference discovery in free text.
//!
//! Review descriptions and commit messages carry marker lines such as
//! `agentexport-mapping: https://agentexports.com/gm/<id>`. This module pulls
//! those URLs out, cleans them, scores competing candidates, and rewrites legacy
//! URL shapes to their canonical successors.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::types::ReferenceKind;

/// Host that serves mapping blobs.
pub const CANONICAL_HOST: &str = "agentexports.com";

/// Hosts that are common typos or aliases of [`CANONICAL_HOST`].
pub const NEAR_MISS_HOSTS: &[&str] = &[
    "agentexport.com",
    "www.agentexports.com",
    "www.agentexport.com",
    "agentexports.net",
];

/// Hosts that may serve mapping JSON directly (gist storage backend).
pub const ALTERNATE_HOSTS: &[&str] = &["gist.githubusercontent.com", "gist.github.com"];

const MARKER_TOKEN: &str = "agentexport";

static MAPPING_LINE: LazyLock<Regex> = LazyLock::new(|| marker_line("agentexport-mapping"));
static PROXY_LINE: LazyLock<Regex> = LazyLock::new(|| marker_line("agentexport-proxy"));

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]\(\s*<?([^)\s>]+)>?[^)]*\)").expect("markdown link pattern")
});

static INLINE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"'`)\]]+"#).expect("inline url pattern")
});

/// `<marker>:` and its value must share a line.
fn marker_line(marker: &str) -> Regex {
    Regex::new(&format!(r"(?im){}[ \t]*:[ \t]*(.*)$", regex::escape(marker))).expect("marker pattern")
}

/// A text-bearing region of the current view: its visible text plus the
/// targets of any hyperlinks embedded in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRegion {
    pub text: String,
    pub links: Vec<String>,
}

impl TextRegion {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }

    fn mentions(&self, marker: &str) -> bool {
        self.text.to_ascii_lowercase().contains(marker)
    }
}

/// Pulls the URL following a `<marker>:` line out of `text`.
///
/// The remainder of the line may be a markdown link (`[label](url)`) or a bare
/// URL token. Wrapping delimiters and trailing punctuation are stripped. The
/// result is raw; pass it through [`sanitize`] before use.
pub fn extract_reference(text: &str, kind: ReferenceKind) -> Option<String> {
    let pattern = match kind {
        ReferenceKind::Mapping => &*MAPPING_LINE,
        ReferenceKind::Proxy => &*PROXY_LINE,
    };
    pattern.captures_iter(text).find_map(|caps| {
        let rest = caps.get(1)?.as_str().trim();
        let candidate = match MARKDOWN_LINK.captures(rest) {
            Some(link) => link.get(1)?.as_str(),
            None => rest.split_whitespace().next()?,
        };
        let cleaned = strip_wrapping(candidate);
        looks_like_http(cleaned).then(|| cleaned.to_owned())
    })
}

/// Picks the strongest mapping URL across every region that mentions the
/// mapping marker.
///
/// Candidates are the region's hyperlinks followed by inline URL tokens in its
/// text. Ties keep the first candidate found. The winner is sanitized, so a
/// field made only of legacy single-segment URLs yields `None`.
pub fn select_best_mapping_reference(regions: &[TextRegion]) -> Option<String> {
    let marker = ReferenceKind::Mapping.marker();
    let mut best: Option<(i32, String)> = None;

    for region in regions.iter().filter(|r| r.mentions(marker)) {
        let inline = INLINE_URL.find_iter(&region.text).map(|m| m.as_str());
        for raw in region.links.iter().map(String::as_str).chain(inline) {
            let candidate = strip_wrapping(raw);
            if !looks_like_http(candidate) {
                continue;
            }
            let score = score_candidate(candidate);
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, candidate.to_owned()));
            }
        }
    }

    let (score, url) = best?;
    tracing::debug!(score, %url, "selected mapping candidate");
    sanitize(&url)
}

/// Locates a reference of `kind` across the regions of a view.
///
/// Mapping references go through candidate scoring first and fall back to the
/// first marker line; proxy references keep only their origin.
pub fn find_reference(regions: &[TextRegion], kind: ReferenceKind) -> Option<String> {
    match kind {
        ReferenceKind::Mapping => select_best_mapping_reference(regions).or_else(|| {
            regions
                .iter()
                .filter_map(|r| extract_reference(&r.text, kind))
                .find_map(|raw| sanitize(&raw))
        }),
        ReferenceKind::Proxy => regions
            .iter()
            .filter_map(|r| extract_reference(&r.text, kind))
            .find_map(|raw| proxy_origin(&raw)),
    }
}

/// Heuristic score for a mapping URL candidate. Higher is better.
pub fn score_candidate(candidate: &str) -> i32 {
    let lower = candidate.to_ascii_lowercase();
    let parsed = Url::parse(candidate).ok();
    let path = parsed
        .as_ref()
        .map(|u| u.path().to_owned())
        .unwrap_or_else(|| lower.clone());
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_default();

    let mut score = 0;
    if has_segment(&path, "gm") {
        score += 80;
    }
    if lower.contains(MARKER_TOKEN) {
        score += 50;
    }
    if ALTERNATE_HOSTS.contains(&host.as_str()) {
        score += 40;
    }
    if path.ends_with(".json") {
        score += 30;
    }
    if path.contains("/blob/") {
        score += 25;
    }
    if parsed.as_ref().is_some_and(|u| u.scheme() == "https") && host == CANONICAL_HOST {
        score += 10;
    }
    if path.contains("/v/") {
        score -= 10;
    }
    if is_legacy_shorthand(&path) {
        score -= 100;
    }
    score
}

/// Cleans a raw URL and rewrites near-miss hosts to the canonical host.
///
/// Returns `None` for unparseable input, non-HTTP schemes, and the ambiguous
/// legacy `/g/<id>` shape.
pub fn sanitize(raw: &str) -> Option<String> {
    let cleaned = strip_wrapping(raw);
    let mut url = Url::parse(cleaned).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let near_miss = url
        .host_str()
        .is_some_and(|h| NEAR_MISS_HOSTS.contains(&h.to_ascii_lowercase().as_str()));
    if near_miss {
        url.set_host(Some(CANONICAL_HOST)).ok()?;
    }
    if is_legacy_shorthand(url.path()) {
        return None;
    }
    Some(url.to_string())
}

/// Rewrites legacy path prefixes: `/v/<id>#<key>` becomes `/blob/<id>#<key>`
/// and `/g/<id>` becomes `/gm/<id>`.
///
/// Unparseable input is returned trimmed. `normalize(normalize(u)) == normalize(u)`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };
    let path = url.path().to_owned();
    let mut parts = path.trim_start_matches('/').splitn(2, '/');
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    let has_key = url.fragment().is_some_and(|f| !f.is_empty());
    let replacement = match first {
        "v" if has_key => Some("blob"),
        "g" => Some("gm"),
        _ => None,
    };
    if let Some(head) = replacement {
        url.set_path(&format!("/{head}/{rest}"));
    }
    url.to_string()
}

/// Whitelist of URL shapes worth caching.
pub fn is_likely_valid(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let loopback = is_loopback(&host);
    let secure = url.scheme() == "https" || (url.scheme() == "http" && loopback);
    if !secure {
        return false;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    let has_key = url.fragment().is_some_and(|f| !f.is_empty());

    if host == CANONICAL_HOST || loopback {
        return match segments.as_slice() {
            ["gm", id] => is_blob_id(id),
            ["blob" | "v", id] => is_blob_id(id) && has_key,
            _ => url.path().ends_with(".json"),
        };
    }
    if ALTERNATE_HOSTS.contains(&host.as_str()) {
        return segments.len() >= 2;
    }
    url.path().ends_with(".json")
}

/// Validates a proxy reference, keeping only its origin.
pub fn proxy_origin(raw: &str) -> Option<String> {
    let url = Url::parse(strip_wrapping(raw)).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Strips wrapping `<>`, quotes, backticks and parentheses plus trailing
/// sentence punctuation.
pub fn strip_wrapping(raw: &str) -> &str {
    const LEADING: &[char] = &['<', '"', '\'', '`', '('];
    const TRAILING: &[char] = &['>', '"', '\'', '`', ')', ']', '.', ',', ';', ':', '!', '?'];
    raw.trim()
        .trim_start_matches(LEADING)
        .trim_end_matches(TRAILING)
        .trim()
}

fn looks_like_http(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    lower.starts_with("https://") || lower.starts_with("http://")
}

fn has_segment(path: &str, segment: &str) -> bool {
    path.split('/').any(|s| s == segment)
}

/// `/g/<id>` without any `/gm/` counterpart.
fn is_legacy_shorthand(path: &str) -> bool {
    let first = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    first == "g" && !has_segment(path, "gm")
}

fn is_blob_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}
