//! Profile URL extraction from raw search results.
//!
//! Pure functions: scan results in provider order and return the first link
//! that points at a profile page (not a post, reel, or site section).

use std::sync::LazyLock;

use regex::Regex;

use crate::SearchResult;

/// Canonical host used when rebuilding a profile URL.
const PROFILE_HOST: &str = "www.instagram.com";

/// Path fragments that mark content pages rather than profiles.
const CONTENT_PATH_MARKERS: &[&str] = &["/reel/", "/p/", "/tv/"];

/// First path segments that are site sections, not handles.
const RESERVED_SEGMENTS: &[&str] = &["reel", "p", "tv", "stories", "explore", "reels"];

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:instagram\.com)/([A-Za-z0-9_.]+)").expect("valid regex")
});

/// Return the canonical profile URL for the first qualifying result, if any.
///
/// `None` is a legitimate "not found", not an error.
pub fn extract_profile_url(results: &[SearchResult]) -> Option<String> {
    results
        .iter()
        .filter(|r| !is_content_url(&r.url))
        .find_map(|r| profile_handle(&r.url))
        .map(|handle| canonical_profile_url(&handle))
}

/// Extract the handle following the profile domain, rejecting reserved segments.
pub fn profile_handle(url: &str) -> Option<String> {
    let caps = HANDLE_RE.captures(url)?;
    let handle = caps.get(1)?.as_str();
    if RESERVED_SEGMENTS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(handle))
    {
        return None;
    }
    Some(handle.to_string())
}

/// Build `https://www.instagram.com/<handle>/`. The trailing slash is mandatory.
pub fn canonical_profile_url(handle: &str) -> String {
    format!("https://{PROFILE_HOST}/{handle}/")
}

fn is_content_url(url: &str) -> bool {
    CONTENT_PATH_MARKERS.iter().any(|marker| url.contains(marker))
}
