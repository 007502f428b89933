//! Discovery of further article URLs on a page.
//!
//! Anchors are resolved against the page's own URL and kept only when they
//! stay on the same host, do not point at fragments, scripts, mail or
//! images, and look like articles by URL keyword.

use crate::models::RenderedPage;
use itertools::Itertools;
use tracing::{debug, warn};
use url::Url;

/// At most this many links are handed to the crawler per page.
pub const MAX_DISCOVERED_LINKS: usize = 50;

const EXCLUDED: &[&str] = &["#", "javascript:", "mailto:", ".jpg", ".png"];

/// Matched case-insensitively against the resolved URL.
const ARTICLE_HINTS: &[&str] = &["news", "article", "2025", "2024", "spine", "medical"];

/// Candidate article URLs on `page`, in discovery order, without repeats.
///
/// `source_url` provides both the base for relative links and the host
/// links must share. Returns nothing when `source_url` has no host.
pub fn discover(page: &RenderedPage, source_url: &str) -> Vec<String> {
    discover_with_cap(page, source_url, MAX_DISCOVERED_LINKS)
}

pub fn discover_with_cap(page: &RenderedPage, source_url: &str, cap: usize) -> Vec<String> {
    let base = match Url::parse(source_url) {
        Ok(base) if base.host_str().is_some() => base,
        Ok(_) | Err(_) => {
            warn!(%source_url, "Source URL has no host; skipping link discovery");
            return Vec::new();
        }
    };

    let links: Vec<String> = page
        .links
        .iter()
        .map(|href| href.trim())
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .filter(|url| url.host_str() == base.host_str())
        .map(String::from)
        .filter(|url| is_article_candidate(url))
        .unique()
        .take(cap)
        .collect();

    debug!(%source_url, anchors = page.links.len(), kept = links.len(), "Discovered links");
    links
}

fn is_article_candidate(url: &str) -> bool {
    if EXCLUDED.iter().any(|term| url.contains(term)) {
        return false;
    }
    let lower = url.to_lowercase();
    ARTICLE_HINTS.iter().any(|hint| lower.contains(hint))
}
