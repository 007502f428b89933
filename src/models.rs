//! Data models shared by the crawler, the exporters and the control panel.
//!
//! - [`TargetSite`]: one configured crawl target
//! - [`RenderedPage`]: what the renderer hands back for a single URL
//! - [`Article`]: one extracted page, as exported
//! - [`CrawlResult`]: everything a run produced, in crawl order
//!
//! The serialized field names of [`Article`] match the export format
//! (`website_name`, `spine_procedures`), hence the `serde(rename)` attributes.

use crate::error::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A website to crawl.
///
/// # Fields
///
/// * `name` - Human-readable site name, used as `website_name` in exports
/// * `url` - Homepage URL; also the base for same-domain link discovery
/// * `category` - Free-form grouping label (e.g. `"industry_news"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSite {
    pub name: String,
    pub url: String,
    pub category: String,
}

impl TargetSite {
    pub fn new(name: &str, url: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
        }
    }
}

/// A loaded page as produced by a [`Renderer`](crate::renderer::Renderer).
///
/// Owned by whoever requested it and dropped once extraction is done.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// The URL that was requested.
    pub url: String,
    /// The document title as reported by the page.
    pub title: String,
    /// Serialized DOM snapshot the extraction strategies query.
    pub html: String,
    /// Visible body text, one block per line.
    pub raw_text: String,
    /// Every anchor `href` on the page, in document order, unresolved.
    pub links: Vec<String>,
}

impl RenderedPage {
    /// A page with neither markup nor visible text counts as a failed load.
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty() && self.raw_text.trim().is_empty()
    }
}

/// One extracted page.
///
/// Created once per successfully extracted page and never mutated after.
/// `content` may be truncated, `content_length` always counts the
/// characters of the full extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(rename = "website_name")]
    pub site_name: String,
    pub category: String,
    pub content: String,
    pub content_length: usize,
    /// Procedure terms found in the content, vocabulary order, no repeats.
    #[serde(rename = "spine_procedures")]
    pub procedures_found: Vec<String>,
    /// Financial figures in pattern order, then match order. May repeat.
    pub financial_mentions: Vec<String>,
    pub scraped_at: DateTime<Utc>,
    /// Optional metadata for fields without a dedicated slot (e.g. `method`).
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The outcome of a whole crawl run.
#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Articles in site order, then crawl order within a site.
    pub articles: Vec<Article>,
    /// Name of the renderer that loaded the pages.
    pub method: String,
    /// Names of the sites the run was configured with.
    pub source_websites: Vec<String>,
    /// What stopped the run early, if anything.
    pub aborted: Option<CrawlError>,
}

impl CrawlResult {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.aborted, Some(CrawlError::Cancelled))
    }
}
