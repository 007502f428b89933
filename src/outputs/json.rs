//! JSON export of a crawl.
//!
//! # Output Structure
//!
//! ```text
//! {
//!   "scraping_date": "2025-03-07T09:05:01.123+00:00",
//!   "total_articles": 42,
//!   "method": "http_renderer",
//!   "source_websites": ["Spine Market Group", ...],
//!   "articles": [ { "title": ..., "website_name": ..., "spine_procedures": [...], ... } ]
//! }
//! ```

use crate::error::CrawlError;
use crate::models::{Article, CrawlResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
pub struct JsonExport<'a> {
    pub scraping_date: DateTime<Utc>,
    pub total_articles: usize,
    pub method: &'a str,
    pub source_websites: &'a [String],
    pub articles: &'a [Article],
}

impl<'a> JsonExport<'a> {
    pub fn new(result: &'a CrawlResult, scraping_date: DateTime<Utc>) -> Self {
        Self {
            scraping_date,
            total_articles: result.articles.len(),
            method: &result.method,
            source_websites: &result.source_websites,
            articles: &result.articles,
        }
    }
}

/// Write `result` as pretty-printed JSON to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_result(
    result: &CrawlResult,
    scraping_date: DateTime<Utc>,
    path: &Path,
) -> Result<(), CrawlError> {
    let json = serde_json::to_string_pretty(&JsonExport::new(result, scraping_date))?;
    fs::write(path, json).await?;
    info!(articles = result.articles.len(), "Wrote JSON export");
    Ok(())
}
