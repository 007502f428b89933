//! Error taxonomy for the crawler.
//!
//! Most of these never leave the crawl loop: page-level failures are logged
//! and skipped, homepage failures end a single site. Only the variants for
//! which [`CrawlError::aborts_run`] returns `true` stop a whole run.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The renderer could not be created. Nothing can be crawled.
    #[error("renderer setup failed: {0}")]
    RendererSetup(String),

    #[error("failed to load {url}: {reason}")]
    PageLoad { url: String, reason: String },

    #[error("timed out loading {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} rendered an empty page")]
    EmptyPage { url: String },

    /// The renderer was released while the run still needed it.
    #[error("renderer session is closed")]
    RendererClosed,

    #[error("crawl cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid site list: {0}")]
    SiteList(#[from] serde_yaml::Error),
}

impl CrawlError {
    /// Whether this error ends the whole run rather than a page or a site.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            CrawlError::RendererSetup(_) | CrawlError::RendererClosed | CrawlError::Cancelled
        )
    }
}
