//! The crawl loop.
//!
//! - [`run`]: one pass over every configured site, owning the renderer
//! - [`site`]: homepage plus discovered articles for a single site
//! - [`observer`]: progress hooks for whoever is watching the run
//!
//! Everything is strictly sequential. Every load and every pause races the
//! run's [`CancellationToken`] so a stop request takes effect promptly.

pub mod observer;
pub mod run;
pub mod site;

pub use observer::{RunObserver, Silent};
pub use run::CrawlRun;

use crate::error::CrawlError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `duration` unless the run is cancelled first.
pub(crate) async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<(), CrawlError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CrawlError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
