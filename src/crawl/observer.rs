//! Progress hooks.
//!
//! The crawl loop logs through `tracing` regardless; an observer receives the
//! short human-readable milestones and counters the control panel shows.

use crate::models::TargetSite;

pub trait RunObserver: Send + Sync {
    /// A milestone line, e.g. `"Homepage loaded: 4,210 characters"`.
    fn log(&self, message: &str);

    /// Called before site `index` (zero-based) of `total` is crawled.
    fn site_started(&self, _index: usize, _total: usize, _site: &TargetSite) {}

    /// Running total of articles collected so far in this run.
    fn articles_collected(&self, _total: usize) {}
}

/// Observer for runs nobody is polling (the CLI).
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl RunObserver for Silent {
    fn log(&self, _message: &str) {}
}
