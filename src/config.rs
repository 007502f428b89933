//! Crawl configuration: target sites, caps, timeouts and pacing.
//!
//! Durations are expressed in *time units* so the whole schedule can be
//! scaled at once; one unit is a second unless `--pace-unit-ms` says
//! otherwise.

use crate::error::CrawlError;
use crate::models::TargetSite;
use rand::{Rng, rng};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Default output directory for exports.
pub const DEFAULT_OUTPUT_DIR: &str = "spine_industry_data";

/// Sites crawled when no site list is given.
pub fn default_sites() -> Vec<TargetSite> {
    vec![
        TargetSite::new(
            "Spine Market Group",
            "https://thespinemarketgroup.com/",
            "industry_news",
        ),
        TargetSite::new("Spine Market", "https://spine-market.com/", "market_research"),
        TargetSite::new("Ortho Spine News", "https://orthospinenews.com/", "research_reports"),
        TargetSite::new(
            "Becker's Spine Review",
            "https://www.beckersspine.com/",
            "healthcare_insights",
        ),
    ]
}

/// Load a YAML list of `{name, url, category}` entries.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_sites(path: &Path) -> Result<Vec<TargetSite>, CrawlError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let sites: Vec<TargetSite> = serde_yaml::from_str(&raw)?;
    info!(count = sites.len(), "Loaded site list");
    Ok(sites)
}

/// Randomized delays between page loads.
///
/// Ranges are in time units and sampled uniformly for every pause.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub unit: Duration,
    /// Before the homepage load, to let dynamic content settle.
    pub settle: (f64, f64),
    /// Before every sub-article load.
    pub between_articles: (f64, f64),
    /// Between two sites; not after the last one.
    pub between_sites: f64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            settle: (2.0, 4.0),
            between_articles: (3.0, 7.0),
            between_sites: 10.0,
        }
    }
}

impl Pacing {
    /// All pauses collapse to zero. Handy for tests.
    pub fn immediate() -> Self {
        Self {
            unit: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn units(&self, n: f64) -> Duration {
        self.unit.mul_f64(n.max(0.0))
    }

    pub fn jittered(&self, (low, high): (f64, f64)) -> Duration {
        let n = if high > low {
            rng().random_range(low..=high)
        } else {
            low
        };
        self.units(n)
    }
}

/// Caps, thresholds and timeouts for one run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// How many discovered links are kept per page.
    pub max_discovered_links: usize,
    /// How many sub-articles are attempted per site.
    pub max_article_attempts: usize,
    pub homepage_content_cap: usize,
    pub article_content_cap: usize,
    /// Sub-articles at or below this many characters are skipped.
    pub min_article_chars: usize,
    /// Homepage load timeout, in time units.
    pub homepage_timeout: f64,
    /// Sub-article load timeout, in time units.
    pub article_timeout: f64,
    pub pacing: Pacing,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_discovered_links: crate::extract::links::MAX_DISCOVERED_LINKS,
            max_article_attempts: 20,
            homepage_content_cap: 5000,
            article_content_cap: 8000,
            min_article_chars: 50,
            homepage_timeout: 10.0,
            article_timeout: 15.0,
            pacing: Pacing::default(),
        }
    }
}

impl CrawlConfig {
    pub fn homepage_timeout(&self) -> Duration {
        self.timeout(self.homepage_timeout)
    }

    pub fn article_timeout(&self) -> Duration {
        self.timeout(self.article_timeout)
    }

    // A zero unit must not turn into a zero timeout.
    fn timeout(&self, units: f64) -> Duration {
        if self.pacing.unit.is_zero() {
            Duration::from_secs_f64(units)
        } else {
            self.pacing.units(units)
        }
    }
}

/// Everything a run needs besides the renderer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sites: Vec<TargetSite>,
    pub crawl: CrawlConfig,
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            crawl: CrawlConfig::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}
