//! Command-line interface definitions.
//!
//! Global options can also be provided through environment variables.

use crate::config::{AppConfig, CrawlConfig, DEFAULT_OUTPUT_DIR, Pacing, default_sites, load_sites};
use crate::error::CrawlError;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the spine industry crawler.
///
/// # Examples
///
/// ```sh
/// # One crawl over the default sites, exports into ./spine_industry_data
/// spine_industry_crawler crawl
///
/// # Custom site list, faster pacing
/// spine_industry_crawler --sites sites.yaml --pace-unit-ms 250 crawl
///
/// # Control panel
/// spine_industry_crawler serve --bind 127.0.0.1:5000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory for CSV, JSON and summary exports
    #[arg(short, long, global = true, env = "CRAWL_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// YAML list of `{name, url, category}` sites; defaults to the built-in list
    #[arg(short, long, global = true, env = "CRAWL_SITES")]
    pub sites: Option<PathBuf>,

    /// Length of one pacing/timeout unit in milliseconds
    #[arg(long, global = true, env = "CRAWL_PACE_UNIT_MS", default_value_t = 1000)]
    pub pace_unit_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Crawl every site once and export the results
    Crawl,
    /// Run the web control panel
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "CRAWL_BIND", default_value = "0.0.0.0:5000")]
        bind: SocketAddr,
    },
}

impl Cli {
    /// Build the run configuration, loading the site list if one was given.
    pub async fn app_config(&self) -> Result<AppConfig, CrawlError> {
        let sites = match &self.sites {
            Some(path) => load_sites(path).await?,
            None => default_sites(),
        };
        Ok(AppConfig {
            sites,
            crawl: CrawlConfig {
                pacing: Pacing {
                    unit: Duration::from_millis(self.pace_unit_ms),
                    ..Pacing::default()
                },
                ..CrawlConfig::default()
            },
            output_dir: self.output_dir.clone(),
        })
    }
}
