//! # Spine Industry Crawler
//!
//! Crawls a fixed list of spine industry websites, extracts article text
//! together with procedure and financial keyword metadata, and exports the
//! results as CSV, JSON and a plain-text summary.
//!
//! ## Usage
//!
//! ```sh
//! spine_industry_crawler crawl
//! spine_industry_crawler serve --bind 0.0.0.0:5000
//! ```
//!
//! ## Architecture
//!
//! 1. **Loading**: a [`renderer::Renderer`] turns each URL into a page snapshot
//! 2. **Extraction**: content cascade, link discovery and keyword tagging
//!    ([`extract`])
//! 3. **Crawling**: homepage plus discovered articles per site, strictly
//!    sequential and paced ([`crawl`])
//! 4. **Output**: CSV, JSON and summary files ([`outputs`])
//!
//! `serve` wraps the same pipeline in a small web control panel ([`server`]).

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawl;
mod dom;
mod error;
mod extract;
mod models;
mod outputs;
mod renderer;
mod server;
mod utils;

use cli::{Cli, Command};
use config::AppConfig;
use crawl::{CrawlRun, Silent};
use outputs::summary::{Insights, with_thousands};
use renderer::{HttpRendererFactory, RendererFactory};
use server::RunSupervisor;
use utils::{ensure_writable_dir, truncate_for_log};

const SAMPLE_ARTICLES: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("spine_industry_crawler starting up");

    let args = Cli::parse();
    let settings = args.app_config().await?;
    info!(
        sites = settings.sites.len(),
        output_dir = %settings.output_dir.display(),
        unit = ?settings.crawl.pacing.unit,
        "Configuration loaded"
    );

    match args.command {
        Command::Crawl => crawl_once(settings).await?,
        Command::Serve { bind } => {
            let supervisor = RunSupervisor::new(HttpRendererFactory::default(), settings);
            server::serve(bind, supervisor).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// One crawl over every site, exported on completion or Ctrl-C.
#[instrument(level = "info", skip_all)]
async fn crawl_once(settings: AppConfig) -> Result<(), Box<dyn Error>> {
    // Early check: fail before spending minutes crawling
    if let Err(e) = ensure_writable_dir(&settings.output_dir).await {
        error!(
            path = %settings.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let renderer = HttpRendererFactory::default().create()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; stopping crawl");
                cancel.cancel();
            }
        });
    }

    let mut result = CrawlRun::new(&settings.crawl, cancel)
        .run(renderer, &settings.sites, &Silent)
        .await;

    if result.is_empty() {
        warn!("No articles were scraped");
    } else {
        let paths = outputs::export_all(&result, &settings.output_dir).await?;
        info!(
            csv = %paths.csv.display(),
            json = %paths.json.display(),
            summary = %paths.summary.display(),
            "Results exported"
        );
        log_analysis(&result);
    }

    match result.aborted.take() {
        None | Some(error::CrawlError::Cancelled) => Ok(()),
        Some(e) => Err(e.into()),
    }
}

fn log_analysis(result: &models::CrawlResult) {
    let insights = Insights::from_articles(&result.articles);
    info!(
        total = insights.total,
        with_financial = insights.with_financial,
        unique_procedures = insights.procedures.len(),
        average_content = %with_thousands(insights.average_content),
        "Final analysis"
    );
    for (website, count) in &insights.by_website {
        info!(%website, articles = count, "Articles by website");
    }
    for (procedure, mentions) in insights.top_procedures().iter().take(5) {
        info!(%procedure, mentions, "Top procedure");
    }
    for article in result.articles.iter().take(SAMPLE_ARTICLES) {
        info!(
            title = %truncate_for_log(&article.title, 80),
            site = %article.site_name,
            chars = article.content_length,
            "Sample article"
        );
    }
}
