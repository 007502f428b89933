//! One crawl over every configured site.

use super::observer::RunObserver;
use super::pause;
use super::site::{SiteAborted, SiteCrawler};
use crate::config::CrawlConfig;
use crate::models::{Article, CrawlResult, TargetSite};
use crate::renderer::Renderer;
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Runs [`SiteCrawler`] over a site list with a single renderer.
#[derive(Debug)]
pub struct CrawlRun<'a> {
    config: &'a CrawlConfig,
    cancel: CancellationToken,
}

impl<'a> CrawlRun<'a> {
    pub fn new(config: &'a CrawlConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Crawl `sites` in order and close `renderer` afterwards.
    ///
    /// Sites are separated by a fixed pause (none after the last). A
    /// homepage failure costs one site; cancellation or a closed renderer
    /// ends the run early with whatever was collected, recorded in
    /// [`CrawlResult::aborted`]. The renderer is closed on every path.
    #[instrument(level = "info", skip_all, fields(sites = sites.len()))]
    pub async fn run<R: Renderer>(
        &self,
        mut renderer: R,
        sites: &[TargetSite],
        observer: &dyn RunObserver,
    ) -> CrawlResult {
        let t0 = Instant::now();
        let mut result = CrawlResult {
            method: renderer.name().to_string(),
            source_websites: sites.iter().map(|s| s.name.clone()).collect(),
            ..CrawlResult::default()
        };

        {
            let mut crawler = SiteCrawler::new(&renderer, self.config, &self.cancel, observer);
            for (index, site) in sites.iter().enumerate() {
                observer.site_started(index, sites.len(), site);

                match crawler.crawl(site).await {
                    Ok(articles) => {
                        log_site_summary(site, &articles, observer);
                        result.articles.extend(articles);
                    }
                    Err(SiteAborted { articles, error }) => {
                        warn!(site = %site.name, error = %error, "Run interrupted");
                        result.articles.extend(articles);
                        result.aborted = Some(error);
                        break;
                    }
                }

                if index + 1 < sites.len() {
                    let delay = self.config.pacing.units(self.config.pacing.between_sites);
                    info!(?delay, "Waiting before next website");
                    if let Err(error) = pause(&self.cancel, delay).await {
                        result.aborted = Some(error);
                        break;
                    }
                }
            }
        }

        renderer.close().await;
        observer.log("Renderer closed");

        let elapsed = t0.elapsed();
        match &result.aborted {
            Some(e) if !result.was_cancelled() => {
                error!(error = %e, articles = result.articles.len(), "Crawl aborted")
            }
            Some(_) => {
                observer.log("Scraping interrupted by stop request");
                info!(articles = result.articles.len(), "Crawl cancelled")
            }
            None => info!(
                articles = result.articles.len(),
                secs = elapsed.as_secs(),
                "Crawl complete"
            ),
        }
        result
    }
}

fn log_site_summary(site: &TargetSite, articles: &[Article], observer: &dyn RunObserver) {
    if articles.is_empty() {
        return;
    }
    let procedures: HashSet<&str> = articles
        .iter()
        .flat_map(|a| a.procedures_found.iter().map(String::as_str))
        .collect();
    let with_financial = articles
        .iter()
        .filter(|a| !a.financial_mentions.is_empty())
        .count();
    info!(
        site = %site.name,
        articles = articles.len(),
        procedures = procedures.len(),
        with_financial,
        "Site summary"
    );
    observer.log(&format!(
        "Summary for {}: {} procedures, {} financial mentions",
        site.name,
        procedures.len(),
        with_financial
    ));
}
