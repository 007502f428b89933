//! Crawling a single site.
//!
//! ```text
//! INIT → FETCH_HOMEPAGE → FAILED
//!                       → HOMEPAGE_OK → DISCOVER_LINKS → FETCH_ARTICLES (loop) → DONE
//! ```
//!
//! A homepage that cannot be loaded ends the site with no articles. Failed
//! or thin sub-articles are skipped. Only cancellation or a closed renderer
//! interrupt a site early, see [`SiteAborted`].

use super::observer::RunObserver;
use super::pause;
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::extract::content::{self, Extracted};
use crate::extract::{links, metadata};
use crate::models::{Article, RenderedPage, TargetSite};
use crate::renderer::Renderer;
use crate::utils::truncate_chars;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// A site crawl that was cut short.
///
/// Carries the articles collected before the interruption so the run can
/// keep them.
#[derive(Debug)]
pub struct SiteAborted {
    pub articles: Vec<Article>,
    pub error: CrawlError,
}

/// Crawls sites one after another with a shared renderer.
///
/// URLs visited through one crawler are never fetched twice, which keeps
/// article URLs unique across the whole run.
pub struct SiteCrawler<'a, R> {
    renderer: &'a R,
    config: &'a CrawlConfig,
    cancel: &'a CancellationToken,
    observer: &'a dyn RunObserver,
    visited: HashSet<String>,
    collected: usize,
}

impl<'a, R: Renderer> SiteCrawler<'a, R> {
    pub fn new(
        renderer: &'a R,
        config: &'a CrawlConfig,
        cancel: &'a CancellationToken,
        observer: &'a dyn RunObserver,
    ) -> Self {
        Self {
            renderer,
            config,
            cancel,
            observer,
            visited: HashSet::new(),
            collected: 0,
        }
    }

    /// Crawl `site`: its homepage, then up to the configured number of
    /// discovered article links.
    #[instrument(level = "info", skip_all, fields(site = %site.name))]
    pub async fn crawl(&mut self, site: &TargetSite) -> Result<Vec<Article>, SiteAborted> {
        let mut articles = Vec::new();
        info!(url = %site.url, "Scraping site");
        self.observer.log(&format!("Starting to scrape: {}", site.name));

        let settle = self.config.pacing.jittered(self.config.pacing.settle);
        if let Err(error) = pause(self.cancel, settle).await {
            return Err(SiteAborted { articles, error });
        }

        // Discovered links come back in parsed form; the homepage must match.
        let home = Url::parse(&site.url)
            .map(String::from)
            .unwrap_or_else(|_| site.url.clone());
        self.visited.insert(home.clone());
        let homepage = match self.fetch(&home, self.config.homepage_timeout()).await {
            Ok(page) => page,
            Err(error) if error.aborts_run() => return Err(SiteAborted { articles, error }),
            Err(error) => {
                warn!(error = %error, "Could not load homepage");
                self.observer
                    .log(&format!("Could not load homepage for {}: {}", site.name, error));
                return Ok(articles);
            }
        };

        let extracted = content::extract(&homepage);
        let discovered =
            links::discover_with_cap(&homepage, &site.url, self.config.max_discovered_links);
        drop(homepage);

        let article = self.build_article(site, &home, extracted, self.config.homepage_content_cap);
        info!(chars = article.content_length, "Homepage loaded");
        self.observer
            .log(&format!("Homepage loaded: {} characters", article.content_length));
        self.push(&mut articles, article);

        let pending: Vec<String> = discovered
            .into_iter()
            .filter(|url| !self.visited.contains(url))
            .collect();
        info!(links = pending.len(), "Found article links");
        self.observer
            .log(&format!("Found {} article links", pending.len()));

        let attempts = pending.len().min(self.config.max_article_attempts);
        for (i, url) in pending.into_iter().take(attempts).enumerate() {
            let delay = self.config.pacing.jittered(self.config.pacing.between_articles);
            if let Err(error) = pause(self.cancel, delay).await {
                return Err(SiteAborted { articles, error });
            }

            self.visited.insert(url.clone());
            debug!(attempt = i + 1, of = attempts, %url, "Fetching article");
            match self.fetch(&url, self.config.article_timeout()).await {
                Ok(page) => {
                    let extracted = content::extract(&page);
                    let chars = extracted.body.chars().count();
                    if chars > self.config.min_article_chars {
                        let article =
                            self.build_article(site, &url, extracted, self.config.article_content_cap);
                        debug!(%url, chars, "Scraped article");
                        self.push(&mut articles, article);
                    } else {
                        debug!(%url, chars, "Low quality page; skipping");
                    }
                }
                Err(error) if error.aborts_run() => return Err(SiteAborted { articles, error }),
                Err(error) => {
                    warn!(%url, error = %error, "Article fetch failed; skipping");
                }
            }
        }

        info!(articles = articles.len(), "Site complete");
        self.observer.log(&format!(
            "{} complete: {} articles scraped",
            site.name,
            articles.len()
        ));
        Ok(articles)
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RenderedPage, CrawlError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CrawlError::Cancelled),
            page = self.renderer.load(url, timeout) => page,
        }
    }

    fn push(&mut self, articles: &mut Vec<Article>, article: Article) {
        articles.push(article);
        self.collected += 1;
        self.observer.articles_collected(self.collected);
    }

    fn build_article(&self, site: &TargetSite, url: &str, extracted: Extracted, cap: usize) -> Article {
        let tags = metadata::tag(&extracted.body);
        let mut extra = BTreeMap::new();
        extra.insert(
            "method".to_string(),
            serde_json::Value::from(self.renderer.name()),
        );

        Article {
            title: extracted.title,
            url: url.to_string(),
            site_name: site.name.clone(),
            category: site.category.clone(),
            content_length: extracted.body.chars().count(),
            content: truncate_chars(&extracted.body, cap).to_string(),
            procedures_found: tags.procedures,
            financial_mentions: tags.financial,
            scraped_at: Utc::now(),
            extra,
        }
    }
}
