//! Page loading.
//!
//! A [`Renderer`] turns a URL into a [`RenderedPage`]. The crawl loop only
//! talks to this trait; the session behind it (an HTTP client here, a
//! headless browser elsewhere) is created by a [`RendererFactory`] when a
//! run starts and closed when the run ends.

use crate::dom;
use crate::error::CrawlError;
use crate::models::RenderedPage;
use scraper::Html;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Browser-like user agent; several target sites refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Loads pages for the crawler.
pub trait Renderer: Send + Sync {
    /// Load `url`, giving up after `timeout`.
    fn load(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<RenderedPage, CrawlError>> + Send;

    /// Release the session. Loads after this fail with
    /// [`CrawlError::RendererClosed`].
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Short description of the fetch method, recorded on every article.
    fn name(&self) -> &'static str;
}

/// Creates one renderer per run.
pub trait RendererFactory: Send + Sync + 'static {
    type Renderer: Renderer + 'static;

    fn create(&self) -> Result<Self::Renderer, CrawlError>;
}

/// Build a [`RenderedPage`] from a fetched HTML document.
pub fn render_html(url: &str, html: &str) -> RenderedPage {
    let document = Html::parse_document(html);
    RenderedPage {
        url: url.to_string(),
        title: dom::title(&document),
        html: html.to_string(),
        raw_text: dom::body_text(&document),
        links: dom::anchor_hrefs(&document),
    }
}

/// Renderer backed by a plain HTTP client.
///
/// Scripts are not executed; the page is whatever the server sends.
#[derive(Debug)]
pub struct HttpRenderer {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl HttpRenderer {
    pub fn new(user_agent: &str) -> Result<Self, CrawlError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| CrawlError::RendererSetup(e.to_string()))?;

        info!("HTTP renderer ready");
        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl Renderer for HttpRenderer {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn load(&self, url: &str, timeout: Duration) -> Result<RenderedPage, CrawlError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CrawlError::RendererClosed);
        }

        let t0 = Instant::now();
        let body = match tokio::time::timeout(timeout, self.fetch(url)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                warn!(error = %e, "Page load failed");
                return Err(CrawlError::PageLoad {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(?timeout, "Page load timed out");
                return Err(CrawlError::Timeout {
                    url: url.to_string(),
                    timeout,
                });
            }
        };

        let page = render_html(url, &body);
        if page.is_empty() {
            return Err(CrawlError::EmptyPage {
                url: url.to_string(),
            });
        }
        debug!(
            bytes = body.len(),
            links = page.links.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rendered page"
        );
        Ok(page)
    }

    async fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("HTTP renderer closed");
        }
    }

    fn name(&self) -> &'static str {
        "http_renderer"
    }
}

/// Builds an [`HttpRenderer`] per run.
#[derive(Debug, Clone)]
pub struct HttpRendererFactory {
    pub user_agent: String,
}

impl Default for HttpRendererFactory {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RendererFactory for HttpRendererFactory {
    type Renderer = HttpRenderer;

    fn create(&self) -> Result<HttpRenderer, CrawlError> {
        HttpRenderer::new(&self.user_agent)
    }
}
