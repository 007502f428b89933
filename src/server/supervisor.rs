//! Background run management for the control panel.
//!
//! At most one crawl runs at a time. The [`RunSupervisor`] owns the shared
//! [`RunState`]; the crawl writes into it through a [`RunReporter`] and
//! pollers only ever receive snapshots.
//!
//! ```text
//! ready ─start→ running ─┬→ completed
//!                        ├→ no_articles
//!                        ├→ error
//!                        └→ stopped
//! ```
//!
//! Every terminal phase can be left again by another `start`.

use crate::config::AppConfig;
use crate::crawl::{CrawlRun, RunObserver};
use crate::error::CrawlError;
use crate::models::{CrawlResult, TargetSite};
use crate::outputs;
use crate::renderer::{Renderer, RendererFactory};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Lines kept in the run log.
pub const LOG_CAPACITY: usize = 100;

const PROGRESS_STARTED: u8 = 10;
/// Progress once the last site has been started.
const PROGRESS_SITES_END: u8 = 90;
const PROGRESS_DONE: u8 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Scraping already in progress")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Ready,
    Running,
    Completed,
    NoArticles,
    Error,
    Stopped,
}

/// Snapshot of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub status: RunPhase,
    pub is_running: bool,
    /// 0 to 100.
    pub progress: u8,
    pub current_website: String,
    pub articles_scraped: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            status: RunPhase::Ready,
            is_running: false,
            progress: 0,
            current_website: String::new(),
            articles_scraped: 0,
            start_time: None,
            end_time: None,
            error: None,
        }
    }
}

/// Bounded, timestamped run log. Oldest lines fall off first.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `message` as `[HH:MM:SS] message`.
    pub fn push(&mut self, message: &str) {
        self.push_at(Local::now(), message);
    }

    pub fn push_at(&mut self, at: DateTime<Local>, message: &str) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines
            .push_back(format!("[{}] {}", at.format("%H:%M:%S"), message));
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Status and log of the supervised run, plus its cancellation handle.
#[derive(Debug)]
pub struct RunState {
    status: RunStatus,
    logs: LogBuffer,
    cancel: Option<CancellationToken>,
    /// Mirrors `status.is_running` for waiters.
    running: watch::Sender<bool>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: RunStatus::default(),
            logs: LogBuffer::default(),
            cancel: None,
            running: watch::channel(false).0,
        }
    }
}

impl RunState {
    /// Enter `running`, resetting status and log. Refused while a run is
    /// active, leaving its state untouched.
    fn begin(&mut self, cancel: CancellationToken) -> Result<(), ControlError> {
        if self.status.is_running {
            return Err(ControlError::AlreadyRunning);
        }
        self.status = RunStatus {
            status: RunPhase::Running,
            is_running: true,
            start_time: Some(Utc::now()),
            ..RunStatus::default()
        };
        self.logs.clear();
        self.cancel = Some(cancel);
        self.running.send_replace(true);
        Ok(())
    }

    /// Record the terminal phase. Only the first call per run has an effect.
    fn finish(&mut self, phase: RunPhase, error: Option<String>) -> bool {
        if !self.status.is_running {
            return false;
        }
        self.status.status = phase;
        self.status.is_running = false;
        self.status.progress = PROGRESS_DONE;
        self.status.end_time = Some(Utc::now());
        self.status.error = error;
        self.cancel = None;
        self.running.send_replace(false);
        true
    }
}

fn lock(state: &Mutex<RunState>) -> MutexGuard<'_, RunState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feeds crawl progress into the shared [`RunState`].
#[derive(Debug, Clone)]
pub struct RunReporter {
    state: Arc<Mutex<RunState>>,
}

impl RunReporter {
    fn set_progress(&self, progress: u8) {
        lock(&self.state).status.progress = progress;
    }
}

impl RunObserver for RunReporter {
    fn log(&self, message: &str) {
        lock(&self.state).logs.push(message);
    }

    fn site_started(&self, index: usize, total: usize, site: &TargetSite) {
        let mut state = lock(&self.state);
        let span = usize::from(PROGRESS_SITES_END - PROGRESS_STARTED);
        let progress = usize::from(PROGRESS_STARTED) + span * index / total.max(1);
        state.status.progress = u8::try_from(progress).unwrap_or(PROGRESS_SITES_END);
        state.status.current_website = site.name.clone();
        state
            .logs
            .push(&format!("Scraping {} ({}/{})", site.name, index + 1, total));
    }

    fn articles_collected(&self, total: usize) {
        lock(&self.state).status.articles_scraped = total;
    }
}

/// Runs crawls in the background, one at a time.
pub struct RunSupervisor<F> {
    factory: Arc<F>,
    settings: Arc<AppConfig>,
    state: Arc<Mutex<RunState>>,
}

impl<F> Clone for RunSupervisor<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            settings: Arc::clone(&self.settings),
            state: Arc::clone(&self.state),
        }
    }
}

impl<F: RendererFactory> RunSupervisor<F> {
    pub fn new(factory: F, settings: AppConfig) -> Self {
        Self {
            factory: Arc::new(factory),
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(RunState::default())),
        }
    }

    pub fn settings(&self) -> &AppConfig {
        &self.settings
    }

    /// Start a crawl on a background task.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(level = "info", skip_all)]
    pub fn start(&self) -> Result<(), ControlError> {
        let cancel = CancellationToken::new();
        {
            let mut state = lock(&self.state);
            if let Err(e) = state.begin(cancel.clone()) {
                warn!("Start refused: a run is already active");
                return Err(e);
            }
            state.logs.push("Starting spine industry crawl");
        }
        info!(sites = self.settings.sites.len(), "Crawl started");

        tokio::spawn(drive(
            Arc::clone(&self.factory),
            Arc::clone(&self.settings),
            Arc::clone(&self.state),
            cancel,
        ));
        Ok(())
    }

    /// Request cancellation of the active run. Returns `false` when no run
    /// is active. The run itself records the `stopped` phase once its
    /// renderer has been released.
    pub fn stop(&self) -> bool {
        let mut state = lock(&self.state);
        if !state.status.is_running {
            return false;
        }
        match state.cancel.clone() {
            Some(cancel) => {
                cancel.cancel();
                state.logs.push("Stop requested");
                info!("Stop requested");
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> RunStatus {
        lock(&self.state).status.clone()
    }

    /// Wait until no run is active, then return the final status.
    ///
    /// A stopped run still closes its renderer and exports what it
    /// collected before this returns.
    pub async fn wait_idle(&self) -> RunStatus {
        let mut running = lock(&self.state).running.subscribe();
        // The sender lives in `state`, which `self` keeps alive.
        let _ = running.wait_for(|running| !*running).await;
        self.status()
    }

    /// The most recent `n` log lines, oldest first.
    pub fn logs(&self, n: usize) -> Vec<String> {
        lock(&self.state).logs.tail(n)
    }
}

async fn drive<F: RendererFactory>(
    factory: Arc<F>,
    settings: Arc<AppConfig>,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
) {
    let reporter = RunReporter {
        state: Arc::clone(&state),
    };

    let renderer = match factory.create() {
        Ok(renderer) => renderer,
        Err(e) => {
            error!(error = %e, "Renderer setup failed");
            let mut state = lock(&state);
            state.logs.push(&format!("Error: {e}"));
            state.finish(RunPhase::Error, Some(e.to_string()));
            return;
        }
    };
    reporter.log(&format!("Renderer ready ({})", renderer.name()));
    reporter.set_progress(PROGRESS_STARTED);

    let task = {
        let settings = Arc::clone(&settings);
        let reporter = reporter.clone();
        tokio::spawn(async move {
            CrawlRun::new(&settings.crawl, cancel)
                .run(renderer, &settings.sites, &reporter)
                .await
        })
    };

    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Crawl task failed");
            let mut state = lock(&state);
            state.logs.push(&format!("Error: crawl task failed: {e}"));
            state.finish(RunPhase::Error, Some(format!("crawl task failed: {e}")));
            return;
        }
    };

    let (phase, error) = conclude(&result, &settings, &reporter).await;
    let mut state = lock(&state);
    state.status.articles_scraped = result.articles.len();
    state.finish(phase, error);
    info!(phase = ?phase, articles = result.articles.len(), "Run finished");
}

/// Export what the run produced and pick its terminal phase.
async fn conclude(
    result: &CrawlResult,
    settings: &AppConfig,
    reporter: &RunReporter,
) -> (RunPhase, Option<String>) {
    if !result.is_empty() {
        match outputs::export_all(result, &settings.output_dir).await {
            Ok(paths) => reporter.log(&format!(
                "Exported {} articles to {}",
                result.articles.len(),
                paths.csv.display()
            )),
            Err(e) => {
                error!(error = %e, "Export failed");
                reporter.log(&format!("Error: export failed: {e}"));
                return (RunPhase::Error, Some(format!("export failed: {e}")));
            }
        }
    }

    match &result.aborted {
        Some(CrawlError::Cancelled) => {
            reporter.log("Scraping stopped");
            (RunPhase::Stopped, None)
        }
        Some(e) => {
            reporter.log(&format!("Error: {e}"));
            (RunPhase::Error, Some(e.to_string()))
        }
        None if result.is_empty() => {
            reporter.log("No articles were scraped");
            (RunPhase::NoArticles, Some("No articles were scraped".to_string()))
        }
        None => {
            reporter.log(&format!(
                "Scraping completed: {} articles",
                result.articles.len()
            ));
            (RunPhase::Completed, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlConfig, Pacing};
    use crate::renderer::fixtures::ScriptedFactory;
    use chrono::TimeZone;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::Notify;

    const HOME: &str = "https://medtech.example/";

    fn settings(output_dir: &Path) -> AppConfig {
        AppConfig {
            sites: vec![TargetSite::new("MedTech", HOME, "industry_news")],
            crawl: CrawlConfig {
                pacing: Pacing::immediate(),
                ..CrawlConfig::default()
            },
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn homepage() -> String {
        format!(
            "<html><head><title>Home</title></head><body><article>{}</article></body></html>",
            "Cervical disc replacement volumes keep rising. ".repeat(4)
        )
    }

    async fn wait_idle<F: RendererFactory>(supervisor: &RunSupervisor<F>) -> RunStatus {
        tokio::time::timeout(Duration::from_secs(5), supervisor.wait_idle())
            .await
            .expect("run did not finish")
    }

    #[test]
    fn test_log_buffer_keeps_most_recent() {
        let mut logs = LogBuffer::with_capacity(3);
        let at = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        for i in 0..5 {
            logs.push_at(at, &format!("line {i}"));
        }
        assert_eq!(logs.len(), 3);
        assert_eq!(
            logs.tail(10),
            vec!["[09:05:01] line 2", "[09:05:01] line 3", "[09:05:01] line 4"]
        );
        assert_eq!(logs.tail(1), vec!["[09:05:01] line 4"]);
    }

    #[test]
    fn test_finish_applies_once() {
        let mut state = RunState::default();
        state.begin(CancellationToken::new()).unwrap();
        assert!(state.finish(RunPhase::Stopped, None));
        assert!(!state.finish(RunPhase::Error, Some("late".to_string())));
        assert_eq!(state.status.status, RunPhase::Stopped);
        assert!(state.status.error.is_none());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RunPhase::NoArticles).unwrap(),
            serde_json::json!("no_articles")
        );
    }

    #[tokio::test]
    async fn test_completed_run_exports() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = ScriptedFactory::default();
        factory.pages.insert(HOME.to_string(), homepage());
        let probe = factory.probe.clone();
        let supervisor = RunSupervisor::new(factory, settings(dir.path()));

        supervisor.start().unwrap();
        let status = wait_idle(&supervisor).await;

        assert_eq!(status.status, RunPhase::Completed);
        assert_eq!(status.progress, 100);
        assert_eq!(status.articles_scraped, 1);
        assert!(status.end_time.is_some());
        assert!(probe.is_closed());
        let preview = outputs::latest_csv_preview(dir.path()).await.unwrap().unwrap();
        assert_eq!(preview.total_lines, 2);
        assert!(supervisor
            .logs(50)
            .iter()
            .any(|l| l.ends_with("Scraping completed: 1 articles")));
    }

    #[tokio::test]
    async fn test_no_articles_when_every_homepage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = RunSupervisor::new(ScriptedFactory::default(), settings(dir.path()));

        supervisor.start().unwrap();
        let status = wait_idle(&supervisor).await;

        assert_eq!(status.status, RunPhase::NoArticles);
        assert_eq!(status.articles_scraped, 0);
        assert_eq!(status.error.as_deref(), Some("No articles were scraped"));
        assert!(outputs::latest_csv_preview(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_setup_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ScriptedFactory {
            fail: true,
            ..ScriptedFactory::default()
        };
        let supervisor = RunSupervisor::new(factory, settings(dir.path()));

        supervisor.start().unwrap();
        let status = wait_idle(&supervisor).await;

        assert_eq!(status.status, RunPhase::Error);
        assert!(status.error.unwrap().contains("browser not installed"));
    }

    #[tokio::test]
    async fn test_second_start_conflicts_and_stop_releases_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = ScriptedFactory {
            gate: Some(Arc::new(Notify::new())),
            ..ScriptedFactory::default()
        };
        factory.pages.insert(HOME.to_string(), homepage());
        let probe = factory.probe.clone();
        let supervisor = RunSupervisor::new(factory, settings(dir.path()));

        supervisor.start().unwrap();
        // Wait until the homepage load is parked at the gate.
        for _ in 0..500 {
            if !probe.loads().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let before = supervisor.status();
        let logs_before = supervisor.logs(100);

        assert!(matches!(supervisor.start(), Err(ControlError::AlreadyRunning)));
        assert_eq!(supervisor.status(), before);
        assert_eq!(supervisor.logs(100), logs_before);
        assert_eq!(before.current_website, "MedTech");

        assert!(supervisor.stop());
        let status = wait_idle(&supervisor).await;
        assert_eq!(status.status, RunPhase::Stopped);
        assert!(status.error.is_none());
        assert!(probe.is_closed());
        assert!(!supervisor.stop());
    }

    #[tokio::test]
    async fn test_stopped_run_exports_partial_results_before_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut factory = ScriptedFactory::default();
        factory.pages.insert(
            HOME.to_string(),
            format!(
                "<html><head><title>Home</title></head><body><article>{}</article><a href=\"/news/one\">one</a></body></html>",
                "Cervical disc replacement volumes keep rising. ".repeat(4)
            ),
        );
        let probe = factory.probe.clone();
        let mut settings = settings(dir.path());
        settings.crawl.pacing = Pacing {
            unit: Duration::from_secs(3600),
            settle: (0.0, 0.0),
            ..Pacing::default()
        };
        let supervisor = RunSupervisor::new(factory, settings);

        supervisor.start().unwrap();
        // The homepage is in; the run now sits in the pause before `/news/one`.
        for _ in 0..500 {
            if supervisor.status().articles_scraped == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(supervisor.stop());
        let status = wait_idle(&supervisor).await;

        assert_eq!(status.status, RunPhase::Stopped);
        assert_eq!(status.articles_scraped, 1);
        assert!(probe.is_closed());
        let preview = outputs::latest_csv_preview(dir.path()).await.unwrap().unwrap();
        assert_eq!(preview.total_lines, 2);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_at_once_without_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = RunSupervisor::new(ScriptedFactory::default(), settings(dir.path()));
        let status = wait_idle(&supervisor).await;
        assert_eq!(status.status, RunPhase::Ready);
    }

    #[tokio::test]
    async fn test_restart_after_finish_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = RunSupervisor::new(ScriptedFactory::default(), settings(dir.path()));

        supervisor.start().unwrap();
        wait_idle(&supervisor).await;
        supervisor.start().unwrap();
        let status = supervisor.status();
        assert!(status.is_running || status.status == RunPhase::NoArticles);
        wait_idle(&supervisor).await;
        assert_eq!(
            supervisor
                .logs(100)
                .iter()
                .filter(|l| l.ends_with("Starting spine industry crawl"))
                .count(),
            1
        );
    }
}
