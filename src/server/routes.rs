//! HTTP control panel.
//!
//! | Route              | Purpose                                    |
//! |--------------------|--------------------------------------------|
//! | `GET /`            | Control page                               |
//! | `POST /api/scrape` | Start a run (409 while one is active)      |
//! | `GET /api/status`  | Run status and the last 20 log lines       |
//! | `GET /api/logs`    | The last 50 log lines                      |
//! | `GET /api/results` | Preview of the latest CSV export           |
//! | `POST /api/stop`   | Cancel the active run                      |

use super::supervisor::{ControlError, RunStatus, RunSupervisor};
use crate::outputs;
use crate::renderer::RendererFactory;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const STATUS_LOG_LINES: usize = 20;
const LOG_LINES: usize = 50;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Spine Industry Crawler</title></head>
<body>
<h1>Spine Industry Crawler</h1>
<button onclick="post('/api/scrape')">Start</button>
<button onclick="post('/api/stop')">Stop</button>
<pre id="status"></pre>
<pre id="logs"></pre>
<script>
async function post(path) { await fetch(path, { method: 'POST' }); refresh(); }
async function refresh() {
  const r = await (await fetch('/api/status')).json();
  document.getElementById('status').textContent = JSON.stringify(r.status, null, 2);
  document.getElementById('logs').textContent = r.logs.join('\n');
}
setInterval(refresh, 2000);
refresh();
</script>
</body>
</html>
"#;

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = match self {
            ControlError::AlreadyRunning => StatusCode::CONFLICT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: RunStatus,
    logs: Vec<String>,
}

pub fn router<F: RendererFactory>(supervisor: RunSupervisor<F>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/scrape", post(start_run::<F>))
        .route("/api/status", get(run_status::<F>))
        .route("/api/logs", get(logs::<F>))
        .route("/api/results", get(results::<F>))
        .route("/api/stop", post(stop_run::<F>))
        .layer(TraceLayer::new_for_http())
        .with_state(supervisor)
}

/// Serve the control panel on `bind` until Ctrl-C, then stop any active run
/// and wait for it to wind down.
pub async fn serve<F: RendererFactory>(
    bind: SocketAddr,
    supervisor: RunSupervisor<F>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "Control panel listening");

    let on_shutdown = supervisor.clone();
    let settled = supervisor.clone();
    axum::serve(listener, router(supervisor))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutting down control panel");
            on_shutdown.stop();
        })
        .await?;

    // A stopped run still has to release its renderer and export.
    let status = settled.wait_idle().await;
    info!(phase = ?status.status, articles = status.articles_scraped, "Control panel stopped");
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn start_run<F: RendererFactory>(
    State(supervisor): State<RunSupervisor<F>>,
) -> Result<Json<serde_json::Value>, ControlError> {
    supervisor.start()?;
    Ok(Json(json!({
        "message": "Scraping started",
        "status": "started",
    })))
}

async fn run_status<F: RendererFactory>(
    State(supervisor): State<RunSupervisor<F>>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: supervisor.status(),
        logs: supervisor.logs(STATUS_LOG_LINES),
    })
}

async fn logs<F: RendererFactory>(
    State(supervisor): State<RunSupervisor<F>>,
) -> Json<serde_json::Value> {
    Json(json!({ "logs": supervisor.logs(LOG_LINES) }))
}

async fn results<F: RendererFactory>(State(supervisor): State<RunSupervisor<F>>) -> Response {
    match outputs::latest_csv_preview(&supervisor.settings().output_dir).await {
        Ok(Some(preview)) => Json(preview).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No results found" })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read results");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn stop_run<F: RendererFactory>(
    State(supervisor): State<RunSupervisor<F>>,
) -> Json<serde_json::Value> {
    if supervisor.stop() {
        Json(json!({ "message": "Scraping stopped" }))
    } else {
        Json(json!({ "message": "No active scraping to stop" }))
    }
}
