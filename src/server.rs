//! HTTP edge for the task service.
//!
//! ## Endpoints
//!
//! - `POST /generate` (alias `/api/generate-tasks`): body `{"count": n}`,
//!   returns the full master list as a JSON array
//! - `GET /daily` (alias `/api/daily-tasks`): returns today's window
//! - `GET /health`: liveness plus the store backend name
//!
//! Errors are returned as `{"error": "...", "code": "..."}` with the status
//! from [`DailyKindError::status_code`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{DailyKindError, Result};
use crate::rotation::DailySliceRotator;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message, prefixed with the code.
    pub error: String,
    /// Stable error code.
    pub code: String,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Name of the store backend.
    pub store: String,
}

impl IntoResponse for DailyKindError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_owned(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Self::MethodNotAllowed { allowed, .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allowed));
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    rotator: Arc<DailySliceRotator>,
    cancel: CancellationToken,
}

impl AppState {
    /// State serving lists from `rotator`.
    pub fn new(rotator: Arc<DailySliceRotator>) -> Self {
        Self {
            rotator,
            cancel: CancellationToken::new(),
        }
    }

    fn master_size(&self) -> usize {
        self.rotator.manager().rotation().master_size
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", any(handle_generate))
        .route("/api/generate-tasks", any(handle_generate))
        .route("/daily", any(handle_daily))
        .route("/api/daily-tasks", any(handle_daily))
        .route("/health", get(handle_health))
        .layer(middleware::from_fn(request_span))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// TaskServer
// ---------------------------------------------------------------------------

/// The task HTTP server running on a background tokio task.
pub struct TaskServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskServer {
    /// Start the server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and serves until `cancel` fires or [`shutdown`](Self::shutdown) is
    /// called. In-flight generation observes the same token.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(mut state: AppState, config: &ServerConfig, cancel: CancellationToken) -> Result<Self> {
        let cancel = cancel.child_token();
        state.cancel = cancel.clone();
        let app = router(state);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| DailyKindError::Config(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| DailyKindError::Config(format!("failed to get local addr: {e}")))?;

        info!("task server listening on http://{addr}");

        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                error!("task server error: {e}");
            }
        });

        Ok(Self { addr, cancel, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Begin graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the server task to finish.
    pub async fn stopped(&mut self) {
        if let Err(e) = (&mut self.handle).await
            && !e.is_cancelled()
        {
            error!("task server task failed: {e}");
        }
    }
}

impl Drop for TaskServer {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read the requested list size from a `/generate` body.
///
/// Missing, malformed, zero or non-numeric counts yield `max`. Numeric
/// strings are accepted. The result is clamped to `[1, max]` and truncated.
pub fn parse_count(body: &[u8], max: usize) -> usize {
    let requested = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("count").and_then(count_value));
    match requested {
        Some(n) if !n.is_nan() && n != 0.0 => n.clamp(1.0, max.max(1) as f64) as usize,
        _ => max,
    }
}

fn count_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn require_method(method: &Method, allowed: Method) -> Result<()> {
    if *method == allowed {
        return Ok(());
    }
    Err(DailyKindError::MethodNotAllowed {
        method: method.to_string(),
        allowed: if allowed == Method::POST { "POST" } else { "GET" },
    })
}

async fn request_span(request: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        let response = next.run(request).await;
        info!(status = response.status().as_u16(), "request finished");
        response
    }
    .instrument(span)
    .await
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// `POST /generate`: ensure and return the master list of the requested size.
async fn handle_generate(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<Vec<String>>> {
    require_method(&method, Method::POST)?;
    let count = parse_count(&body, state.master_size());
    let list = state
        .rotator
        .manager()
        .ensure_master_list(count, &state.cancel)
        .await?;
    Ok(Json(list.tasks))
}

/// `GET /daily`: today's window of the default-size master list.
async fn handle_daily(State(state): State<AppState>, method: Method) -> Result<Json<Vec<String>>> {
    require_method(&method, Method::GET)?;
    let slice = state
        .rotator
        .today_slice(state.master_size(), &state.cancel)
        .await?;
    Ok(Json(slice))
}

/// `GET /health`
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        store: state.rotator.manager().store().name().to_owned(),
    })
}
