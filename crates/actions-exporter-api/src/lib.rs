//! # Actions Exporter HTTP Service
//!
//! HTTP boundary and infrastructure for the actions exporter:
//!
//! - the webhook endpoint: signature verification, event decoding, and
//!   fire-and-forget dispatch into the lifecycle collectors
//! - the Prometheus `/metrics` endpoint and the metric sink
//!   implementations ([`metrics::PrometheusObserver`])
//! - the GitHub REST pollers for billing and runner-pool inventory
//!
//! The webhook responds as soon as decoding succeeds; metric computation
//! runs in a spawned task off the response path, so the sender sees an
//! accepted response even when background processing later finds missing
//! data.

// Public modules
pub mod billing;
pub mod config;
pub mod github;
pub mod metrics;
pub mod runners;

use actions_exporter_core::events::{decode_event, DecodeError, WebhookEvent};
use actions_exporter_core::observer::{WorkflowJobLabels, WorkflowRunLabels};
use actions_exporter_core::signature::verify_signature;
use actions_exporter_core::WorkflowMetricsCollector;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use config::{ConfigError, ExporterConfig};
use prometheus::TextEncoder;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{error, info, warn};

// ============================================================================
// Application state
// ============================================================================

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ExporterConfig,

    /// Lifecycle collector fed by the webhook endpoint
    pub collector: WorkflowMetricsCollector,
}

impl AppState {
    pub fn new(config: ExporterConfig, collector: WorkflowMetricsCollector) -> Self {
        Self { config, collector }
    }
}

// ============================================================================
// Router and server
// ============================================================================

/// Build the exporter's router: webhook intake, metrics exposition, and
/// a landing page.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(&state.config.web.webhook_path, post(handle_webhook))
        .route(&state.config.web.metrics_path, get(handle_metrics))
        .route("/", get(handle_root))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .into_inner(),
        )
        .with_state(state)
}

/// Error produced by server startup and teardown.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to bind {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("server failed: {message}")]
    ServerFailed { message: String },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Bind the listener and serve until a shutdown signal arrives.
///
/// Graceful shutdown stops accepting new connections immediately and
/// lets in-flight requests finish; spawned collector tasks complete in
/// microseconds and are not awaited.
pub async fn start_server(
    config: ExporterConfig,
    collector: WorkflowMetricsCollector,
) -> Result<(), ServiceError> {
    config.validate()?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, collector);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        }
    })?;

    info!(%address, "GitHub Actions exporter has successfully started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle one GitHub webhook delivery.
///
/// Only signature verification and decoding run on the response path;
/// everything else happens in a spawned task after the response is sent.
async fn handle_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers
        .get("X-Hub-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(error) = verify_signature(&state.config.github.webhook_secret, signature, &body) {
        warn!(%error, "rejecting webhook delivery with invalid signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    let event_type = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match decode_event(event_type, &body) {
        Ok(WebhookEvent::Ping(ping)) => {
            info!(hook_id = ping.hook_id, "ping event");
            (
                StatusCode::ACCEPTED,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"status": "honk"}"#,
            )
                .into_response()
        }
        Ok(WebhookEvent::WorkflowJob(event)) => {
            {
                let labels = WorkflowJobLabels::from_event(&event);
                info!(
                    org = labels.org,
                    repo = labels.repo,
                    action = event.action.as_deref().unwrap_or_default(),
                    workflow_name = labels.workflow_name,
                    job_name = labels.job_name,
                    branch = labels.branch,
                    "got workflow_job event"
                );
            }
            let collector = state.collector.clone();
            tokio::spawn(async move {
                collector.collect_workflow_job_event(&event).await;
            });
            accepted()
        }
        Ok(WebhookEvent::WorkflowRun(event)) => {
            {
                let labels = WorkflowRunLabels::from_event(&event);
                info!(
                    org = labels.org,
                    repo = labels.repo,
                    action = event.action.as_deref().unwrap_or_default(),
                    workflow_name = labels.workflow_name,
                    branch = labels.branch,
                    "got workflow_run event"
                );
            }
            let collector = state.collector.clone();
            tokio::spawn(async move {
                collector.collect_workflow_run_event(&event);
            });
            accepted()
        }
        Err(DecodeError::Unsupported { event_type }) => {
            info!(event_type, "not implemented");
            StatusCode::NOT_IMPLEMENTED.into_response()
        }
        Err(error @ DecodeError::Malformed { .. }) => {
            // A broken ping is a client error; a broken job/run payload
            // is acknowledged anyway, matching the best-effort contract
            // of the background path.
            if event_type == "ping" {
                warn!(%error, "rejecting malformed ping delivery");
                StatusCode::BAD_REQUEST.into_response()
            } else {
                warn!(%error, "acknowledging undecodable delivery");
                accepted()
            }
        }
    }
}

fn accepted() -> Response {
    (
        StatusCode::ACCEPTED,
        [(header::CONTENT_TYPE, "application/json")],
        "",
    )
        .into_response()
}

/// Render the default Prometheus registry.
async fn handle_metrics() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&prometheus::gather()).map_err(|e| {
        error!(error = %e, "failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Landing page linking to the metrics route.
async fn handle_root(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        r#"<html>
        <head><title>GitHub Actions Exporter</title></head>
        <body>
        <h1>GitHub Actions Exporter</h1>
        <p><a href='{}'>Metrics</a></p>
        </body>
        </html>"#,
        state.config.web.metrics_path
    ))
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
