//! # Actions Exporter Service
//!
//! Binary entry point for the GitHub Actions Prometheus exporter.
//!
//! This executable:
//! - parses configuration from flags and environment variables
//! - initializes logging
//! - registers the Prometheus metric sink and the correlation cache
//! - starts the billing and runner-pool pollers when enabled
//! - runs the HTTP server until SIGINT/SIGTERM

use actions_exporter_api::billing::BillingMetricsExporter;
use actions_exporter_api::config::{ExporterConfig, GitHubConfig, ServerConfig, WebConfig};
use actions_exporter_api::github::{GitHubClient, RestGitHubClient};
use actions_exporter_api::metrics::PrometheusObserver;
use actions_exporter_api::runners::RunnersMetricsExporter;
use actions_exporter_api::{start_server, ServiceError};
use actions_exporter_core::{
    JobEventCache, WorkflowMetricsCollector, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// GitHub Actions Prometheus exporter.
///
/// Flag names follow the `section.name` convention of the Prometheus
/// exporter family; every flag can also be set through its environment
/// variable.
#[derive(Parser, Debug)]
#[command(name = "actions-exporter", version, about)]
struct Cli {
    /// Host to bind the web interface and telemetry to.
    #[arg(long = "web.listen-host", env = "LISTEN_HOST", default_value = "0.0.0.0")]
    listen_host: String,

    /// Port to bind the web interface and telemetry to.
    #[arg(long = "web.listen-port", env = "LISTEN_PORT", default_value_t = 9101)]
    listen_port: u16,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", env = "METRICS_PATH", default_value = "/metrics")]
    metrics_path: String,

    /// Path that receives GitHub webhook deliveries.
    #[arg(long = "web.gh-webhook-path", env = "WEBHOOK_PATH", default_value = "/webhook")]
    webhook_path: String,

    /// Secret the GitHub webhook deliveries are signed with.
    #[arg(long = "gh.github-webhook-token", env = "GITHUB_WEBHOOK_TOKEN")]
    webhook_token: String,

    /// GitHub API token, required for the billing and runner pollers.
    #[arg(long = "gh.github-api-token", env = "GITHUB_API_TOKEN", default_value = "")]
    api_token: String,

    /// GitHub organization to poll.
    #[arg(long = "gh.github-org", env = "GITHUB_ORG", default_value = "")]
    org: String,

    /// GitHub user to poll billing for.
    #[arg(long = "gh.github-user", env = "GITHUB_USER", default_value = "")]
    user: String,

    /// GitHub enterprise whose runners are polled.
    #[arg(long = "gh.github-enterprise", env = "GITHUB_ENTERPRISE", default_value = "")]
    enterprise: String,

    /// Billing poll interval in seconds.
    #[arg(long = "gh.billing-poll-seconds", env = "BILLING_POLL_SECONDS", default_value_t = 300)]
    billing_poll_seconds: u64,

    /// Runner-pool poll interval in seconds.
    #[arg(long = "gh.runners-poll-seconds", env = "RUNNERS_POLL_SECONDS", default_value_t = 60)]
    runners_poll_seconds: u64,

    /// Enable the billing poller.
    #[arg(long = "gh.billing-metrics-enabled", env = "BILLING_METRICS_ENABLED")]
    billing_metrics_enabled: bool,

    /// Enable the runner-pool poller.
    #[arg(long = "gh.runners-metrics-enabled", env = "RUNNERS_METRICS_ENABLED")]
    runners_metrics_enabled: bool,
}

impl Cli {
    fn into_config(self) -> ExporterConfig {
        ExporterConfig {
            server: ServerConfig {
                host: self.listen_host,
                port: self.listen_port,
                ..ServerConfig::default()
            },
            web: WebConfig {
                metrics_path: self.metrics_path,
                webhook_path: self.webhook_path,
            },
            github: GitHubConfig {
                webhook_secret: self.webhook_token,
                api_token: self.api_token,
                org: self.org,
                user: self.user,
                enterprise: self.enterprise,
                billing_poll_seconds: self.billing_poll_seconds,
                runners_poll_seconds: self.runners_poll_seconds,
                billing_metrics_enabled: self.billing_metrics_enabled,
                runners_metrics_enabled: self.runners_metrics_enabled,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "actions_exporter_service=info,actions_exporter_api=info,actions_exporter_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config();

    if let Err(e) = config.validate() {
        error!(error = %e, "exporter configuration is invalid, aborting");
        std::process::exit(3);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting actions exporter");

    let observer = match PrometheusObserver::new() {
        Ok(observer) => observer,
        Err(e) => {
            error!(error = %e, "failed to register exporter metrics, aborting");
            std::process::exit(3);
        }
    };

    let cache = JobEventCache::new(DEFAULT_RETENTION);
    let sweeper = cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);
    let collector = WorkflowMetricsCollector::new(observer.clone(), cache);

    // Pollers run until this channel closes after the server stops.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    start_pollers(&config, observer, shutdown_rx);

    let result = start_server(config, collector).await;

    let _ = shutdown_tx.send(());
    sweeper.abort();

    if let Err(e) = result {
        error!(error = %e, "server terminated with an error");
        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };
        std::process::exit(exit_code);
    }
}

/// Wire the REST pollers when enabled. A poller that cannot start (no
/// org, no token, no client) is logged and skipped; the webhook path of
/// the exporter keeps working without it.
fn start_pollers(
    config: &ExporterConfig,
    observer: Arc<PrometheusObserver>,
    shutdown: tokio::sync::watch::Receiver<()>,
) {
    if !config.github.billing_metrics_enabled && !config.github.runners_metrics_enabled {
        info!("billing and runner metrics are disabled");
        return;
    }

    let client: Arc<dyn GitHubClient> = match RestGitHubClient::new(&config.github.api_token) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "failed to build the GitHub API client, pollers disabled");
            return;
        }
    };

    if config.github.billing_metrics_enabled {
        let billing = BillingMetricsExporter::new(
            client.clone(),
            observer.clone(),
            config.github.clone(),
        );
        match billing.start_org_billing(shutdown.clone()) {
            Ok(_) => info!(org = config.github.org, "exporting org billing"),
            Err(e) => info!("not exporting org billing: {}", e),
        }
        match billing.start_user_billing(shutdown.clone()) {
            Ok(_) => info!(user = config.github.user, "exporting user billing"),
            Err(e) => info!("not exporting user billing: {}", e),
        }
    } else {
        info!("billing metrics are disabled");
    }

    if config.github.runners_metrics_enabled {
        let runners = RunnersMetricsExporter::new(client, observer, config.github.clone());
        match runners.start(shutdown) {
            Ok(_) => info!(org = config.github.org, "exporting runner pools"),
            Err(e) => info!("not exporting runners: {}", e),
        }
    } else {
        info!("runner metrics are disabled");
    }
}
