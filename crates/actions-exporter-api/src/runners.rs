//! Self-hosted runner pool poller.
//!
//! Periodically walks the organization's runner groups (and optionally
//! the enterprise-level runners) and gauges each registered runner under
//! its (busy, status, group) state.

use crate::config::GitHubConfig;
use crate::github::{GitHubClient, MissingConfig, Runner};
use actions_exporter_core::observer::RunnersObserver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Polls the runner pool inventory into the injected gauge sink.
pub struct RunnersMetricsExporter {
    client: Arc<dyn GitHubClient>,
    observer: Arc<dyn RunnersObserver>,
    config: GitHubConfig,
}

impl RunnersMetricsExporter {
    pub fn new(
        client: Arc<dyn GitHubClient>,
        observer: Arc<dyn RunnersObserver>,
        config: GitHubConfig,
    ) -> Self {
        Self {
            client,
            observer,
            config,
        }
    }

    /// Start polling runner pools. Returns the poll task, which runs
    /// until the shutdown channel closes.
    pub fn start(&self, mut shutdown: watch::Receiver<()>) -> Result<JoinHandle<()>, MissingConfig> {
        if self.config.org.is_empty() {
            return Err(MissingConfig("org"));
        }
        if self.config.api_token.is_empty() {
            return Err(MissingConfig("api token"));
        }

        let client = self.client.clone();
        let observer = self.observer.clone();
        let org = self.config.org.clone();
        let enterprise = self.config.enterprise.clone();
        let every = Duration::from_secs(self.config.runners_poll_seconds);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        collect_runners(client.as_ref(), observer.as_ref(), &org, &enterprise).await;
                    }
                    _ = shutdown.changed() => {
                        info!("stopped polling for runner metrics");
                        return;
                    }
                }
            }
        }))
    }
}

/// One poll round.
///
/// The gauge is reset first so a label combination that vanished from the
/// pool reads zero instead of its stale value. The same reset-first order
/// means an API failure leaves the gauge empty rather than stale, so the
/// round aborts after any failed call.
async fn collect_runners(
    client: &dyn GitHubClient,
    observer: &dyn RunnersObserver,
    org: &str,
    enterprise: &str,
) {
    observer.reset_registered_runners();

    let mut pools: Vec<(String, Vec<Runner>)> = Vec::new();

    let groups = match client.organisation_runner_groups(org).await {
        Ok(groups) => groups,
        Err(error) => {
            error!(%error, org, "unable to retrieve runner groups");
            return;
        }
    };

    for group in groups {
        let Some(group_id) = group.id else { continue };
        let group_name = group.name.unwrap_or_default();

        match client.group_runners(org, group_id).await {
            Ok(runners) => pools.push((group_name, runners)),
            Err(error) => {
                error!(%error, org, group = group_name, "unable to retrieve group runners");
                return;
            }
        }
    }

    // Enterprise runners land in a pseudo-group named after the
    // enterprise; the API does not expose their real group membership.
    if !enterprise.is_empty() {
        match client.enterprise_runners(enterprise).await {
            Ok(runners) => pools.push((enterprise.to_string(), runners)),
            Err(error) => {
                error!(%error, enterprise, "unable to retrieve enterprise runners");
                return;
            }
        }
    }

    for (group, runners) in pools {
        for runner in runners {
            observer.increase_registered_runners(
                runner.busy,
                runner.status.as_deref().unwrap_or_default(),
                &group,
            );
        }
    }
}

#[cfg(test)]
#[path = "runners_tests.rs"]
mod tests;
