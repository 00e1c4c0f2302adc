//! Actions billing poller.
//!
//! Periodically fetches the Actions billing summary for the configured
//! org and/or user and sets the billing gauges. A failed fetch skips the
//! tick; the next tick retries. Simple gauge sets, no correlation.

use crate::config::GitHubConfig;
use crate::github::{GitHubClient, MissingConfig};
use actions_exporter_core::observer::BillingObserver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Polls GitHub Actions billing into the injected gauge sink.
pub struct BillingMetricsExporter {
    client: Arc<dyn GitHubClient>,
    observer: Arc<dyn BillingObserver>,
    config: GitHubConfig,
}

impl BillingMetricsExporter {
    pub fn new(
        client: Arc<dyn GitHubClient>,
        observer: Arc<dyn BillingObserver>,
        config: GitHubConfig,
    ) -> Self {
        Self {
            client,
            observer,
            config,
        }
    }

    /// Start polling org billing. Returns the poll task, which runs
    /// until the shutdown channel closes.
    pub fn start_org_billing(
        &self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<JoinHandle<()>, MissingConfig> {
        if self.config.org.is_empty() {
            return Err(MissingConfig("org"));
        }
        if self.config.api_token.is_empty() {
            return Err(MissingConfig("api token"));
        }

        let client = self.client.clone();
        let observer = self.observer.clone();
        let org = self.config.org.clone();
        let every = Duration::from_secs(self.config.billing_poll_seconds);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        collect_org_billing(client.as_ref(), observer.as_ref(), &org).await;
                    }
                    _ = shutdown.changed() => {
                        info!("stopped polling for org billing metrics");
                        return;
                    }
                }
            }
        }))
    }

    /// Start polling user billing. Returns the poll task, which runs
    /// until the shutdown channel closes.
    pub fn start_user_billing(
        &self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<JoinHandle<()>, MissingConfig> {
        if self.config.user.is_empty() {
            return Err(MissingConfig("user"));
        }
        if self.config.api_token.is_empty() {
            return Err(MissingConfig("api token"));
        }

        let client = self.client.clone();
        let observer = self.observer.clone();
        let user = self.config.user.clone();
        let every = Duration::from_secs(self.config.billing_poll_seconds);

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        collect_user_billing(client.as_ref(), observer.as_ref(), &user).await;
                    }
                    _ = shutdown.changed() => {
                        info!("stopped polling for user billing metrics");
                        return;
                    }
                }
            }
        }))
    }
}

async fn collect_org_billing(client: &dyn GitHubClient, observer: &dyn BillingObserver, org: &str) {
    match client.actions_billing_org(org).await {
        Ok(billing) => {
            observer.set_total_minutes_used(org, "", billing.total_minutes_used);
            observer.set_included_minutes(org, "", billing.included_minutes);
            observer.set_total_paid_minutes(org, "", billing.total_paid_minutes_used);
            for (host_type, minutes) in &billing.minutes_used_breakdown {
                observer.set_minutes_used_by_host(org, "", host_type, *minutes);
            }
        }
        Err(error) => {
            warn!(%error, org, "failed to retrieve the actions billing for an org");
        }
    }
}

async fn collect_user_billing(
    client: &dyn GitHubClient,
    observer: &dyn BillingObserver,
    user: &str,
) {
    match client.actions_billing_user(user).await {
        Ok(billing) => {
            observer.set_total_minutes_used("", user, billing.total_minutes_used);
            observer.set_included_minutes("", user, billing.included_minutes);
            observer.set_total_paid_minutes("", user, billing.total_paid_minutes_used);
            for (host_type, minutes) in &billing.minutes_used_breakdown {
                observer.set_minutes_used_by_host("", user, host_type, *minutes);
            }
        }
        Err(error) => {
            warn!(%error, user, "failed to retrieve the actions billing for a user");
        }
    }
}

#[cfg(test)]
#[path = "billing_tests.rs"]
mod tests;
