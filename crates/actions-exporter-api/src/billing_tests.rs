//! Tests for the billing poller.

use super::*;
use crate::github::{ActionsBilling, GitHubError, RunnerGroup, Runner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

// ============================================================================
// Doubles
// ============================================================================

/// Client stub that serves a fixed billing summary, or fails.
struct StubGitHubClient {
    billing: Option<ActionsBilling>,
}

#[async_trait]
impl GitHubClient for StubGitHubClient {
    async fn organisation_runner_groups(
        &self,
        _org: &str,
    ) -> Result<Vec<RunnerGroup>, GitHubError> {
        Ok(vec![])
    }

    async fn group_runners(&self, _org: &str, _group_id: i64) -> Result<Vec<Runner>, GitHubError> {
        Ok(vec![])
    }

    async fn enterprise_runners(&self, _enterprise: &str) -> Result<Vec<Runner>, GitHubError> {
        Ok(vec![])
    }

    async fn actions_billing_org(&self, _org: &str) -> Result<ActionsBilling, GitHubError> {
        self.billing
            .clone()
            .ok_or(GitHubError::UnexpectedStatus { status: 500 })
    }

    async fn actions_billing_user(&self, _user: &str) -> Result<ActionsBilling, GitHubError> {
        self.billing
            .clone()
            .ok_or(GitHubError::UnexpectedStatus { status: 500 })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum GaugeSet {
    TotalMinutes { org: String, user: String, minutes: f64 },
    IncludedMinutes { minutes: f64 },
    PaidMinutes { minutes: f64 },
    HostMinutes { host_type: String, minutes: f64 },
}

#[derive(Default)]
struct RecordingBillingObserver {
    sets: Mutex<Vec<GaugeSet>>,
}

impl RecordingBillingObserver {
    fn recorded(&self) -> Vec<GaugeSet> {
        self.sets.lock().unwrap().clone()
    }
}

impl BillingObserver for RecordingBillingObserver {
    fn set_total_minutes_used(&self, org: &str, user: &str, minutes: f64) {
        self.sets.lock().unwrap().push(GaugeSet::TotalMinutes {
            org: org.to_string(),
            user: user.to_string(),
            minutes,
        });
    }

    fn set_included_minutes(&self, _org: &str, _user: &str, minutes: f64) {
        self.sets
            .lock()
            .unwrap()
            .push(GaugeSet::IncludedMinutes { minutes });
    }

    fn set_total_paid_minutes(&self, _org: &str, _user: &str, minutes: f64) {
        self.sets
            .lock()
            .unwrap()
            .push(GaugeSet::PaidMinutes { minutes });
    }

    fn set_minutes_used_by_host(&self, _org: &str, _user: &str, host_type: &str, minutes: f64) {
        self.sets.lock().unwrap().push(GaugeSet::HostMinutes {
            host_type: host_type.to_string(),
            minutes,
        });
    }
}

fn billing_summary() -> ActionsBilling {
    ActionsBilling {
        total_minutes_used: 305.0,
        included_minutes: 3000.0,
        total_paid_minutes_used: 1.5,
        minutes_used_breakdown: HashMap::from([("UBUNTU".to_string(), 205.0)]),
    }
}

// ============================================================================
// Tests
// ============================================================================

/// An org collection sets every gauge with the org label and an empty
/// user label.
#[tokio::test]
async fn test_org_billing_sets_gauges() {
    let client = StubGitHubClient {
        billing: Some(billing_summary()),
    };
    let observer = RecordingBillingObserver::default();

    collect_org_billing(&client, &observer, "acme").await;

    let recorded = observer.recorded();
    assert!(recorded.contains(&GaugeSet::TotalMinutes {
        org: "acme".to_string(),
        user: String::new(),
        minutes: 305.0
    }));
    assert!(recorded.contains(&GaugeSet::IncludedMinutes { minutes: 3000.0 }));
    assert!(recorded.contains(&GaugeSet::PaidMinutes { minutes: 1.5 }));
    assert!(recorded.contains(&GaugeSet::HostMinutes {
        host_type: "UBUNTU".to_string(),
        minutes: 205.0
    }));
}

/// A user collection labels by user with an empty org.
#[tokio::test]
async fn test_user_billing_sets_gauges() {
    let client = StubGitHubClient {
        billing: Some(billing_summary()),
    };
    let observer = RecordingBillingObserver::default();

    collect_user_billing(&client, &observer, "octocat").await;

    assert!(observer.recorded().contains(&GaugeSet::TotalMinutes {
        org: String::new(),
        user: "octocat".to_string(),
        minutes: 305.0
    }));
}

/// An API failure skips the tick without touching any gauge.
#[tokio::test]
async fn test_failed_fetch_sets_nothing() {
    let client = StubGitHubClient { billing: None };
    let observer = RecordingBillingObserver::default();

    collect_org_billing(&client, &observer, "acme").await;

    assert!(observer.recorded().is_empty());
}

/// The poller refuses to start without an org or an API token.
#[tokio::test]
async fn test_start_requires_configuration() {
    let observer = std::sync::Arc::new(RecordingBillingObserver::default());
    let client = std::sync::Arc::new(StubGitHubClient {
        billing: Some(billing_summary()),
    });
    let (_tx, rx) = watch::channel(());

    let mut config = GitHubConfig::default();
    config.api_token = "api-token".to_string();
    let exporter = BillingMetricsExporter::new(client.clone(), observer.clone(), config);
    assert!(exporter.start_org_billing(rx.clone()).is_err());

    let mut config = GitHubConfig::default();
    config.org = "acme".to_string();
    let exporter = BillingMetricsExporter::new(client, observer, config);
    assert!(exporter.start_org_billing(rx).is_err());
}

/// Closing the shutdown channel stops the poll task.
#[tokio::test]
async fn test_shutdown_stops_poller() {
    let observer = std::sync::Arc::new(RecordingBillingObserver::default());
    let client = std::sync::Arc::new(StubGitHubClient {
        billing: Some(billing_summary()),
    });
    let (tx, rx) = watch::channel(());

    let mut config = GitHubConfig::default();
    config.org = "acme".to_string();
    config.api_token = "api-token".to_string();
    config.billing_poll_seconds = 3600;

    let exporter = BillingMetricsExporter::new(client, observer, config);
    let handle = exporter.start_org_billing(rx).expect("poller should start");

    drop(tx);
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("poller should stop after shutdown")
        .expect("poller task should not panic");
}
