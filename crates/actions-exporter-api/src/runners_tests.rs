//! Tests for the runner-pool poller.

use super::*;
use crate::github::{ActionsBilling, GitHubError, RunnerGroup};
use async_trait::async_trait;
use std::sync::Mutex;

// ============================================================================
// Doubles
// ============================================================================

/// Client stub serving a fixed runner-pool inventory.
struct StubGitHubClient {
    groups: Result<Vec<RunnerGroup>, ()>,
    group_runners_fail: bool,
    enterprise: Vec<Runner>,
}

impl StubGitHubClient {
    fn healthy() -> Self {
        Self {
            groups: Ok(vec![
                RunnerGroup {
                    id: Some(1),
                    name: Some("default".to_string()),
                },
                RunnerGroup {
                    id: Some(2),
                    name: Some("gpu".to_string()),
                },
            ]),
            group_runners_fail: false,
            enterprise: vec![],
        }
    }
}

fn runner(name: &str, status: &str, busy: bool) -> Runner {
    Runner {
        id: Some(1),
        name: Some(name.to_string()),
        os: Some("linux".to_string()),
        status: Some(status.to_string()),
        busy,
    }
}

#[async_trait]
impl GitHubClient for StubGitHubClient {
    async fn organisation_runner_groups(
        &self,
        _org: &str,
    ) -> Result<Vec<RunnerGroup>, GitHubError> {
        self.groups
            .clone()
            .map_err(|_| GitHubError::UnexpectedStatus { status: 500 })
    }

    async fn group_runners(&self, _org: &str, group_id: i64) -> Result<Vec<Runner>, GitHubError> {
        if self.group_runners_fail {
            return Err(GitHubError::UnexpectedStatus { status: 500 });
        }
        Ok(match group_id {
            1 => vec![
                runner("runner-a", "online", true),
                runner("runner-b", "online", false),
            ],
            2 => vec![runner("runner-c", "offline", false)],
            _ => vec![],
        })
    }

    async fn enterprise_runners(&self, _enterprise: &str) -> Result<Vec<Runner>, GitHubError> {
        Ok(self.enterprise.clone())
    }

    async fn actions_billing_org(&self, _org: &str) -> Result<ActionsBilling, GitHubError> {
        Err(GitHubError::UnexpectedStatus { status: 500 })
    }

    async fn actions_billing_user(&self, _user: &str) -> Result<ActionsBilling, GitHubError> {
        Err(GitHubError::UnexpectedStatus { status: 500 })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RunnerCall {
    Reset,
    Increase {
        busy: bool,
        status: String,
        group: String,
    },
}

#[derive(Default)]
struct RecordingRunnersObserver {
    calls: Mutex<Vec<RunnerCall>>,
}

impl RecordingRunnersObserver {
    fn recorded(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl RunnersObserver for RecordingRunnersObserver {
    fn reset_registered_runners(&self) {
        self.calls.lock().unwrap().push(RunnerCall::Reset);
    }

    fn increase_registered_runners(&self, busy: bool, status: &str, runner_group: &str) {
        self.calls.lock().unwrap().push(RunnerCall::Increase {
            busy,
            status: status.to_string(),
            group: runner_group.to_string(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

/// A healthy round resets first, then counts every runner under its
/// group and pool state.
#[tokio::test]
async fn test_round_resets_then_counts_runners() {
    let client = StubGitHubClient::healthy();
    let observer = RecordingRunnersObserver::default();

    collect_runners(&client, &observer, "acme", "").await;

    let recorded = observer.recorded();
    assert_eq!(recorded.first(), Some(&RunnerCall::Reset));
    assert_eq!(recorded.len(), 4);
    assert!(recorded.contains(&RunnerCall::Increase {
        busy: true,
        status: "online".to_string(),
        group: "default".to_string()
    }));
    assert!(recorded.contains(&RunnerCall::Increase {
        busy: false,
        status: "online".to_string(),
        group: "default".to_string()
    }));
    assert!(recorded.contains(&RunnerCall::Increase {
        busy: false,
        status: "offline".to_string(),
        group: "gpu".to_string()
    }));
}

/// Enterprise runners land in a pseudo-group named after the enterprise.
#[tokio::test]
async fn test_enterprise_runners_use_pseudo_group() {
    let mut client = StubGitHubClient::healthy();
    client.enterprise = vec![runner("ent-runner", "online", true)];
    let observer = RecordingRunnersObserver::default();

    collect_runners(&client, &observer, "acme", "big-corp").await;

    assert!(observer.recorded().contains(&RunnerCall::Increase {
        busy: true,
        status: "online".to_string(),
        group: "big-corp".to_string()
    }));
}

/// When the group listing fails the round aborts after the reset, so the
/// gauge reads zero rather than a stale pool.
#[tokio::test]
async fn test_failed_group_listing_leaves_gauge_reset() {
    let client = StubGitHubClient {
        groups: Err(()),
        group_runners_fail: false,
        enterprise: vec![],
    };
    let observer = RecordingRunnersObserver::default();

    collect_runners(&client, &observer, "acme", "").await;

    assert_eq!(observer.recorded(), vec![RunnerCall::Reset]);
}

/// A failure while listing one group's runners also aborts the round.
#[tokio::test]
async fn test_failed_runner_listing_aborts_round() {
    let mut client = StubGitHubClient::healthy();
    client.group_runners_fail = true;
    let observer = RecordingRunnersObserver::default();

    collect_runners(&client, &observer, "acme", "").await;

    assert_eq!(observer.recorded(), vec![RunnerCall::Reset]);
}

/// The poller refuses to start without an org or an API token.
#[tokio::test]
async fn test_start_requires_configuration() {
    let observer = std::sync::Arc::new(RecordingRunnersObserver::default());
    let client = std::sync::Arc::new(StubGitHubClient::healthy());
    let (_tx, rx) = watch::channel(());

    let mut config = GitHubConfig::default();
    config.api_token = "api-token".to_string();
    let exporter = RunnersMetricsExporter::new(client.clone(), observer.clone(), config);
    assert!(exporter.start(rx.clone()).is_err());

    let mut config = GitHubConfig::default();
    config.org = "acme".to_string();
    let exporter = RunnersMetricsExporter::new(client, observer, config);
    assert!(exporter.start(rx).is_err());
}
