//! Metric sink traits.
//!
//! The lifecycle collectors report observations through these traits
//! rather than into a process-global registry, so the Prometheus-backed
//! implementation lives in the infrastructure layer and tests can inject
//! a recording double. Implementations must be best-effort: recording a
//! metric never fails and never blocks.
//!
//! Label values mirror the source event: an absent source field becomes
//! an empty-string label, never an omitted dimension.

use crate::events::{WorkflowJobEvent, WorkflowRunEvent};

// ============================================================================
// Label sets
// ============================================================================

/// Label values for a single `workflow_job` event.
///
/// Borrows from the event; build with [`WorkflowJobLabels::from_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowJobLabels<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    pub status: &'a str,
    pub conclusion: &'a str,
    pub runner_group: &'a str,
    pub workflow_name: &'a str,
    pub job_name: &'a str,
}

impl<'a> WorkflowJobLabels<'a> {
    /// Extract label values from an event, resolving every absent field
    /// to the empty string.
    pub fn from_event(event: &'a WorkflowJobEvent) -> Self {
        let repository = event.repository.as_ref();
        let job = event.workflow_job.as_ref();

        Self {
            org: repository
                .and_then(|r| r.owner.as_ref())
                .and_then(|o| o.login.as_deref())
                .unwrap_or_default(),
            repo: repository.and_then(|r| r.name.as_deref()).unwrap_or_default(),
            branch: job.and_then(|j| j.head_branch.as_deref()).unwrap_or_default(),
            status: job.and_then(|j| j.status.as_deref()).unwrap_or_default(),
            conclusion: job.and_then(|j| j.conclusion.as_deref()).unwrap_or_default(),
            runner_group: job
                .and_then(|j| j.runner_group_name.as_deref())
                .unwrap_or_default(),
            workflow_name: job
                .and_then(|j| j.workflow_name.as_deref())
                .unwrap_or_default(),
            job_name: job.and_then(|j| j.name.as_deref()).unwrap_or_default(),
        }
    }
}

/// Label values for a single `workflow_run` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowRunLabels<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    pub status: &'a str,
    pub conclusion: &'a str,
    pub workflow_name: &'a str,
}

impl<'a> WorkflowRunLabels<'a> {
    /// Extract label values from an event, resolving every absent field
    /// to the empty string.
    pub fn from_event(event: &'a WorkflowRunEvent) -> Self {
        let repository = event.repository.as_ref();
        let run = event.workflow_run.as_ref();

        Self {
            org: repository
                .and_then(|r| r.owner.as_ref())
                .and_then(|o| o.login.as_deref())
                .unwrap_or_default(),
            repo: repository.and_then(|r| r.name.as_deref()).unwrap_or_default(),
            branch: run.and_then(|r| r.head_branch.as_deref()).unwrap_or_default(),
            status: run.and_then(|r| r.status.as_deref()).unwrap_or_default(),
            conclusion: run.and_then(|r| r.conclusion.as_deref()).unwrap_or_default(),
            workflow_name: event
                .workflow
                .as_ref()
                .and_then(|w| w.name.as_deref())
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Sink traits
// ============================================================================

/// Sink for workflow job and run lifecycle observations.
///
/// All methods take `&self` so an `Arc<dyn WorkflowObserver>` can be
/// shared across the fire-and-forget tasks handling concurrent webhook
/// deliveries.
pub trait WorkflowObserver: Send + Sync {
    /// Record how long a completed job ran, `completed_at − started_at`.
    fn observe_workflow_job_duration(&self, labels: &WorkflowJobLabels<'_>, seconds: f64);

    /// Record how long a job waited for a runner, excluding any
    /// environment-approval hold.
    fn observe_workflow_job_queue_time(&self, labels: &WorkflowJobLabels<'_>, seconds: f64);

    /// Count one job status transition.
    fn count_workflow_job_status(&self, labels: &WorkflowJobLabels<'_>);

    /// Accumulate completed-job runtime per outcome.
    fn count_workflow_job_duration(&self, labels: &WorkflowJobLabels<'_>, seconds: f64);

    /// Record how long a completed run took end to end.
    fn observe_workflow_run_duration(&self, labels: &WorkflowRunLabels<'_>, seconds: f64);

    /// Count one run status transition.
    fn count_workflow_run_status(&self, labels: &WorkflowRunLabels<'_>);
}

/// Sink for the billing poller's gauges.
pub trait BillingObserver: Send + Sync {
    fn set_total_minutes_used(&self, org: &str, user: &str, minutes: f64);
    fn set_included_minutes(&self, org: &str, user: &str, minutes: f64);
    fn set_total_paid_minutes(&self, org: &str, user: &str, minutes: f64);
    fn set_minutes_used_by_host(&self, org: &str, user: &str, host_type: &str, minutes: f64);
}

/// Sink for the self-hosted runner pool gauges.
pub trait RunnersObserver: Send + Sync {
    /// Zero out the registered-runners gauge before a poll round so label
    /// combinations that vanished from the pool stop reporting their old
    /// value.
    fn reset_registered_runners(&self);

    /// Count one registered runner under its pool state.
    fn increase_registered_runners(&self, busy: bool, status: &str, runner_group: &str);
}

/// Observer that discards everything. Useful as a wiring default and in
/// tests that only exercise control flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpWorkflowObserver;

impl WorkflowObserver for NoOpWorkflowObserver {
    fn observe_workflow_job_duration(&self, _labels: &WorkflowJobLabels<'_>, _seconds: f64) {}
    fn observe_workflow_job_queue_time(&self, _labels: &WorkflowJobLabels<'_>, _seconds: f64) {}
    fn count_workflow_job_status(&self, _labels: &WorkflowJobLabels<'_>) {}
    fn count_workflow_job_duration(&self, _labels: &WorkflowJobLabels<'_>, _seconds: f64) {}
    fn observe_workflow_run_duration(&self, _labels: &WorkflowRunLabels<'_>, _seconds: f64) {}
    fn count_workflow_run_status(&self, _labels: &WorkflowRunLabels<'_>) {}
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
