//! Prometheus-backed metric sink.
//!
//! Registers every exporter metric in the default registry at
//! construction time and implements the core observer traits over them.
//! The `/metrics` route renders the default registry, so construction
//! must happen once, before the server starts.

use actions_exporter_core::observer::{
    BillingObserver, RunnersObserver, WorkflowJobLabels, WorkflowObserver, WorkflowRunLabels,
};
use prometheus::{
    exponential_buckets, register_counter_vec, register_gauge_vec, register_histogram_vec,
    register_int_counter_vec, register_int_gauge_vec, CounterVec, GaugeVec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::Arc;

/// Prometheus implementation of the exporter's metric sinks.
///
/// Histogram buckets grow exponentially from one second by a factor of
/// 1.4 over thirty buckets, covering everything from sub-second queue
/// times to day-long workflows.
pub struct PrometheusObserver {
    workflow_job_duration: HistogramVec,
    workflow_job_queue: HistogramVec,
    workflow_job_duration_total: CounterVec,
    workflow_job_status: IntCounterVec,
    workflow_run_duration: HistogramVec,
    workflow_run_status: IntCounterVec,
    total_minutes_used: GaugeVec,
    included_minutes: GaugeVec,
    total_paid_minutes: GaugeVec,
    minutes_used_by_host: GaugeVec,
    registered_runners: IntGaugeVec,
}

impl PrometheusObserver {
    /// Register all exporter metrics in the default registry.
    ///
    /// # Errors
    ///
    /// Fails when a metric name is already registered, which in practice
    /// means this constructor ran twice in one process.
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let duration_buckets = exponential_buckets(1.0, 1.4, 30)?;

        Ok(Arc::new(Self {
            workflow_job_duration: register_histogram_vec!(
                "workflow_job_duration_seconds",
                "Time that a workflow job took to run.",
                &["org", "repo", "branch", "runner_group", "workflow_name", "job_name"],
                duration_buckets.clone()
            )?,
            workflow_job_queue: register_histogram_vec!(
                "workflow_job_queue_seconds",
                "Time that a workflow job spent waiting for a runner.",
                &["org", "repo", "branch", "runner_group", "workflow_name", "job_name"],
                duration_buckets.clone()
            )?,
            workflow_job_duration_total: register_counter_vec!(
                "workflow_job_duration_seconds_total",
                "The total duration of jobs.",
                &[
                    "org",
                    "repo",
                    "branch",
                    "status",
                    "conclusion",
                    "runner_group",
                    "workflow_name",
                    "job_name"
                ]
            )?,
            workflow_job_status: register_int_counter_vec!(
                "workflow_job_status_count",
                "Count of workflow job events.",
                &[
                    "org",
                    "repo",
                    "branch",
                    "status",
                    "conclusion",
                    "runner_group",
                    "workflow_name",
                    "job_name"
                ]
            )?,
            workflow_run_duration: register_histogram_vec!(
                "workflow_execution_time_seconds",
                "Time that a workflow took to run.",
                &["org", "repo", "branch", "workflow_name", "conclusion"],
                duration_buckets
            )?,
            workflow_run_status: register_int_counter_vec!(
                "workflow_status_count",
                "Count of the occurrences of different workflow states.",
                &["org", "repo", "branch", "status", "conclusion", "workflow_name"]
            )?,
            total_minutes_used: register_gauge_vec!(
                "actions_total_minutes_used_minutes",
                "Total minutes used for the GitHub Actions.",
                &["org", "user"]
            )?,
            included_minutes: register_gauge_vec!(
                "actions_included_minutes",
                "Included minutes for the GitHub Actions.",
                &["org", "user"]
            )?,
            total_paid_minutes: register_gauge_vec!(
                "actions_total_paid_minutes",
                "Paid minutes for the GitHub Actions.",
                &["org", "user"]
            )?,
            minutes_used_by_host: register_gauge_vec!(
                "actions_total_minutes_used_by_host_minutes",
                "Total minutes used for a specific host type for the GitHub Actions.",
                &["org", "user", "host_type"]
            )?,
            registered_runners: register_int_gauge_vec!(
                "actions_registered_runners",
                "Self-hosted runners currently registered, by pool state.",
                &["busy", "status", "runner_group"]
            )?,
        }))
    }
}

impl WorkflowObserver for PrometheusObserver {
    fn observe_workflow_job_duration(&self, labels: &WorkflowJobLabels<'_>, seconds: f64) {
        self.workflow_job_duration
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.runner_group,
                labels.workflow_name,
                labels.job_name,
            ])
            .observe(seconds);
    }

    fn observe_workflow_job_queue_time(&self, labels: &WorkflowJobLabels<'_>, seconds: f64) {
        self.workflow_job_queue
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.runner_group,
                labels.workflow_name,
                labels.job_name,
            ])
            .observe(seconds);
    }

    fn count_workflow_job_status(&self, labels: &WorkflowJobLabels<'_>) {
        self.workflow_job_status
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.status,
                labels.conclusion,
                labels.runner_group,
                labels.workflow_name,
                labels.job_name,
            ])
            .inc();
    }

    fn count_workflow_job_duration(&self, labels: &WorkflowJobLabels<'_>, seconds: f64) {
        self.workflow_job_duration_total
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.status,
                labels.conclusion,
                labels.runner_group,
                labels.workflow_name,
                labels.job_name,
            ])
            .inc_by(seconds);
    }

    fn observe_workflow_run_duration(&self, labels: &WorkflowRunLabels<'_>, seconds: f64) {
        self.workflow_run_duration
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.workflow_name,
                labels.conclusion,
            ])
            .observe(seconds);
    }

    fn count_workflow_run_status(&self, labels: &WorkflowRunLabels<'_>) {
        self.workflow_run_status
            .with_label_values(&[
                labels.org,
                labels.repo,
                labels.branch,
                labels.status,
                labels.conclusion,
                labels.workflow_name,
            ])
            .inc();
    }
}

impl BillingObserver for PrometheusObserver {
    fn set_total_minutes_used(&self, org: &str, user: &str, minutes: f64) {
        self.total_minutes_used
            .with_label_values(&[org, user])
            .set(minutes);
    }

    fn set_included_minutes(&self, org: &str, user: &str, minutes: f64) {
        self.included_minutes
            .with_label_values(&[org, user])
            .set(minutes);
    }

    fn set_total_paid_minutes(&self, org: &str, user: &str, minutes: f64) {
        self.total_paid_minutes
            .with_label_values(&[org, user])
            .set(minutes);
    }

    fn set_minutes_used_by_host(&self, org: &str, user: &str, host_type: &str, minutes: f64) {
        self.minutes_used_by_host
            .with_label_values(&[org, user, host_type])
            .set(minutes);
    }
}

impl RunnersObserver for PrometheusObserver {
    fn reset_registered_runners(&self) {
        self.registered_runners.reset();
    }

    fn increase_registered_runners(&self, busy: bool, status: &str, runner_group: &str) {
        let busy = if busy { "true" } else { "false" };
        self.registered_runners
            .with_label_values(&[busy, status, runner_group])
            .inc();
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
