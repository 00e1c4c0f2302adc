//! Workflow lifecycle collectors.
//!
//! Reconstructs the phases a workflow job passes through (queued →
//! in_progress → completed) from asynchronous, possibly out-of-order
//! webhook deliveries, and emits each derived observation exactly once
//! per phase. The queued snapshot is parked in the [`JobEventCache`]
//! until the matching `in_progress` delivery consumes it.
//!
//! Nothing in here is fatal: a missing timestamp skips the dependent
//! computation, a correlation miss skips the queue-time observation, and
//! a negative delta (clock skew, out-of-order delivery) is clamped to
//! zero. Status counters increment for every delivery regardless.

use crate::cache::JobEventCache;
use crate::events::{WorkflowJobEvent, WorkflowRunEvent};
use crate::observer::{WorkflowJobLabels, WorkflowObserver, WorkflowRunLabels};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Consumes decoded workflow events and turns them into metric
/// observations via the injected [`WorkflowObserver`].
///
/// One collector instance is shared by all webhook-handling tasks; the
/// correlation cache it owns is the only shared mutable state.
#[derive(Clone)]
pub struct WorkflowMetricsCollector {
    observer: Arc<dyn WorkflowObserver>,
    cache: JobEventCache,
}

impl WorkflowMetricsCollector {
    pub fn new(observer: Arc<dyn WorkflowObserver>, cache: JobEventCache) -> Self {
        Self { observer, cache }
    }

    /// The correlation cache backing this collector.
    pub fn cache(&self) -> &JobEventCache {
        &self.cache
    }

    /// Process one `workflow_job` delivery.
    ///
    /// Duration and queue-time observations depend on the `action` phase;
    /// the status counter increments for every delivery, including ones
    /// with an action value this exporter has never seen.
    pub async fn collect_workflow_job_event(&self, event: &WorkflowJobEvent) {
        let labels = WorkflowJobLabels::from_event(event);

        match event.action.as_deref().unwrap_or_default() {
            "queued" | "waiting" => self.record_queued(event).await,
            "in_progress" => self.record_in_progress(event, &labels).await,
            "completed" => self.record_completed(event, &labels).await,
            other => debug!(action = other, "unrecognized workflow_job action"),
        }

        self.observer.count_workflow_job_status(&labels);
    }

    /// Process one `workflow_run` delivery. Stateless: run events carry
    /// authoritative start/update timestamps, so no correlation is needed.
    pub fn collect_workflow_run_event(&self, event: &WorkflowRunEvent) {
        let labels = WorkflowRunLabels::from_event(event);

        if event.action.as_deref() == Some("completed") {
            let run = event.workflow_run.as_ref();
            let run_started_at = run.and_then(|r| r.run_started_at);
            let updated_at = run.and_then(|r| r.updated_at);

            match (run_started_at, updated_at) {
                (Some(started), Some(updated)) => {
                    let seconds = clamped_seconds_between(started, updated, "workflow_run");
                    self.observer.observe_workflow_run_duration(&labels, seconds);
                }
                _ => debug!("completed workflow_run is missing timestamps, skipping duration"),
            }
        }

        self.observer.count_workflow_run_status(&labels);
    }

    /// Park the queued snapshot until the runner picks the job up. A
    /// later queued-phase event for the same id overwrites the earlier
    /// one, so a re-queue after an approval gate keeps the freshest
    /// snapshot.
    async fn record_queued(&self, event: &WorkflowJobEvent) {
        let job = event.workflow_job.as_ref();
        let job_id = job.and_then(|j| j.id);
        let started_at = job.and_then(|j| j.started_at);

        match (job_id, started_at) {
            (Some(id), Some(_)) => {
                self.cache.insert(id, event.clone()).await;
            }
            _ => debug!("queued workflow_job has no id or start time, nothing to correlate"),
        }
    }

    /// Correlate an `in_progress` delivery with its cached queued
    /// snapshot and emit the queue-time observation.
    async fn record_in_progress(&self, event: &WorkflowJobEvent, labels: &WorkflowJobLabels<'_>) {
        let job = event.workflow_job.as_ref();
        let (job_id, started_at) = match (job.and_then(|j| j.id), job.and_then(|j| j.started_at)) {
            (Some(id), Some(started)) => (id, started),
            _ => {
                debug!("in_progress workflow_job has no id or start time, skipping queue-time");
                return;
            }
        };

        let Some(queued) = self.cache.get(job_id).await else {
            debug!(job_id, "no queued event cached for in_progress job, skipping queue-time");
            return;
        };
        self.cache.remove(job_id).await;

        let Some(reference) = queued_reference_time(&queued) else {
            warn!(
                job_id,
                "queued snapshot carries a deployment without an approval time, \
                 skipping queue-time"
            );
            return;
        };

        let seconds = clamped_seconds_between(reference, started_at, "workflow_job queue");
        self.observer.observe_workflow_job_queue_time(labels, seconds);
    }

    /// Emit the completed-job duration observation and outcome counter,
    /// and drop any leftover correlation entry for the job.
    async fn record_completed(&self, event: &WorkflowJobEvent, labels: &WorkflowJobLabels<'_>) {
        let job = event.workflow_job.as_ref();

        // The in_progress delivery normally consumed the entry already;
        // this covers jobs cancelled while still queued.
        if let Some(id) = job.and_then(|j| j.id) {
            self.cache.remove(id).await;
        }

        let started_at = job.and_then(|j| j.started_at);
        let completed_at = job.and_then(|j| j.completed_at);
        match (started_at, completed_at) {
            (Some(started), Some(completed)) => {
                let seconds = clamped_seconds_between(started, completed, "workflow_job");
                self.observer.observe_workflow_job_duration(labels, seconds);
                self.observer.count_workflow_job_duration(labels, seconds);
            }
            _ => debug!("completed workflow_job is missing timestamps, skipping duration"),
        }
    }
}

/// The reference time queue duration is measured from.
///
/// Normally the queued snapshot's own `started_at`. When the snapshot
/// carries a deployment, the deployment's `updated_at` (the moment the
/// environment approval was granted) supersedes it, so approval wait
/// time is not reported as runner queue time. A deployment without an
/// `updated_at` yields `None`: the caller abandons the computation rather
/// than inferring a wrong reference.
fn queued_reference_time(queued: &WorkflowJobEvent) -> Option<DateTime<Utc>> {
    match queued.deployment.as_ref() {
        Some(deployment) => deployment.updated_at,
        None => queued.workflow_job.as_ref().and_then(|j| j.started_at),
    }
}

/// Seconds from `start` to `end`, clamped at zero. Negative deltas happen
/// with skewed clocks or reordered deliveries and are reported as zero.
fn clamped_seconds_between(start: DateTime<Utc>, end: DateTime<Utc>, context: &str) -> f64 {
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    if seconds < 0.0 {
        warn!(seconds, context, "negative duration clamped to zero");
        return 0.0;
    }
    seconds
}

#[cfg(test)]
#[path = "collector_tests.rs"]
mod tests;
