//! Typed GitHub Actions webhook events and payload decoding.
//!
//! Webhook payloads are decoded into structures in which every field is an
//! explicit `Option`. GitHub omits fields freely depending on the event
//! phase (a `queued` job has no `completed_at`, a job without an
//! environment gate has no `deployment`), so absence is part of the data
//! model rather than an error. Call sites resolve a missing label field to
//! the empty string and skip computations that depend on a missing
//! timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Event payload types
// ============================================================================

/// A `workflow_job` webhook delivery.
///
/// One delivery describes a single phase transition of a job: the `action`
/// field carries the phase (`queued`, `waiting`, `in_progress`,
/// `completed`, or a value this exporter has never seen; unrecognized
/// actions are tolerated and still counted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: Option<String>,
    pub repository: Option<Repository>,
    pub workflow_job: Option<WorkflowJob>,
    /// Present when the job sits behind an environment-protection gate.
    /// Its `updated_at` is the moment the gate was released.
    pub deployment: Option<Deployment>,
}

/// A `workflow_run` webhook delivery (run-level, coarser than job-level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: Option<String>,
    pub repository: Option<Repository>,
    pub workflow: Option<Workflow>,
    pub workflow_run: Option<WorkflowRun>,
}

/// A `ping` webhook delivery, sent by GitHub when a hook is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingEvent {
    pub zen: Option<String>,
    pub hook_id: Option<i64>,
}

/// Repository information shared by all event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
    pub owner: Option<RepositoryOwner>,
}

/// Owner of the repository; `login` is the org (or user) label value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: Option<String>,
}

/// The job sub-object of a `workflow_job` event.
///
/// `started_at` changes meaning with the phase: on a `queued` or `waiting`
/// event it is the time the job entered the queue, on `in_progress` the
/// time a runner picked it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJob {
    /// Stable identity across the job's lifecycle; correlation key.
    pub id: Option<i64>,
    pub run_id: Option<i64>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub runner_group_name: Option<String>,
    pub workflow_name: Option<String>,
    pub head_branch: Option<String>,
}

/// The run sub-object of a `workflow_run` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Option<i64>,
    pub run_number: Option<i64>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub head_branch: Option<String>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The workflow sub-object of a `workflow_run` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: Option<String>,
}

/// Deployment attached to a gated job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Option<i64>,
    pub environment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Time the environment approval was granted. When present this is
    /// the authoritative queue-time reference for the job, superseding
    /// the queued snapshot's own `started_at`.
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Decoding
// ============================================================================

/// A decoded webhook delivery, discriminated by the `X-GitHub-Event` header.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Ping(PingEvent),
    WorkflowJob(Box<WorkflowJobEvent>),
    WorkflowRun(Box<WorkflowRunEvent>),
}

/// Error produced when a webhook body cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The delivery type is not one this exporter processes. Not a fault:
    /// the caller acknowledges with "not implemented" and stops.
    #[error("unsupported event type: {event_type}")]
    Unsupported { event_type: String },

    /// The body is not valid JSON for the declared event type.
    #[error("malformed {event_type} payload: {source}")]
    Malformed {
        event_type: String,
        source: serde_json::Error,
    },
}

/// Decode a raw webhook body according to its delivery-type discriminator.
///
/// Known discriminators are `ping`, `workflow_job` and `workflow_run`;
/// anything else yields [`DecodeError::Unsupported`] without touching the
/// body.
pub fn decode_event(event_type: &str, body: &[u8]) -> Result<WebhookEvent, DecodeError> {
    match event_type {
        "ping" => serde_json::from_slice(body)
            .map(WebhookEvent::Ping)
            .map_err(|source| DecodeError::Malformed {
                event_type: event_type.to_string(),
                source,
            }),
        "workflow_job" => serde_json::from_slice(body)
            .map(|event| WebhookEvent::WorkflowJob(Box::new(event)))
            .map_err(|source| DecodeError::Malformed {
                event_type: event_type.to_string(),
                source,
            }),
        "workflow_run" => serde_json::from_slice(body)
            .map(|event| WebhookEvent::WorkflowRun(Box::new(event)))
            .map_err(|source| DecodeError::Malformed {
                event_type: event_type.to_string(),
                source,
            }),
        other => Err(DecodeError::Unsupported {
            event_type: other.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
