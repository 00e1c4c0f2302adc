//! # Actions Exporter Core
//!
//! Domain logic for translating GitHub Actions webhook events into metric
//! observations: typed event decoding, webhook signature verification,
//! the job correlation cache, and the workflow lifecycle collectors.
//!
//! ## Architecture
//!
//! The core owns no infrastructure. Metric output goes through the
//! [`observer::WorkflowObserver`] family of traits, implemented by the
//! Prometheus-backed layer in `actions-exporter-api` and by recording
//! doubles in tests. The only shared mutable state is the
//! [`cache::JobEventCache`] correlating a job's `queued` snapshot with
//! its later `in_progress` delivery.
//!
//! ## Data flow
//!
//! ```text
//! raw body + headers
//!   → signature::verify_signature
//!   → events::decode_event
//!   → collector::WorkflowMetricsCollector (spawned, fire-and-forget)
//!       ├── cache::JobEventCache (read/write)
//!       └── observer::WorkflowObserver (write)
//! ```

/// Typed webhook events and payload decoding.
pub mod events;

/// HMAC webhook signature verification.
pub mod signature;

/// Transient queued-event correlation store.
pub mod cache;

/// Metric sink traits and label sets.
pub mod observer;

/// Workflow job/run lifecycle collectors.
pub mod collector;

// Re-export the types most callers need.
pub use cache::{JobEventCache, DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL};
pub use collector::WorkflowMetricsCollector;
pub use events::{decode_event, DecodeError, PingEvent, WebhookEvent, WorkflowJobEvent, WorkflowRunEvent};
pub use observer::{
    BillingObserver, NoOpWorkflowObserver, RunnersObserver, WorkflowJobLabels, WorkflowObserver,
    WorkflowRunLabels,
};
pub use signature::{verify_signature, SignatureError};
