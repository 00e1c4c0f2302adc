//! Transient correlation store for queued-phase job events.
//!
//! A `queued` (or `waiting`) `workflow_job` delivery is stored here, keyed
//! by the job's id, until the matching `in_progress` delivery arrives and
//! consumes it to compute queue time. Entries that are never consumed
//! (dropped deliveries, jobs cancelled while queued) are garbage-collected
//! after a retention window so the store is self-healing.
//!
//! Backed by a [`moka`] future cache: per-shard locking keeps lookups for
//! distinct jobs from contending, and the cache-wide time-to-live gives
//! every entry the same retention window. Expired entries become
//! unreachable by `get` immediately; the sweeper task reclaims their
//! memory on a fixed interval independent of read traffic.

use crate::events::WorkflowJobEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Retention window for unconsumed entries.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Interval at which the background sweeper reclaims expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Keyed store of the most recent queued-phase snapshot per job.
///
/// Invariant: at most one live entry per job id. A later queued-phase
/// event for the same id overwrites the earlier one (last-write-wins), so
/// a re-queue after an approval gate naturally captures the freshest
/// snapshot. Entries are never mutated in place; they are replaced,
/// consumed ([`remove`](Self::remove)) or expired.
///
/// Cloning is cheap and shares the underlying store, matching the access
/// pattern of one task inserting while another looks up and removes.
#[derive(Clone)]
pub struct JobEventCache {
    inner: moka::future::Cache<String, Arc<WorkflowJobEvent>>,
}

impl JobEventCache {
    /// Create a cache whose entries expire `retention` after insertion.
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .time_to_live(retention)
                .build(),
        }
    }

    /// Store (or overwrite) the queued snapshot for `job_id`.
    pub async fn insert(&self, job_id: i64, event: WorkflowJobEvent) {
        self.inner.insert(job_id.to_string(), Arc::new(event)).await;
    }

    /// Look up the queued snapshot for `job_id`, if one is live.
    pub async fn get(&self, job_id: i64) -> Option<Arc<WorkflowJobEvent>> {
        self.inner.get(&job_id.to_string()).await
    }

    /// Remove the entry for `job_id`. Removing an absent key is a no-op,
    /// so a duplicate `in_progress` after consumption degrades to a miss.
    pub async fn remove(&self, job_id: i64) {
        self.inner.invalidate(&job_id.to_string()).await;
    }

    /// Number of live entries. Runs pending maintenance first so expired
    /// entries are not counted.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    /// Spawn the periodic sweeper that reclaims expired entries without
    /// requiring a read to trigger cleanup. Aborting the returned handle
    /// stops the sweeper; the cache itself stays usable.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; skip it so the sweep
            // cadence starts one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.run_pending_tasks().await;
                debug!(entries = cache.entry_count(), "swept job correlation cache");
            }
        })
    }
}

impl Default for JobEventCache {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
