//! Tests for the job correlation cache.
//!
//! Retention behaviour is exercised with millisecond windows; the
//! production default is 24 hours.

use super::*;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

/// A queued-phase event distinguishable by its action string.
fn event_with_action(action: &str) -> WorkflowJobEvent {
    WorkflowJobEvent {
        action: Some(action.to_string()),
        repository: None,
        workflow_job: None,
        deployment: None,
    }
}

// ============================================================================
// Basic operations
// ============================================================================

mod operations_tests {
    use super::*;

    /// An inserted entry is retrievable under its job id.
    #[tokio::test]
    async fn test_insert_then_get() {
        let cache = JobEventCache::new(Duration::from_secs(60));
        cache.insert(1214121, event_with_action("queued")).await;

        let cached = cache.get(1214121).await.expect("entry should be live");
        assert_eq!(cached.action.as_deref(), Some("queued"));
        assert_eq!(cache.entry_count().await, 1);
    }

    /// A second insert under the same id overwrites the first
    /// (last-write-wins), leaving a single live entry.
    #[tokio::test]
    async fn test_reinsert_overwrites() {
        let cache = JobEventCache::new(Duration::from_secs(60));
        cache.insert(62352, event_with_action("queued")).await;
        cache.insert(62352, event_with_action("waiting")).await;

        let cached = cache.get(62352).await.expect("entry should be live");
        assert_eq!(cached.action.as_deref(), Some("waiting"));
        assert_eq!(cache.entry_count().await, 1);
    }

    /// Removal makes the entry unreachable; removing again is a no-op.
    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = JobEventCache::new(Duration::from_secs(60));
        cache.insert(11, event_with_action("queued")).await;

        cache.remove(11).await;
        assert!(cache.get(11).await.is_none());
        assert_eq!(cache.entry_count().await, 0);

        // Second remove of the same key must not error or panic.
        cache.remove(11).await;
        assert!(cache.get(11).await.is_none());
    }

    /// Entries for distinct jobs do not interfere.
    #[tokio::test]
    async fn test_distinct_keys_independent() {
        let cache = JobEventCache::new(Duration::from_secs(60));
        cache.insert(1, event_with_action("queued")).await;
        cache.insert(2, event_with_action("waiting")).await;

        cache.remove(1).await;
        assert!(cache.get(1).await.is_none());
        assert!(cache.get(2).await.is_some());
    }
}

// ============================================================================
// Retention
// ============================================================================

mod retention_tests {
    use super::*;

    /// An entry older than the retention window is unreachable by `get`
    /// even when no `in_progress` delivery ever consumed it.
    #[tokio::test]
    async fn test_expired_entry_unreachable() {
        let cache = JobEventCache::new(Duration::from_millis(50));
        cache.insert(1214121, event_with_action("queued")).await;

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get(1214121).await.is_none());
        assert_eq!(cache.entry_count().await, 0);
    }

    /// An entry younger than the retention window stays reachable.
    #[tokio::test]
    async fn test_live_entry_reachable() {
        let cache = JobEventCache::new(Duration::from_secs(60));
        cache.insert(1214121, event_with_action("queued")).await;

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get(1214121).await.is_some());
    }

    /// The background sweeper runs on its interval and can be stopped by
    /// aborting its handle; the cache stays usable afterwards.
    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let cache = JobEventCache::new(Duration::from_millis(30));
        let sweeper = cache.spawn_sweeper(Duration::from_millis(40));

        cache.insert(7, event_with_action("queued")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get(7).await.is_none());

        sweeper.abort();
        cache.insert(8, event_with_action("queued")).await;
        assert!(cache.get(8).await.is_some());
    }
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency_tests {
    use super::*;

    /// Concurrent set/get/delete on distinct keys from many tasks all
    /// land; the store never loses a write racing on a different key.
    #[tokio::test]
    async fn test_concurrent_access_on_distinct_keys() {
        let cache = JobEventCache::new(Duration::from_secs(60));

        let mut handles = Vec::new();
        for id in 0..32i64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.insert(id, event_with_action("queued")).await;
                let cached = cache.get(id).await;
                cache.remove(id).await;
                cached.is_some()
            }));
        }

        for handle in handles {
            assert!(handle.await.expect("task should not panic"));
        }
        assert_eq!(cache.entry_count().await, 0);
    }
}
