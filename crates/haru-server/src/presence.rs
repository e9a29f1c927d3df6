//! Last-seen presence tracking.
//!
//! A single timestamp per user in a volatile in-memory map; online/offline
//! is derived at read time from a staleness threshold.  Nothing here is
//! transactionally coupled to the relational store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// A user is reported online if their last activity is at most this old.
pub const ONLINE_THRESHOLD_SECS: i64 = 60;

#[derive(Clone)]
pub struct PresenceTracker {
    last_seen: Arc<Mutex<HashMap<i64, DateTime<Utc>>>>,
}

/// Result of a presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceStatus {
    pub online: bool,
    pub last_active: Option<DateTime<Utc>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self {
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record activity for the user, at the current instant.
    pub async fn touch(&self, user_id: i64) {
        let mut map = self.last_seen.lock().await;
        map.insert(user_id, Utc::now());
    }

    /// Online/offline plus the raw last-seen timestamp.  A user never seen
    /// is offline with no timestamp.
    pub async fn check(&self, user_id: i64) -> PresenceStatus {
        let map = self.last_seen.lock().await;
        match map.get(&user_id) {
            Some(&last) => PresenceStatus {
                online: Utc::now() - last <= Duration::seconds(ONLINE_THRESHOLD_SECS),
                last_active: Some(last),
            },
            None => PresenceStatus {
                online: false,
                last_active: None,
            },
        }
    }

    /// Evict entries idle longer than `max_idle_secs`.  Called periodically
    /// from a background task.
    pub async fn purge_stale(&self, max_idle_secs: i64) {
        let mut map = self.last_seen.lock().await;
        let now = Utc::now();
        map.retain(|_, last| now - *last < Duration::seconds(max_idle_secs));
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unseen_user_is_offline() {
        let tracker = PresenceTracker::new();
        let status = tracker.check(1).await;
        assert!(!status.online);
        assert!(status.last_active.is_none());
    }

    #[tokio::test]
    async fn touched_user_is_online() {
        let tracker = PresenceTracker::new();
        tracker.touch(1).await;

        let status = tracker.check(1).await;
        assert!(status.online);
        assert!(status.last_active.is_some());
    }

    #[tokio::test]
    async fn stale_timestamp_reads_offline() {
        let tracker = PresenceTracker::new();
        {
            let mut map = tracker.last_seen.lock().await;
            map.insert(1, Utc::now() - Duration::seconds(ONLINE_THRESHOLD_SECS + 5));
        }

        let status = tracker.check(1).await;
        assert!(!status.online);
        // The stale timestamp is still reported.
        assert!(status.last_active.is_some());
    }

    #[tokio::test]
    async fn purge_evicts_idle_entries() {
        let tracker = PresenceTracker::new();
        tracker.touch(1).await;
        {
            let mut map = tracker.last_seen.lock().await;
            map.insert(2, Utc::now() - Duration::seconds(7200));
        }

        tracker.purge_stale(3600).await;

        let map = tracker.last_seen.lock().await;
        assert!(map.contains_key(&1));
        assert!(!map.contains_key(&2));
    }
}
