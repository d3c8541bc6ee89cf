use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::run::RunLogEntry;

/// Upper bound on entries returned by [`RunLogRecorder::recent`].
pub const RECENT_RUNS_LIMIT: usize = 50;

/// In-memory history of runs.
///
/// Readers get whole snapshots: an entry is replaced atomically on every
/// publish, never patched in place, and a finalized entry is never
/// replaced again.
#[derive(Debug, Clone, Default)]
pub struct RunLogRecorder {
    entries: Arc<RwLock<HashMap<Uuid, RunLogEntry>>>,
}

impl RunLogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, RunLogEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, RunLogEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a snapshot of `entry`. Returns false if a finalized entry with
    /// the same id already exists, in which case nothing changes.
    pub fn publish(&self, entry: &RunLogEntry) -> bool {
        let mut entries = self.write();
        if entries.get(&entry.id).is_some_and(RunLogEntry::is_finalized) {
            tracing::warn!(run_id = %entry.id, "Refusing to overwrite finalized run");
            return false;
        }
        entries.insert(entry.id, entry.clone());
        true
    }

    pub fn get(&self, id: Uuid) -> Option<RunLogEntry> {
        self.read().get(&id).cloned()
    }

    /// Most recent runs first, at most `min(limit, RECENT_RUNS_LIMIT)`.
    pub fn recent(&self, limit: usize) -> Vec<RunLogEntry> {
        let mut runs: Vec<RunLogEntry> = self.read().values().cloned().collect();
        runs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        runs.truncate(limit.min(RECENT_RUNS_LIMIT));
        runs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::run::{RunStatus, ScrapeRequest, SiteOutcome};

    fn entry_started_at(minutes_ago: i64) -> RunLogEntry {
        let mut entry = RunLogEntry::pending(&ScrapeRequest::new(["remoteok"]));
        entry.started_at = Utc::now() - Duration::minutes(minutes_ago);
        entry
    }

    #[test]
    fn test_recent_orders_newest_first() {
        let recorder = RunLogRecorder::new();
        let old = entry_started_at(30);
        let newest = entry_started_at(1);
        let middle = entry_started_at(10);
        for e in [&old, &newest, &middle] {
            recorder.publish(e);
        }

        let ids: Vec<_> = recorder.recent(10).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newest.id, middle.id, old.id]);
        assert_eq!(recorder.recent(2).len(), 2);
    }

    #[test]
    fn test_recent_is_capped() {
        let recorder = RunLogRecorder::new();
        for i in 0..60 {
            recorder.publish(&entry_started_at(i));
        }
        assert_eq!(recorder.len(), 60);
        assert_eq!(recorder.recent(1000).len(), RECENT_RUNS_LIMIT);
    }

    #[test]
    fn test_finalized_entry_is_immutable() {
        let recorder = RunLogRecorder::new();
        let mut entry = entry_started_at(0);
        entry.mark_running();
        assert!(recorder.publish(&entry));

        entry.record_outcome("remoteok", SiteOutcome::success(3, 0));
        entry.complete(3);
        assert!(recorder.publish(&entry));

        let mut tampered = entry.clone();
        tampered.jobs_found = 99;
        assert!(!recorder.publish(&tampered));

        let stored = recorder.get(entry.id).unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert_eq!(stored.jobs_found, 3);
    }

    #[test]
    fn test_get_unknown_run() {
        let recorder = RunLogRecorder::new();
        assert!(recorder.get(Uuid::new_v4()).is_none());
        assert!(recorder.is_empty());
    }
}
