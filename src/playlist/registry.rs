use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use tracing::error;

/// Outcome of one expiry pass over the registry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired playlists deleted and dropped from the registry
    pub removed: Vec<String>,
    /// Expired playlists whose deletion failed, kept for the next pass
    pub failed: Vec<String>,
}

/// In-memory record of generated playlists and when they were created.
///
/// Every access goes through one lock. Entries are written once after a
/// playlist is assembled and only removed by the expiry sweep.
#[derive(Debug, Default)]
pub struct PlaylistRegistry {
    entries: Mutex<HashMap<String, i64>>,
}

fn is_expired(created_at: i64, now: i64, max_age_secs: i64) -> bool {
    now - created_at > max_age_secs
}

impl PlaylistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a playlist, overwriting the timestamp of a known id
    pub fn insert(&self, playlist_id: &str, created_at: i64) {
        self.lock().insert(playlist_id.to_string(), created_at);
    }

    #[cfg(test)]
    pub fn created_at(&self, playlist_id: &str) -> Option<i64> {
        self.lock().get(playlist_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether any playlist is older than `max_age_secs` at `now`
    pub fn has_expired(&self, now: i64, max_age_secs: i64) -> bool {
        self.lock()
            .values()
            .any(|created_at| is_expired(*created_at, now, max_age_secs))
    }

    /// Delete every playlist older than `max_age_secs` at `now`.
    ///
    /// The lock is held for the whole pass. An entry leaves the registry only
    /// when `delete` succeeds for it.
    pub fn sweep<F>(&self, now: i64, max_age_secs: i64, mut delete: F) -> SweepReport
    where
        F: FnMut(&str) -> Result<()>,
    {
        let mut entries = self.lock();
        let mut expired: Vec<String> = entries
            .iter()
            .filter(|(_, created_at)| is_expired(**created_at, now, max_age_secs))
            .map(|(playlist_id, _)| playlist_id.clone())
            .collect();
        expired.sort();

        let mut report = SweepReport::default();
        for playlist_id in expired {
            match delete(&playlist_id) {
                Ok(()) => {
                    entries.remove(&playlist_id);
                    report.removed.push(playlist_id);
                }
                Err(e) => {
                    error!(playlist_id = %playlist_id, "Error deleting playlist: {e:#}");
                    report.failed.push(playlist_id);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_insert_overwrites_timestamp() {
        let registry = PlaylistRegistry::new();
        registry.insert("pl1", 100);
        registry.insert("pl1", 200);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.created_at("pl1"), Some(200));
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let registry = PlaylistRegistry::new();
        registry.insert("old", 1_000);
        registry.insert("fresh", 4_000);

        let mut deleted = Vec::new();
        let report = registry.sweep(5_000, 3_600, |id| {
            deleted.push(id.to_string());
            Ok(())
        });

        assert_eq!(deleted, vec!["old"]);
        assert_eq!(report.removed, vec!["old"]);
        assert!(report.failed.is_empty());
        assert_eq!(registry.created_at("old"), None);
        assert_eq!(registry.created_at("fresh"), Some(4_000));
    }

    #[test]
    fn test_exact_threshold_age_survives() {
        let registry = PlaylistRegistry::new();
        registry.insert("edge", 1_400);

        let report = registry.sweep(5_000, 3_600, |_| Ok(()));

        assert!(report.removed.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_has_expired_follows_sweep_threshold() {
        let registry = PlaylistRegistry::new();
        assert!(!registry.has_expired(5_000, 3_600));

        registry.insert("edge", 1_400);
        assert!(!registry.has_expired(5_000, 3_600));
        assert!(registry.has_expired(5_001, 3_600));
    }

    #[test]
    fn test_failed_deletion_is_kept_for_retry() {
        let registry = PlaylistRegistry::new();
        registry.insert("stuck", 0);
        registry.insert("gone", 0);

        let report = registry.sweep(10_000, 3_600, |id| {
            if id == "stuck" {
                Err(anyhow!("HTTP 503: Service unavailable"))
            } else {
                Ok(())
            }
        });

        assert_eq!(report.removed, vec!["gone"]);
        assert_eq!(report.failed, vec!["stuck"]);
        assert_eq!(registry.created_at("stuck"), Some(0));

        // The next pass picks it up again
        let report = registry.sweep(10_000, 3_600, |_| Ok(()));
        assert_eq!(report.removed, vec!["stuck"]);
        assert!(registry.is_empty());
    }
}
