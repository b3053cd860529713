use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, error, info};

use crate::cache::{Entry, EntryCache, EntryId};
use crate::error::ScanError;

/// A venv that could not be removed. Its cache entry is left untouched.
#[derive(Debug)]
pub struct CleanupFailure {
    pub id: EntryId,
    pub path: PathBuf,
    pub error: ScanError,
}

/// Outcome of one cleanup batch.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Distinct requested ids that were present in the cache.
    pub requested: usize,
    pub succeeded: usize,
    pub failed: Vec<CleanupFailure>,
    /// Sum of cached sizes of the removed venvs.
    pub freed_bytes: u64,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Outcome {
    Removed(u64),
    Failed(CleanupFailure),
}

/// Deletes selected venvs and keeps the [`EntryCache`] in step.
///
/// Callers must stop any running scan with
/// [`ScanController::cancel_and_wait`](crate::ScanController::cancel_and_wait)
/// before calling [`cleanup`](Self::cleanup).
pub struct CleanupCoordinator {
    cache: Arc<EntryCache>,
}

impl CleanupCoordinator {
    pub fn new(cache: Arc<EntryCache>) -> Self {
        Self { cache }
    }

    /// Recursively delete every requested venv. One failure never stops the
    /// rest of the batch; failures are listed in request order.
    pub fn cleanup<I>(&self, ids: I) -> CleanupReport
    where
        I: IntoIterator<Item = EntryId>,
    {
        let mut seen = HashSet::new();
        let entries: Vec<Entry> = ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| {
                let entry = self.cache.get(id);
                if entry.is_none() {
                    debug!("cleanup: id {id} is not cached, ignoring");
                }
                entry
            })
            .collect();

        let outcomes: Vec<Outcome> = entries
            .into_par_iter()
            .map(|entry| self.remove_one(entry))
            .collect();

        let mut report = CleanupReport {
            requested: outcomes.len(),
            ..CleanupReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Removed(bytes) => {
                    report.succeeded += 1;
                    report.freed_bytes += bytes;
                }
                Outcome::Failed(failure) => report.failed.push(failure),
            }
        }
        report
    }

    fn remove_one(&self, entry: Entry) -> Outcome {
        match fs::remove_dir_all(&entry.path) {
            Ok(()) => {
                info!("Cleaned up: {}", entry.path.display());
                let freed = self
                    .cache
                    .remove(entry.id)
                    .map(|removed| removed.size_bytes)
                    .unwrap_or(0);
                Outcome::Removed(freed)
            }
            Err(err) => {
                error!("Failed to clean up: {} ({err})", entry.path.display());
                Outcome::Failed(CleanupFailure {
                    id: entry.id,
                    error: ScanError::from_io(&entry.path, err),
                    path: entry.path,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn venv(cache: &EntryCache, dir: &Path, size: u64) -> EntryId {
        fs::create_dir_all(dir.join("bin")).unwrap();
        fs::write(dir.join("pyvenv.cfg"), b"").unwrap();
        let id = cache.insert(dir.to_path_buf(), None);
        cache.update_size(dir, size);
        id
    }

    #[test]
    fn removes_selected_and_keeps_the_rest() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(EntryCache::new());
        let a = venv(&cache, &tmp.path().join("a"), 10);
        let b = venv(&cache, &tmp.path().join("b"), 20);
        let c = venv(&cache, &tmp.path().join("c"), 30);

        let report = CleanupCoordinator::new(Arc::clone(&cache)).cleanup([a, c, a]);

        assert_eq!(report.requested, 2);
        assert_eq!(report.succeeded, 2);
        assert!(report.is_clean());
        assert_eq!(report.freed_bytes, 40);
        assert!(!tmp.path().join("a").exists());
        assert!(!tmp.path().join("c").exists());
        assert!(tmp.path().join("b").exists());

        let remaining = cache.all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
        assert_eq!(cache.total(), 20);
    }

    #[test]
    fn vanished_path_is_reported_and_kept() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(EntryCache::new());
        let gone = venv(&cache, &tmp.path().join("gone"), 5);
        let ok = venv(&cache, &tmp.path().join("ok"), 7);
        fs::remove_dir_all(tmp.path().join("gone")).unwrap();

        let report = CleanupCoordinator::new(Arc::clone(&cache)).cleanup([gone, ok]);

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        let failure = &report.failed[0];
        assert_eq!(failure.id, gone);
        assert_eq!(failure.path, tmp.path().join("gone"));
        assert!(matches!(failure.error, ScanError::NotFound(_)));

        assert!(cache.get(gone).is_some());
        assert!(cache.get(ok).is_none());
        assert_eq!(cache.total(), 5);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let cache = Arc::new(EntryCache::new());
        let report = CleanupCoordinator::new(cache).cleanup([41, 42]);
        assert_eq!(report.requested, 0);
        assert_eq!(report.succeeded, 0);
        assert!(report.is_clean());
    }

    #[cfg(unix)]
    #[test]
    fn permission_denied_does_not_stop_the_batch() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(EntryCache::new());
        let locked_parent = tmp.path().join("locked");
        let locked = venv(&cache, &locked_parent.join(".venv"), 1);
        let free = venv(&cache, &tmp.path().join("free/.venv"), 2);

        fs::set_permissions(&locked_parent, fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users ignore directory permissions; nothing to test then.
        let canary = locked_parent.join("canary");
        if fs::write(&canary, b"").is_ok() {
            fs::remove_file(&canary).unwrap();
            fs::set_permissions(&locked_parent, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = CleanupCoordinator::new(Arc::clone(&cache)).cleanup([locked, free]);
        fs::set_permissions(&locked_parent, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, locked);
        assert!(cache.get(locked).is_some());
        assert!(cache.get(free).is_none());
    }
}
