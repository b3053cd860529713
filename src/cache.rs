use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

pub type EntryId = u64;

/// One discovered environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// `size_bytes` has been filled in. An empty venv legitimately sizes to 0.
    pub sized: bool,
    pub modified_at: Option<SystemTime>,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<EntryId, Entry>,
    by_path: HashMap<PathBuf, EntryId>,
    total_bytes: u64,
    next_id: EntryId,
}

/// Registry of discovered environments shared by the scan worker and the
/// cleanup path.
///
/// Both lookups and the running total sit behind a single mutex so readers
/// never see an entry counted in `total()` that is missing from `all()`.
#[derive(Default)]
pub struct EntryCache {
    inner: Mutex<Inner>,
}

impl EntryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // No mutation below can panic halfway, so a poisoned guard is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a newly discovered environment. Re-inserting a known path
    /// returns its existing id.
    pub fn insert(&self, path: PathBuf, modified_at: Option<SystemTime>) -> EntryId {
        let mut inner = self.lock();
        if let Some(&id) = inner.by_path.get(&path) {
            return id;
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.by_path.insert(path.clone(), id);
        inner.by_id.insert(
            id,
            Entry {
                id,
                path,
                size_bytes: 0,
                sized: false,
                modified_at,
            },
        );
        id
    }

    /// Record the computed size for `path`. Returns false when the path is no
    /// longer cached or was already sized, in which case the update is ignored.
    pub fn update_size(&self, path: &Path, size_bytes: u64) -> bool {
        let mut inner = self.lock();
        let Some(&id) = inner.by_path.get(path) else {
            return false;
        };
        let Some(entry) = inner.by_id.get_mut(&id) else {
            return false;
        };
        if entry.sized {
            return false;
        }

        entry.size_bytes = size_bytes;
        entry.sized = true;
        inner.total_bytes += size_bytes;
        true
    }

    pub fn remove(&self, id: EntryId) -> Option<Entry> {
        let mut inner = self.lock();
        let entry = inner.by_id.remove(&id)?;
        inner.by_path.remove(&entry.path);
        inner.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    /// Drop every entry. The id counter keeps running.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.by_id.clear();
        inner.by_path.clear();
        inner.total_bytes = 0;
    }

    pub fn get(&self, id: EntryId) -> Option<Entry> {
        self.lock().by_id.get(&id).cloned()
    }

    pub fn id_of(&self, path: &Path) -> Option<EntryId> {
        self.lock().by_path.get(path).copied()
    }

    pub fn total(&self) -> u64 {
        self.lock().total_bytes
    }

    /// Snapshot of all entries, in no particular order.
    pub fn all(&self) -> Vec<Entry> {
        self.lock().by_id.values().cloned().collect()
    }

    /// Entries and total taken under one lock.
    pub fn snapshot(&self) -> (Vec<Entry>, u64) {
        let inner = self.lock();
        (inner.by_id.values().cloned().collect(), inner.total_bytes)
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
