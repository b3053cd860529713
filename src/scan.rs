use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cache::EntryCache;
use crate::error::{Result, ScanError};
use crate::events::{EventReceiver, Generation, GenerationToken, Phase, ScanEvent};
use crate::sizer;
use crate::MARKER_FILE;

/// Lifecycle of the scan owned by a [`ScanController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Discovering,
    Sizing,
    Done,
    Cancelled,
    /// The last `start` was rejected because its root could not be walked,
    /// or its worker died before finishing.
    Failed,
}

impl ScanState {
    pub fn is_running(self) -> bool {
        matches!(self, ScanState::Discovering | ScanState::Sizing)
    }
}

/// Runs at most one background scan at a time and feeds its results into a
/// shared [`EntryCache`] and an event channel.
pub struct ScanController {
    cache: Arc<EntryCache>,
    tx: mpsc::Sender<ScanEvent>,
    current: Arc<AtomicU64>,
    state: Arc<Mutex<ScanState>>,
    worker: Option<JoinHandle<()>>,
}

impl ScanController {
    /// Create an idle controller together with the receiver its events go to.
    pub fn new(cache: Arc<EntryCache>) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel();
        let current = Arc::new(AtomicU64::new(0));
        let receiver = EventReceiver::new(rx, Arc::clone(&current));
        let controller = Self {
            cache,
            tx,
            current,
            state: Arc::new(Mutex::new(ScanState::Idle)),
            worker: None,
        };
        (controller, receiver)
    }

    /// Stop any running scan, forget its results and start scanning `root`.
    ///
    /// Returns the new generation once the worker is spawned. Fails without
    /// spawning anything when `root` is missing or not a directory.
    pub fn start(&mut self, root: &Path) -> Result<Generation> {
        self.cancel_and_wait();
        self.cache.clear();
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;

        let root = match validate_root(root) {
            Ok(root) => root,
            Err(err) => {
                warn!("Cannot scan {}: {err}", root.display());
                set_state(&self.state, ScanState::Failed);
                return Err(err);
            }
        };

        info!("Finding venvs under {}", root.display());
        set_state(&self.state, ScanState::Discovering);

        let worker = ScanWorker {
            token: GenerationToken::new(generation, Arc::clone(&self.current)),
            root,
            cache: Arc::clone(&self.cache),
            tx: self.tx.clone(),
            state: Arc::clone(&self.state),
        };
        self.worker = Some(thread::spawn(move || worker.run()));
        Ok(generation)
    }

    /// Invalidate the running scan and block until its worker has exited.
    /// Does nothing when no scan is running.
    pub fn cancel_and_wait(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        if self.state().is_running() {
            self.current.fetch_add(1, Ordering::AcqRel);
        }
        if handle.join().is_err() {
            error!("scan worker panicked");
        }

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.is_running() {
            debug!("scan cancelled");
            *state = ScanState::Cancelled;
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// The generation whose events the receiver currently accepts.
    pub fn generation(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    pub fn cache(&self) -> &Arc<EntryCache> {
        &self.cache
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.cancel_and_wait();
    }
}

fn set_state(state: &Mutex<ScanState>, next: ScanState) {
    *state.lock().unwrap_or_else(|p| p.into_inner()) = next;
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    let root = fs::canonicalize(root).map_err(|e| ScanError::from_io(root, e))?;
    let meta = fs::metadata(&root).map_err(|e| ScanError::from_io(&root, e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(root));
    }
    Ok(root)
}

/// Everything one generation's background thread needs.
struct ScanWorker {
    token: GenerationToken,
    root: PathBuf,
    cache: Arc<EntryCache>,
    tx: mpsc::Sender<ScanEvent>,
    state: Arc<Mutex<ScanState>>,
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("scan worker for {} died", self.root.display());
            set_state(&self.state, ScanState::Failed);
        }
    }
}

impl ScanWorker {
    fn run(self) {
        let started = Instant::now();
        let generation = self.token.generation();

        let Some(found) = self.discover() else {
            return;
        };
        debug!(
            "discovered {} venvs in {:?}",
            found.len(),
            started.elapsed()
        );

        if !self.advance(ScanState::Sizing, Phase::Discovering) {
            return;
        }
        if !self.size_all(&found) {
            return;
        }
        if self.advance(ScanState::Done, Phase::Sizing) {
            info!(
                "Found {} venvs under {} (generation {generation}, {:?})",
                found.len(),
                self.root.display(),
                started.elapsed()
            );
        }
    }

    /// Send `event` unless this generation has been superseded.
    fn emit(&self, event: ScanEvent) -> bool {
        if !self.token.is_current() {
            return false;
        }
        let _ = self.tx.send(event);
        true
    }

    /// Move to `next` and announce that `phase` finished.
    fn advance(&self, next: ScanState, phase: Phase) -> bool {
        if !self.token.is_current() {
            return false;
        }
        set_state(&self.state, next);
        self.emit(ScanEvent::PhaseComplete {
            generation: self.token.generation(),
            phase,
        })
    }

    /// Walk the root depth-first and register every directory holding the
    /// marker file. Matched directories are not descended into.
    ///
    /// Returns the discovered paths in discovery order, or `None` if the
    /// generation was cancelled.
    fn discover(&self) -> Option<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut walker = WalkDir::new(&self.root).follow_links(false).into_iter();

        loop {
            if !self.token.is_current() {
                return None;
            }

            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) if err.depth() == 0 => {
                    error!("Failed to find venvs: {err}");
                    break;
                }
                Some(Err(err)) => {
                    warn!("Skipping unreadable path: {err}");
                    continue;
                }
            };

            if !entry.file_type().is_dir() || !entry.path().join(MARKER_FILE).is_file() {
                continue;
            }
            walker.skip_current_dir();

            let modified_at = entry.metadata().ok().and_then(|m| m.modified().ok());
            let path = entry.into_path();
            let id = self.cache.insert(path.clone(), modified_at);
            debug!("found venv {}", path.display());

            let event = ScanEvent::EntryDiscovered {
                generation: self.token.generation(),
                id,
                path: path.clone(),
                modified_at,
            };
            if !self.emit(event) {
                return None;
            }
            found.push(path);
        }

        Some(found)
    }

    /// Size each discovered venv in discovery order. Returns false if the
    /// generation was cancelled part way.
    fn size_all(&self, found: &[PathBuf]) -> bool {
        for path in found {
            if !self.token.is_current() {
                return false;
            }

            let estimate = match sizer::estimate_size(path) {
                Ok(estimate) => estimate,
                Err(err) => {
                    warn!("Failed to compute size of {}: {err}", path.display());
                    continue;
                }
            };
            if estimate.is_partial() {
                debug!(
                    "{} unreadable entries skipped while sizing {}",
                    estimate.skipped,
                    path.display()
                );
            }

            if !self.token.is_current() {
                return false;
            }
            if !self.cache.update_size(path, estimate.bytes) {
                debug!("ignoring size of {}: no longer cached", path.display());
                continue;
            }

            let event = ScanEvent::SizeComputed {
                generation: self.token.generation(),
                path: path.clone(),
                size_bytes: estimate.bytes,
            };
            if !self.emit(event) {
                return false;
            }
        }
        true
    }
}
