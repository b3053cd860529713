use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::cache::EntryId;

pub type Generation = u64;

/// The two phases a scan reports completion for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Sizing,
}

/// Messages sent from the scan worker to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    EntryDiscovered {
        generation: Generation,
        id: EntryId,
        path: PathBuf,
        modified_at: Option<SystemTime>,
    },
    SizeComputed {
        generation: Generation,
        path: PathBuf,
        size_bytes: u64,
    },
    PhaseComplete {
        generation: Generation,
        phase: Phase,
    },
}

impl ScanEvent {
    pub fn generation(&self) -> Generation {
        match self {
            ScanEvent::EntryDiscovered { generation, .. }
            | ScanEvent::SizeComputed { generation, .. }
            | ScanEvent::PhaseComplete { generation, .. } => *generation,
        }
    }
}

/// A worker's claim on one scan generation. It stays valid until the
/// controller moves the shared counter on.
#[derive(Clone)]
pub(crate) struct GenerationToken {
    generation: Generation,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    pub(crate) fn new(generation: Generation, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
        }
    }

    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

/// Receiving end of the scan event channel.
///
/// Events from a generation that is no longer current are dropped here, so a
/// consumer never sees data queued by a scan that was cancelled or restarted.
pub struct EventReceiver {
    rx: mpsc::Receiver<ScanEvent>,
    current: Arc<AtomicU64>,
}

impl EventReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<ScanEvent>, current: Arc<AtomicU64>) -> Self {
        Self { rx, current }
    }

    fn is_current(&self, event: &ScanEvent) -> bool {
        event.generation() == self.current.load(Ordering::Acquire)
    }

    /// Next pending event of the current generation, without blocking.
    pub fn try_recv(&self) -> Option<ScanEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if self.is_current(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Wait up to `timeout` for the next event of the current generation.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ScanEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) if self.is_current(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Every pending event of the current generation, in emission order.
    pub fn drain(&self) -> Vec<ScanEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(generation: Generation) -> ScanEvent {
        ScanEvent::PhaseComplete {
            generation,
            phase: Phase::Sizing,
        }
    }

    #[test]
    fn stale_events_are_dropped() {
        let current = Arc::new(AtomicU64::new(1));
        let (tx, rx) = mpsc::channel();
        let receiver = EventReceiver::new(rx, Arc::clone(&current));

        tx.send(done(1)).unwrap();
        tx.send(done(1)).unwrap();
        current.store(2, Ordering::Release);
        tx.send(done(2)).unwrap();

        assert_eq!(receiver.drain(), vec![done(2)]);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn token_tracks_shared_counter() {
        let current = Arc::new(AtomicU64::new(5));
        let token = GenerationToken::new(5, Arc::clone(&current));
        assert!(token.is_current());
        current.fetch_add(1, Ordering::AcqRel);
        assert!(!token.is_current());
    }

    #[test]
    fn recv_timeout_gives_up() {
        let current = Arc::new(AtomicU64::new(0));
        let (_tx, rx) = mpsc::channel::<ScanEvent>();
        let receiver = EventReceiver::new(rx, current);
        assert!(receiver.recv_timeout(Duration::from_millis(20)).is_none());
    }
}
