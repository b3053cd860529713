use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use venvcleaner::{
    CleanupCoordinator, EntryCache, EventReceiver, Phase, ScanController, ScanError, ScanEvent,
    ScanState,
};

fn write_file(path: &Path, len: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![b'x'; len]).unwrap();
}

fn wait_for_scan(events: &EventReceiver) -> Vec<ScanEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv_timeout(Duration::from_secs(30)) {
        let done = matches!(
            event,
            ScanEvent::PhaseComplete {
                phase: Phase::Sizing,
                ..
            }
        );
        seen.push(event);
        if done {
            return seen;
        }
    }
    panic!("scan did not complete");
}

#[test]
fn scan_then_clean_one_venv() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let env_a = root.join("envA");
    let env_b = root.join("sub/envB");

    // envA: marker + one more file, 100 bytes in total
    write_file(&env_a.join("pyvenv.cfg"), 40);
    write_file(&env_a.join("lib/site.py"), 60);
    // envB: the marker alone, 50 bytes
    write_file(&env_b.join("pyvenv.cfg"), 50);

    let cache = Arc::new(EntryCache::new());
    let (mut scanner, events) = ScanController::new(Arc::clone(&cache));
    scanner.start(&root).unwrap();
    let seen = wait_for_scan(&events);

    let mut sizes: Vec<(PathBuf, u64)> = seen
        .iter()
        .filter_map(|e| match e {
            ScanEvent::SizeComputed {
                path, size_bytes, ..
            } => Some((path.clone(), *size_bytes)),
            _ => None,
        })
        .collect();
    sizes.sort();
    assert_eq!(sizes, vec![(env_a.clone(), 100), (env_b.clone(), 50)]);
    assert_eq!(cache.total(), 150);
    assert_eq!(scanner.state(), ScanState::Done);

    let id_a = cache.id_of(&env_a).unwrap();
    scanner.cancel_and_wait();
    let report = CleanupCoordinator::new(Arc::clone(&cache)).cleanup([id_a]);

    assert_eq!(report.succeeded, 1);
    assert!(report.failed.is_empty());
    assert!(!env_a.exists());

    let remaining = cache.all();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].path, env_b);
    assert_eq!(cache.total(), 50);
}

#[test]
fn missing_root_reports_not_found() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nothing-here");

    let cache = Arc::new(EntryCache::new());
    let (mut scanner, events) = ScanController::new(Arc::clone(&cache));
    let err = scanner.start(&missing).unwrap_err();

    assert!(matches!(err, ScanError::NotFound(_)));
    assert!(events.recv_timeout(Duration::from_millis(200)).is_none());
    assert!(cache.is_empty());
}

#[test]
fn rescan_after_cleanup_sees_only_survivors() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    for name in ["one", "two", "three"] {
        write_file(&root.join(name).join(".venv/pyvenv.cfg"), 8);
    }

    let cache = Arc::new(EntryCache::new());
    let (mut scanner, events) = ScanController::new(Arc::clone(&cache));
    scanner.start(&root).unwrap();
    wait_for_scan(&events);

    let two = cache.id_of(&root.join("two/.venv")).unwrap();
    scanner.cancel_and_wait();
    let report = CleanupCoordinator::new(Arc::clone(&cache)).cleanup([two]);
    assert_eq!(report.succeeded, 1);

    scanner.start(&root).unwrap();
    wait_for_scan(&events);

    let mut paths: Vec<PathBuf> = cache.all().into_iter().map(|e| e.path).collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![root.join("one/.venv"), root.join("three/.venv")]
    );
    // Ids from the previous scan never come back.
    assert!(cache.get(two).is_none());
    assert_eq!(cache.total(), 16);
}
