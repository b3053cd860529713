use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, ScanError};

/// Outcome of sizing one directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeEstimate {
    pub bytes: u64,
    /// Children that could not be read and were left out of `bytes`.
    pub skipped: usize,
}

impl SizeEstimate {
    pub fn is_partial(&self) -> bool {
        self.skipped > 0
    }
}

/// Compute the total size of every regular file below `path`.
///
/// Symlinks are not followed and count as zero. Unreadable children are
/// skipped, so the result may be partial; only an inaccessible root is an
/// error.
pub fn estimate_size(path: &Path) -> Result<SizeEstimate> {
    fs::metadata(path).map_err(|e| ScanError::from_io(path, e))?;

    let mut estimate = SizeEstimate {
        bytes: 0,
        skipped: 0,
    };

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("unreadable root"));
                return Err(ScanError::from_io(path, source));
            }
            Err(err) => {
                debug!("skipping unreadable entry while sizing: {err}");
                estimate.skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(meta) => estimate.bytes += meta.len(),
            Err(err) => {
                debug!("skipping {}: {err}", entry.path().display());
                estimate.skipped += 1;
            }
        }
    }

    Ok(estimate)
}
