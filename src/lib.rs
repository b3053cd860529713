//! Find Python virtual environments under a directory, size them in the
//! background, and delete the ones the user picks.

pub mod cache;
pub mod cleanup;
pub mod error;
pub mod events;
pub mod scan;
pub mod sizer;
pub mod utils;

pub use cache::{Entry, EntryCache, EntryId};
pub use cleanup::{CleanupCoordinator, CleanupFailure, CleanupReport};
pub use error::ScanError;
pub use events::{EventReceiver, Generation, Phase, ScanEvent};
pub use scan::{ScanController, ScanState};
pub use sizer::{estimate_size, SizeEstimate};

/// File whose presence marks a directory as a virtual environment.
pub const MARKER_FILE: &str = "pyvenv.cfg";
