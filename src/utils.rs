use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};

/// Format byte count as human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.2} KB", bytes as f64 / 1_024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Local wall-clock time of a directory's mtime, or `-` when unknown.
pub fn format_timestamp(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Shorten a path for display by replacing home dir with ~.
pub fn display_path(path: &Path) -> String {
    match dirs::home_dir() {
        Some(home) => match path.strip_prefix(&home) {
            Ok(relative) => format!("~/{}", relative.display()),
            Err(_) => path.display().to_string(),
        },
        None => path.display().to_string(),
    }
}

/// Last path component, e.g. `.venv`.
pub fn venv_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The directory holding a venv, relative to the scan root (`.` when the
/// venv sits directly under the root).
pub fn relative_location(root: &Path, venv: &Path) -> String {
    let parent = venv.parent().unwrap_or(venv);
    match parent.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => display_path(parent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sizes_pick_the_largest_fitting_unit() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1_048_576), "5.00 MB");
        assert_eq!(format_size(3 * 1_073_741_824), "3.00 GB");
    }

    #[test]
    fn unknown_timestamp_is_a_dash() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some(SystemTime::now())).len(), 19);
    }

    #[cfg(unix)]
    #[test]
    fn location_is_relative_to_root() {
        let root = PathBuf::from("/work");
        assert_eq!(relative_location(&root, Path::new("/work/.venv")), ".");
        assert_eq!(
            relative_location(&root, Path::new("/work/api/server/.venv")),
            "api/server"
        );
        assert_eq!(venv_name(Path::new("/work/api/.venv")), ".venv");
    }
}
