use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "venvcleaner",
    about = "Find Python virtual environments and clean up the ones you no longer need",
    version
)]
pub struct Cli {
    /// Directory to search for virtual environments
    #[arg(default_value = ".", value_parser = existing_dir)]
    pub dir_path: PathBuf,

    /// Print the environments found and exit instead of opening a window
    #[arg(long)]
    pub list: bool,
}

/// Resolve `s` to an absolute path of an existing directory.
fn existing_dir(s: &str) -> Result<PathBuf, String> {
    let path = std::fs::canonicalize(s).map_err(|e| format!("'{s}': {e}"))?;
    if !path.is_dir() {
        return Err(format!("'{s}' is not a directory"));
    }
    Ok(path)
}
