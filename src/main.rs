mod app;
mod cli;
mod output;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use venvcleaner::utils;
use venvcleaner::{EntryCache, Phase, ScanController, ScanEvent, ScanState};

fn init_logging() {
    let default_level = if std::env::var_os("DEBUG").is_some() {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Scan `root` once and print every venv found.
fn run_list(root: &Path) -> ExitCode {
    let cache = Arc::new(EntryCache::new());
    let (mut scanner, events) = ScanController::new(Arc::clone(&cache));

    output::print_banner(&utils::display_path(root));
    if let Err(e) = scanner.start(root) {
        output::print_error(&e.to_string());
        return ExitCode::FAILURE;
    }

    while scanner.is_running() {
        if let Some(ScanEvent::PhaseComplete {
            phase: Phase::Sizing,
            ..
        }) = events.recv_timeout(Duration::from_millis(200))
        {
            break;
        }
    }
    if scanner.state() == ScanState::Failed {
        output::print_error("scan stopped unexpectedly");
        return ExitCode::FAILURE;
    }

    let (mut entries, total) = cache.snapshot();
    entries.sort_by_cached_key(|e| e.path.to_string_lossy().to_lowercase());
    for entry in &entries {
        let size = if entry.sized {
            utils::format_size(entry.size_bytes)
        } else {
            "...".to_string()
        };
        output::print_venv(
            &utils::display_path(&entry.path),
            &size,
            &utils::format_timestamp(entry.modified_at),
        );
    }
    output::print_separator();
    output::print_summary(entries.len(), &utils::format_size(total));
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_logging();

    if cli.list {
        return run_list(&cli.dir_path);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("venv cleaner v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([500.0, 400.0]),
        ..Default::default()
    };

    let root = cli.dir_path;
    let result = eframe::run_native(
        "venvcleaner",
        options,
        Box::new(move |cc| Ok(Box::new(app::VenvCleanerApp::new(cc, root)))),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
