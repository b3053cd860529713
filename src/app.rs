use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::SystemTime;

use eframe::egui;

use venvcleaner::utils;
use venvcleaner::{
    CleanupCoordinator, CleanupReport, EntryCache, EntryId, EventReceiver, Phase, ScanController,
    ScanEvent,
};

/// One row of the venv list.
struct VenvRow {
    id: EntryId,
    path: PathBuf,
    name: String,
    location: String,
    size_bytes: Option<u64>,
    modified_at: Option<SystemTime>,
    selected: bool,
}

/// Overall application operation state.
#[derive(PartialEq)]
enum AppPhase {
    Idle,
    Scanning,
    Cleaning,
}

/// Confirmation dialog state.
struct ConfirmDialog {
    visible: bool,
    count: usize,
    total_bytes: u64,
}

/// Result popup shown after a cleanup.
struct Notice {
    title: &'static str,
    message: String,
    is_error: bool,
}

pub struct VenvCleanerApp {
    root: PathBuf,
    root_input: String,
    cache: Arc<EntryCache>,
    scanner: ScanController,
    events: EventReceiver,
    rows: Vec<VenvRow>,
    /// Position of each row in `rows`, by entry id.
    row_index: HashMap<EntryId, usize>,
    phase: AppPhase,
    status: String,
    scan_error: Option<String>,
    cleanup_rx: Option<mpsc::Receiver<CleanupReport>>,
    confirm_dialog: ConfirmDialog,
    notice: Option<Notice>,
    errors: Vec<String>,
}

impl VenvCleanerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, root: PathBuf) -> Self {
        let mut app = Self::idle(root);
        app.start_scan();
        app
    }

    fn idle(root: PathBuf) -> Self {
        let cache = Arc::new(EntryCache::new());
        let (scanner, events) = ScanController::new(Arc::clone(&cache));

        Self {
            root_input: root.display().to_string(),
            root,
            cache,
            scanner,
            events,
            rows: vec![],
            row_index: HashMap::new(),
            phase: AppPhase::Idle,
            status: String::new(),
            scan_error: None,
            cleanup_rx: None,
            confirm_dialog: ConfirmDialog {
                visible: false,
                count: 0,
                total_bytes: 0,
            },
            notice: None,
            errors: vec![],
        }
    }

    fn start_scan(&mut self) {
        self.rows.clear();
        self.row_index.clear();
        self.errors.clear();
        self.scan_error = None;

        match self.scanner.start(&self.root) {
            Ok(_) => {
                self.phase = AppPhase::Scanning;
                self.status = "Finding venvs...".to_string();
            }
            Err(e) => {
                self.phase = AppPhase::Idle;
                self.status.clear();
                self.scan_error = Some(format!("Cannot scan {}: {e}", self.root.display()));
            }
        }
    }

    fn change_root(&mut self) {
        let candidate = PathBuf::from(self.root_input.trim());
        match candidate.canonicalize() {
            Ok(path) if path.is_dir() => {
                self.root = path;
                self.root_input = self.root.display().to_string();
                self.start_scan();
            }
            _ => {
                self.scan_error = Some(format!(
                    "{} is not an existing directory",
                    candidate.display()
                ));
            }
        }
    }

    fn start_clean(&mut self) {
        self.confirm_dialog.visible = false;
        let ids: Vec<EntryId> = self
            .rows
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.id)
            .collect();
        if ids.is_empty() {
            return;
        }

        // Deletion must never race the scan worker.
        self.scanner.cancel_and_wait();
        // Events the cancelled worker had queued are gone; catch up from the cache.
        self.resync_rows();
        self.phase = AppPhase::Cleaning;
        self.status = format!("Cleaning up {} venv(s)...", ids.len());

        let (tx, rx) = mpsc::channel::<CleanupReport>();
        self.cleanup_rx = Some(rx);

        let coordinator = CleanupCoordinator::new(Arc::clone(&self.cache));
        std::thread::spawn(move || {
            let report = coordinator.cleanup(ids);
            let _ = tx.send(report);
        });
    }

    /// Rebuild the list from the cache, keeping each row's selection.
    fn resync_rows(&mut self) {
        let selected: HashSet<EntryId> = self
            .rows
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.id)
            .collect();

        let (entries, _) = self.cache.snapshot();
        self.rows = entries
            .into_iter()
            .map(|entry| VenvRow {
                id: entry.id,
                name: utils::venv_name(&entry.path),
                location: utils::relative_location(&self.root, &entry.path),
                size_bytes: entry.sized.then_some(entry.size_bytes),
                modified_at: entry.modified_at,
                selected: selected.contains(&entry.id),
                path: entry.path,
            })
            .collect();
        self.sort_rows();
    }

    fn sort_rows(&mut self) {
        self.rows
            .sort_by_cached_key(|r| r.path.to_string_lossy().to_lowercase());
        self.reindex();
    }

    fn reindex(&mut self) {
        self.row_index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
    }

    fn drain_messages(&mut self) {
        let mut needs_sort = false;

        for event in self.events.drain() {
            match event {
                ScanEvent::EntryDiscovered {
                    id,
                    path,
                    modified_at,
                    ..
                } => {
                    self.row_index.insert(id, self.rows.len());
                    self.rows.push(VenvRow {
                        id,
                        name: utils::venv_name(&path),
                        location: utils::relative_location(&self.root, &path),
                        path,
                        size_bytes: None,
                        modified_at,
                        selected: false,
                    });
                    needs_sort = true;
                }
                ScanEvent::SizeComputed {
                    path, size_bytes, ..
                } => {
                    let row = self
                        .cache
                        .id_of(&path)
                        .and_then(|id| self.row_index.get(&id))
                        .and_then(|&i| self.rows.get_mut(i));
                    if let Some(row) = row {
                        row.size_bytes = Some(size_bytes);
                    }
                    self.update_found_status();
                }
                ScanEvent::PhaseComplete {
                    phase: Phase::Discovering,
                    ..
                } => self.update_found_status(),
                ScanEvent::PhaseComplete {
                    phase: Phase::Sizing,
                    ..
                } => {
                    self.phase = AppPhase::Idle;
                    self.update_found_status();
                }
            }
        }

        if needs_sort {
            self.sort_rows();
        }

        let report = self.cleanup_rx.as_ref().and_then(|rx| rx.try_recv().ok());
        if let Some(report) = report {
            self.cleanup_rx = None;
            self.finish_clean(report);
        }
    }

    fn update_found_status(&mut self) {
        self.status = format!(
            "Found {} venvs. Total size: {}",
            self.rows.len(),
            utils::format_size(self.cache.total())
        );
    }

    fn finish_clean(&mut self, report: CleanupReport) {
        self.phase = AppPhase::Idle;
        let cache = &self.cache;
        self.rows.retain(|r| cache.get(r.id).is_some());
        self.reindex();

        for failure in &report.failed {
            self.errors.push(format!(
                "Failed to clean up {}: {}",
                failure.path.display(),
                failure.error
            ));
        }

        self.status = format!(
            "{} venv(s) remaining. Total size: {}",
            self.rows.len(),
            utils::format_size(self.cache.total())
        );

        self.notice = Some(if report.is_clean() {
            Notice {
                title: "Success",
                message: format!(
                    "Cleaned up {} venv(s), freeing {}.",
                    report.succeeded,
                    utils::format_size(report.freed_bytes)
                ),
                is_error: false,
            }
        } else {
            Notice {
                title: "Error",
                message: format!(
                    "Failed to clean up {} of {} venv(s). Please check the permissions and try again.",
                    report.failed.len(),
                    report.requested
                ),
                is_error: true,
            }
        });
    }

    fn show_confirm_dialog(&mut self) {
        let selected: Vec<&VenvRow> = self.rows.iter().filter(|r| r.selected).collect();
        self.confirm_dialog = ConfirmDialog {
            visible: true,
            count: selected.len(),
            total_bytes: selected.iter().filter_map(|r| r.size_bytes).sum(),
        };
    }

    fn set_all(&mut self, val: bool) {
        for row in &mut self.rows {
            row.selected = val;
        }
    }

    fn render_path_bar(&mut self, ui: &mut egui::Ui) {
        let is_busy = self.phase == AppPhase::Cleaning;

        ui.horizontal(|ui| {
            let width = ui.available_width() - 150.0;
            let response = ui.add_enabled(
                !is_busy,
                egui::TextEdit::singleline(&mut self.root_input).desired_width(width),
            );
            let submitted =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            if ui.add_enabled(!is_busy, egui::Button::new("Scan")).clicked() || submitted {
                self.change_root();
            }
            if ui
                .add_enabled(!is_busy, egui::Button::new("Refresh"))
                .clicked()
            {
                self.start_scan();
            }
        });

        if let Some(err) = &self.scan_error {
            ui.label(egui::RichText::new(err).color(egui::Color32::from_rgb(220, 100, 50)));
        }
        ui.add_space(4.0);
    }

    fn render_list(&mut self, ui: &mut egui::Ui) {
        let height = ui.available_height() - 40.0;
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .max_height(height.max(100.0))
            .show(ui, |ui| {
                egui::Grid::new("venv_list")
                    .num_columns(5)
                    .striped(true)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        ui.label("");
                        ui.label(egui::RichText::new("Name").strong());
                        ui.label(egui::RichText::new("Location").strong());
                        ui.label(egui::RichText::new("Size").strong());
                        ui.label(egui::RichText::new("Last Modified").strong());
                        ui.end_row();

                        for row in &mut self.rows {
                            ui.checkbox(&mut row.selected, "");
                            ui.label(&row.name);
                            ui.label(
                                egui::RichText::new(&row.location)
                                    .color(egui::Color32::from_rgb(160, 160, 170)),
                            );
                            let size = match row.size_bytes {
                                Some(bytes) => utils::format_size(bytes),
                                None => "...".to_string(),
                            };
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    ui.label(
                                        egui::RichText::new(size)
                                            .color(egui::Color32::from_rgb(220, 180, 50)),
                                    );
                                },
                            );
                            ui.label(utils::format_timestamp(row.modified_at));
                            ui.end_row();
                        }
                    });

                if self.rows.is_empty() && self.phase == AppPhase::Idle {
                    ui.label(
                        egui::RichText::new("No venvs found.")
                            .italics()
                            .color(egui::Color32::GRAY),
                    );
                }
            });
    }

    fn render_control_bar(&mut self, ui: &mut egui::Ui) {
        let is_busy = self.phase == AppPhase::Cleaning;

        ui.horizontal(|ui| {
            if ui.button("Select All").clicked() {
                self.set_all(true);
            }
            if ui.button("Select None").clicked() {
                self.set_all(false);
            }

            if self.phase != AppPhase::Idle {
                ui.add_space(8.0);
                ui.spinner();
            }
            ui.label(&self.status);

            let can_clean = !is_busy && self.rows.iter().any(|r| r.selected);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .add_enabled(
                        can_clean,
                        egui::Button::new(egui::RichText::new("Cleanup").color(
                            if can_clean {
                                egui::Color32::from_rgb(220, 60, 60)
                            } else {
                                egui::Color32::GRAY
                            },
                        )),
                    )
                    .clicked()
                {
                    self.show_confirm_dialog();
                }
            });
        });
    }

    fn render_confirm_dialog(&mut self, ctx: &egui::Context) {
        let mut should_clean = false;
        let mut should_cancel = false;

        // Dark overlay behind the dialog to block background interaction
        egui::Area::new(egui::Id::new("confirm_overlay"))
            .fixed_pos(egui::Pos2::ZERO)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let screen = ui.ctx().screen_rect();
                ui.allocate_rect(screen, egui::Sense::click());
                ui.painter()
                    .rect_filled(screen, 0.0, egui::Color32::from_black_alpha(160));
            });

        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .fixed_size([360.0, 0.0])
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                ui.label(format!(
                    "Are you sure you want to clean up {} venv(s)?",
                    self.confirm_dialog.count
                ));
                ui.add_space(4.0);
                ui.label(
                    egui::RichText::new(format!(
                        "{} will be freed",
                        utils::format_size(self.confirm_dialog.total_bytes)
                    ))
                    .strong()
                    .color(egui::Color32::from_rgb(80, 200, 80)),
                );
                ui.label(
                    egui::RichText::new("This action cannot be undone.")
                        .small()
                        .color(egui::Color32::from_rgb(200, 100, 100)),
                );
                ui.add_space(12.0);

                ui.columns(2, |cols| {
                    cols[0].vertical_centered(|ui| {
                        if ui.add_sized([140.0, 32.0], egui::Button::new("Cancel")).clicked() {
                            should_cancel = true;
                        }
                    });
                    cols[1].vertical_centered(|ui| {
                        if ui
                            .add_sized(
                                [140.0, 32.0],
                                egui::Button::new(
                                    egui::RichText::new("Cleanup")
                                        .strong()
                                        .color(egui::Color32::WHITE),
                                )
                                .fill(egui::Color32::from_rgb(200, 50, 50)),
                            )
                            .clicked()
                        {
                            should_clean = true;
                        }
                    });
                });
                ui.add_space(8.0);
            });

        if should_cancel {
            self.confirm_dialog.visible = false;
        }
        if should_clean {
            self.start_clean();
        }
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(notice) = &self.notice else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new(notice.title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                let color = if notice.is_error {
                    egui::Color32::from_rgb(220, 100, 50)
                } else {
                    egui::Color32::from_rgb(80, 200, 80)
                };
                ui.label(egui::RichText::new(&notice.message).color(color));
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            });

        if dismissed {
            self.notice = None;
        }
    }

    fn render_errors(&self, ui: &mut egui::Ui) {
        if !self.errors.is_empty() {
            ui.add_space(4.0);
            egui::CollapsingHeader::new(
                egui::RichText::new(format!("Warnings ({})", self.errors.len()))
                    .color(egui::Color32::from_rgb(220, 150, 50)),
            )
            .default_open(false)
            .show(ui, |ui| {
                for err in &self.errors {
                    ui.label(egui::RichText::new(err).color(egui::Color32::from_rgb(220, 100, 50)));
                }
            });
        }
    }
}

impl eframe::App for VenvCleanerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        if self.phase != AppPhase::Idle {
            ctx.request_repaint();
        }

        if self.confirm_dialog.visible {
            self.render_confirm_dialog(ctx);
        }
        self.render_notice(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_path_bar(ui);
            ui.separator();
            self.render_list(ui);
            ui.separator();
            self.render_control_bar(ui);
            self.render_errors(ui);
        });
    }
}
