// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! This module contains the main application structure that implements
//! the egui::App trait. It owns the open document, the annotation store and
//! the canvas controller of the current page, and turns menu, toolbar and
//! keyboard input into controller calls.

use crate::canvas::surface::{PageRenderer, RetainedOverlay};
use crate::canvas::{CanvasController, KeyInput};
use crate::config::Settings;
use crate::io::media::Document;
use crate::io::serialization;
use crate::io::store::{FileStore, KeyValueStore, MemoryStore};
use crate::models::project::AnnotationExport;
use crate::ui::canvas::{self, PageCanvas, PageTextures};
use crate::ui::toolbar::{self, ToolbarAction};
use crate::util::geometry::Size;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};

const LABEL_INPUT_ID: &str = "label_editor";

/// Keys handled above the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostKey {
    Canvas(KeyInput),
    PreviousPage,
    NextPage,
}

/// Map a released key to what it means here.
fn map_key(key: egui::Key, shift: bool) -> Option<HostKey> {
    let letter = |c: char| {
        Some(HostKey::Canvas(KeyInput::Char(if shift {
            c.to_ascii_uppercase()
        } else {
            c
        })))
    };
    match key {
        egui::Key::Enter => Some(HostKey::Canvas(KeyInput::Enter)),
        egui::Key::Escape => Some(HostKey::Canvas(KeyInput::Escape)),
        egui::Key::Delete => Some(HostKey::Canvas(KeyInput::Delete)),
        egui::Key::Backspace => Some(HostKey::Canvas(KeyInput::Backspace)),
        egui::Key::Space => Some(HostKey::Canvas(KeyInput::Char(' '))),
        egui::Key::D => letter('d'),
        egui::Key::I => letter('i'),
        egui::Key::A => letter('a'),
        egui::Key::Q => letter('q'),
        egui::Key::ArrowLeft => Some(HostKey::PreviousPage),
        egui::Key::ArrowRight => Some(HostKey::NextPage),
        _ => None,
    }
}

/// Main application state.
pub struct EcgApp {
    settings: Settings,

    /// Per-page annotation state, keyed by document and page
    store: Box<dyn KeyValueStore>,

    /// Currently open document
    document: Option<Document>,

    /// Controller for the page on screen
    canvas: Option<PageCanvas>,

    /// Uploaded page renders
    textures: PageTextures,

    /// Size of the canvas area in the last frame
    canvas_size: Size,

    /// Last status or error message for the status bar
    status: Option<String>,

    /// Receiver for background document loading
    document_loader: Option<Receiver<Result<Document, String>>>,

    /// Loading state message
    loading_message: Option<String>,
}

impl EcgApp {
    /// Create a new application instance.
    pub fn new(settings: Settings) -> Self {
        let store_path = settings
            .store_path
            .clone()
            .unwrap_or_else(FileStore::default_path);
        let store: Box<dyn KeyValueStore> = match FileStore::open(&store_path) {
            Ok(store) => {
                log::info!("Annotation store: {}", store.path().display());
                Box::new(store)
            }
            Err(e) => {
                log::error!(
                    "Failed to open annotation store {}: {}; annotations will not persist",
                    store_path.display(),
                    e
                );
                Box::new(MemoryStore::new())
            }
        };

        Self {
            settings,
            store,
            document: None,
            canvas: None,
            textures: PageTextures::default(),
            canvas_size: Size::default(),
            status: None,
            document_loader: None,
            loading_message: None,
        }
    }

    /// Load page images in the background.
    pub fn open_document(&mut self, paths: Vec<PathBuf>) {
        let (sender, receiver) = channel();
        self.document_loader = Some(receiver);
        self.loading_message = Some(format!("Loading {} page(s)...", paths.len()));
        let image_dpi = self.settings.image_dpi;

        // Spawn background thread for loading
        std::thread::spawn(move || {
            let result = Document::open(&paths, image_dpi).map_err(|e| format!("{:#}", e));
            let _ = sender.send(result);
        });
    }

    /// Make `document` current and show its first page.
    fn install_document(&mut self, document: Document) -> Result<()> {
        self.save_current();
        self.canvas = None;
        self.textures.clear();

        let page = document.page(1).context("document has no pages")?;
        let mut controller = CanvasController::new(
            page,
            RetainedOverlay::new(),
            self.canvas_size,
            &self.settings,
        );
        controller.load_annotations(self.store.as_ref(), document.id())?;

        log::info!(
            "Opened document {} with {} page(s)",
            document.id(),
            document.page_count()
        );
        self.status = None;
        self.canvas = Some(controller);
        self.document = Some(document);
        Ok(())
    }

    /// Persist the current page's annotations.
    fn save_current(&mut self) {
        if let (Some(canvas), Some(document)) = (&self.canvas, &self.document) {
            if let Err(e) = canvas.save_annotations(self.store.as_mut(), document.id()) {
                log::error!("Failed to save annotations: {:#}", e);
            }
        }
    }

    /// Switch to page `number`, or report and stay when it does not exist.
    fn go_to_page(&mut self, number: usize) {
        let (Some(canvas), Some(document)) = (&mut self.canvas, &self.document) else {
            return;
        };

        let Some(page) = document.page(number) else {
            let message = format!(
                "Page {} is out of range (1-{})",
                number,
                document.page_count()
            );
            log::warn!("{}", message);
            self.status = Some(message);
            return;
        };

        match canvas.switch_page(page, self.store.as_mut(), document.id()) {
            Ok(_) => {
                self.status = None;
                log::info!("Showing page {}", number);
            }
            Err(e) => {
                log::error!("Failed to switch to page {}: {:#}", number, e);
                self.status = Some(format!("Failed to switch page: {}", e));
            }
        }
    }

    fn step_page(&mut self, forward: bool) {
        let Some(current) = self.canvas.as_ref().map(|c| c.page().page_number()) else {
            return;
        };
        let target = if forward {
            current + 1
        } else {
            current.saturating_sub(1)
        };
        self.go_to_page(target);
    }

    /// Export every page's annotations of the open document.
    fn export_annotations(&mut self, path: &Path) -> Result<()> {
        self.save_current();
        let document = self.document.as_ref().context("no document is open")?;
        let export = AnnotationExport::collect(self.store.as_ref(), document.id(), document.page_count())?;
        serialization::export_by_extension(&export, path)?;
        log::info!("Exported annotations to {}", path.display());
        Ok(())
    }

    /// Import an export into the open document and reload the current page.
    fn import_annotations(&mut self, path: &Path) -> Result<()> {
        let document = self.document.as_ref().context("no document is open")?;
        let export = serialization::import_by_extension(path)?;
        let restored = export.restore(self.store.as_mut(), document.id(), document.page_count())?;
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.load_annotations(self.store.as_ref(), document.id())?;
        }
        log::info!("Imported {} page(s) from {}", restored, path.display());
        Ok(())
    }

    fn report(&mut self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            log::error!("{} failed: {:#}", what, e);
            self.status = Some(format!("{} failed: {}", what, e));
        }
    }

    fn handle_toolbar(&mut self, action: ToolbarAction) {
        if let ToolbarAction::PreviousPage | ToolbarAction::NextPage = action {
            self.step_page(action == ToolbarAction::NextPage);
            return;
        }

        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        let result = match action {
            ToolbarAction::SelectTool(kind) => canvas.select_tool(kind),
            ToolbarAction::ClearTool => canvas.on_key(KeyInput::Escape),
            ToolbarAction::Rotate(amount) => canvas.rotate(amount),
            ToolbarAction::DeleteLast => canvas.delete_last(),
            ToolbarAction::ClearAll => canvas.clear_measurements(),
            ToolbarAction::None | ToolbarAction::PreviousPage | ToolbarAction::NextPage => Ok(()),
        };
        if let Err(e) = result {
            log::error!("Toolbar action {:?} failed: {}", action, e);
        }
    }

    /// Keys act on release.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        let keys: Vec<HostKey> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed: false,
                        modifiers,
                        ..
                    } if !modifiers.command => map_key(*key, modifiers.shift),
                    _ => None,
                })
                .collect()
        });

        for key in keys {
            let editing = self.canvas.as_ref().is_some_and(|c| c.editor().has_focus());
            match key {
                HostKey::PreviousPage if !editing => self.step_page(false),
                HostKey::NextPage if !editing => self.step_page(true),
                HostKey::Canvas(input) => {
                    if let Some(canvas) = self.canvas.as_mut() {
                        if let Err(e) = canvas.on_key(input) {
                            log::error!("Key {:?} failed: {}", input, e);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn show_label_editor(&mut self, ui: &mut egui::Ui) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        let editor = canvas.editor_mut();
        if !editor.is_open() {
            editor.set_focus(false);
            return;
        }

        ui.horizontal(|ui| {
            ui.label("Label:");
            let id = egui::Id::new(LABEL_INPUT_ID);
            let mut output = egui::TextEdit::singleline(editor.text_mut())
                .id(id)
                .hint_text("Label, or $<ms> to calibrate")
                .desired_width(240.0)
                .show(ui);

            if editor.take_select_request() {
                output.response.request_focus();
                let end = egui::text::CCursor::new(editor.text().chars().count());
                output
                    .state
                    .cursor
                    .set_char_range(Some(egui::text_selection::CCursorRange::two(
                        egui::text::CCursor::new(0),
                        end,
                    )));
                output.state.store(ui.ctx(), id);
            }
            editor.set_focus(output.response.has_focus());
            ui.label(egui::RichText::new("Enter to apply, Escape to cancel").weak());
        });
    }
}

impl eframe::App for EcgApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for completed document loading
        if let Some(ref receiver) = self.document_loader {
            if let Ok(result) = receiver.try_recv() {
                self.document_loader = None;
                self.loading_message = None;

                let result = result
                    .map_err(anyhow::Error::msg)
                    .and_then(|document| self.install_document(document));
                self.report("Opening document", result);
            }
        }

        // Request repaint if still loading (to update spinner)
        if self.loading_message.is_some() {
            ctx.request_repaint();
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.save_current();
        }

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Pages...").clicked() {
                        // Open native file picker
                        if let Some(paths) = rfd::FileDialog::new()
                            .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "tiff", "tif"])
                            .pick_files()
                        {
                            self.open_document(paths);
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    let has_document = self.document.is_some();
                    if ui
                        .add_enabled(has_document, egui::Button::new("Import Annotations..."))
                        .clicked()
                    {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Annotations", &["json", "yaml", "yml"])
                            .pick_file()
                        {
                            let result = self.import_annotations(&path);
                            self.report("Import", result);
                        }
                        ui.close_menu();
                    }
                    ui.add_enabled_ui(has_document, |ui| {
                        ui.menu_button("Export Annotations", |ui| {
                            if ui.button("Export as JSON...").clicked() {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter("JSON", &["json"])
                                    .set_file_name("annotations.json")
                                    .save_file()
                                {
                                    let result = self.export_annotations(&path);
                                    self.report("Export", result);
                                }
                                ui.close_menu();
                            }
                            if ui.button("Export as YAML...").clicked() {
                                if let Some(path) = rfd::FileDialog::new()
                                    .add_filter("YAML", &["yaml", "yml"])
                                    .set_file_name("annotations.yaml")
                                    .save_file()
                                {
                                    let result = self.export_annotations(&path);
                                    self.report("Export", result);
                                }
                                ui.close_menu();
                            }
                        });
                    });
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        // Toolbar
        let tool = self.canvas.as_ref().and_then(|c| c.tool());
        let action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, tool, self.canvas.is_some()))
            .inner;
        self.handle_toolbar(action);

        // Status bar and label editor
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_label_editor(ui);
            ui.horizontal(|ui| {
                match (&self.canvas, &self.document) {
                    (Some(canvas), Some(document)) => {
                        ui.label(canvas::page_status(canvas, document.page_count()));
                    }
                    _ => {
                        ui.label("No document loaded");
                    }
                }
                if let Some(ref status) = self.status {
                    ui.separator();
                    ui.label(egui::RichText::new(status).color(egui::Color32::from_rgb(230, 120, 60)));
                }
            });
        });

        self.handle_keys(ctx);

        // Main canvas (center)
        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            self.canvas_size = Size::new(available.x as f64, available.y as f64);

            match self.canvas.as_mut() {
                Some(controller) if self.loading_message.is_none() => {
                    self.canvas_size = canvas::show(ui, controller, &self.textures);
                    self.textures.refresh(ctx, controller.page_mut());
                    if controller.magnifier().is_visible() || controller.is_dragging() {
                        ctx.request_repaint();
                    }
                }
                _ => canvas::show_welcome(ui, self.loading_message.as_deref()),
            }
        });
    }
}
