// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing canvas for the ECG page and its measurement overlay.
//!
//! This module paints the rendered page, the retained overlay lines and the
//! measurement labels, and forwards raw pointer and wheel input to the
//! canvas controller.

use crate::canvas::cursor::PointerEvent;
use crate::canvas::surface::{PageRenderer, RenderTarget, RetainedOverlay};
use crate::canvas::{CanvasController, PointerAffordance};
use crate::io::media::ImagePage;
use crate::models::annotation::Point;
use crate::models::measurement::{MeasurementId, StrokeStyle};
use crate::util::geometry::Size;

/// The controller as hosted by the desktop app.
pub type PageCanvas = CanvasController<ImagePage, RetainedOverlay>;

const LABEL_HEIGHT: f32 = 16.0;
const MARKER_COLOR: egui::Color32 = egui::Color32::from_rgb(220, 30, 30);
const REFERENCE_COLOR: egui::Color32 = egui::Color32::from_rgba_premultiplied(110, 15, 15, 110);

/// GPU copies of the latest page renders.
#[derive(Default)]
pub struct PageTextures {
    main: Option<egui::TextureHandle>,
    magnifier: Option<egui::TextureHandle>,
}

impl PageTextures {
    /// Upload any renders the page produced since the last frame.
    pub fn refresh(&mut self, ctx: &egui::Context, page: &mut ImagePage) {
        for (target, slot, name) in [
            (RenderTarget::Main, &mut self.main, "page_main"),
            (RenderTarget::Magnifier, &mut self.magnifier, "page_magnifier"),
        ] {
            if let Some(pixels) = page.take_rendered(target) {
                let size = [pixels.width() as usize, pixels.height() as usize];
                let image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
                *slot = Some(ctx.load_texture(name, image, egui::TextureOptions::LINEAR));
            }
        }
    }

    pub fn clear(&mut self) {
        self.main = None;
        self.magnifier = None;
    }
}

fn to_pos(origin: egui::Pos2, point: Point) -> egui::Pos2 {
    egui::pos2(origin.x + point.x as f32, origin.y + point.y as f32)
}

fn to_point(pos: egui::Pos2) -> Point {
    Point::new(pos.x as f64, pos.y as f64)
}

/// Display the page canvas and route input to `canvas`.
///
/// Returns the size of the canvas area, which the app needs before a
/// controller exists.
pub fn show(ui: &mut egui::Ui, canvas: &mut PageCanvas, textures: &PageTextures) -> Size {
    let available = ui.available_size();
    let (rect, response) = ui.allocate_exact_size(available, egui::Sense::click_and_drag());
    let origin = rect.min;

    let size = Size::new(rect.width() as f64, rect.height() as f64);
    if size != canvas.canvas_size() {
        if let Err(e) = canvas.resize_canvas(size) {
            log::error!("Failed to resize canvas: {}", e);
        }
    }

    // Labels sense drags only once their measurement is finalized
    let mut over_label = false;
    let labels: Vec<(MeasurementId, egui::Rect, bool)> = canvas
        .measurements()
        .iter()
        .filter_map(|m| canvas.surface().label(m.id()).map(|label| (m.id(), label)))
        .map(|(id, label)| {
            let min = to_pos(origin, Point::new(label.left, label.top));
            let label_rect =
                egui::Rect::from_min_size(min, egui::vec2(label.width.max(24.0) as f32, LABEL_HEIGHT));
            (id, label_rect, label.draggable)
        })
        .collect();
    for (id, label_rect, draggable) in &labels {
        if !draggable {
            continue;
        }
        let label_response = ui.interact(*label_rect, ui.id().with(("label", id)), egui::Sense::drag());
        if label_response.contains_pointer() {
            over_label = true;
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grab);
        }
        if label_response.drag_started() {
            if let Some(pos) = label_response.interact_pointer_pos() {
                canvas.begin_label_drag(*id, to_point(pos));
            }
        }
    }

    handle_pointer(ui, canvas, rect, response.contains_pointer(), over_label);

    if !over_label && response.contains_pointer() && canvas.affordance() == PointerAffordance::Crosshair {
        ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
    }

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, egui::Color32::from_gray(40));

    if let (Some(texture), Some(viewport)) = (&textures.main, canvas.viewport()) {
        let image_rect = egui::Rect::from_min_size(
            to_pos(origin, viewport.offset),
            egui::vec2(viewport.draw.width as f32, viewport.draw.height as f32),
        );
        painter.image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    for (line, style) in canvas.surface().lines() {
        let stroke = match style {
            StrokeStyle::Solid => egui::Stroke::new(1.5, MARKER_COLOR),
            StrokeStyle::Reference => egui::Stroke::new(1.0, REFERENCE_COLOR),
        };
        painter.line_segment([to_pos(origin, line.from), to_pos(origin, line.to)], stroke);
    }

    // Labels are drawn after the measurements they belong to, in list order
    for (id, label_rect, _) in &labels {
        if let Some(label) = canvas.surface().label(*id) {
            painter.rect_filled(*label_rect, 2.0, egui::Color32::from_white_alpha(200));
            painter.text(
                label_rect.center_top(),
                egui::Align2::CENTER_TOP,
                &label.text,
                egui::FontId::proportional(12.0),
                MARKER_COLOR,
            );
        }
    }

    show_magnifier(ui.ctx(), canvas, textures);

    size
}

fn handle_pointer(
    ui: &egui::Ui,
    canvas: &mut PageCanvas,
    rect: egui::Rect,
    hovered: bool,
    over_label: bool,
) {
    let (pressed, released, moving, latest, scroll) = ui.input(|i| {
        (
            i.pointer.primary_pressed(),
            i.pointer.primary_released(),
            i.pointer.is_moving(),
            i.pointer.latest_pos(),
            i.raw_scroll_delta.y,
        )
    });

    let Some(pos) = latest else {
        if canvas.is_dragging() {
            canvas.on_pointer_cancel();
        }
        return;
    };
    let pointer = PointerEvent::new(to_point(pos), to_point((pos - rect.min).to_pos2()));

    if pressed && hovered && !over_label {
        canvas.on_pointer_down(&pointer);
    }

    if moving && (hovered || canvas.is_dragging()) {
        if let Err(e) = canvas.on_pointer_move(&pointer) {
            log::error!("Pointer move failed: {}", e);
        }
    }

    if released && (canvas.is_dragging() || (hovered && !over_label)) {
        if let Err(e) = canvas.on_pointer_up(&pointer) {
            log::error!("Pointer release failed: {}", e);
        }
    }

    if hovered && scroll != 0.0 {
        // Wheel deltas grow downwards, egui's grow upwards
        if let Err(e) = canvas.on_wheel(-scroll as f64) {
            log::error!("Wheel input failed: {}", e);
        }
    }
}

fn show_magnifier(ctx: &egui::Context, canvas: &PageCanvas, textures: &PageTextures) {
    let (Some(layout), Some(texture)) = (canvas.magnifier().layout(), &textures.magnifier) else {
        return;
    };

    let window = egui::Rect::from_min_size(
        to_pos(egui::Pos2::ZERO, layout.window),
        egui::vec2(layout.window_size as f32, layout.window_size as f32),
    );
    let zoomed = egui::Rect::from_min_size(
        to_pos(window.min, layout.zoom_offset),
        egui::vec2(layout.zoom_size.width as f32, layout.zoom_size.height as f32),
    );

    let painter = ctx
        .layer_painter(egui::LayerId::new(egui::Order::Tooltip, egui::Id::new("magnifier")))
        .with_clip_rect(window);
    painter.rect_filled(window, 0.0, egui::Color32::WHITE);
    painter.image(
        texture.id(),
        zoomed,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        egui::Color32::WHITE,
    );
    let center = window.center();
    let guide = egui::Stroke::new(1.0, MARKER_COLOR);
    painter.line_segment([egui::pos2(center.x, window.top()), egui::pos2(center.x, window.bottom())], guide);
    painter.line_segment([egui::pos2(window.left(), center.y), egui::pos2(window.right(), center.y)], guide);
    painter.rect_stroke(window, 0.0, egui::Stroke::new(1.0, egui::Color32::from_gray(60)));
}

/// Placeholder shown while no document is open.
pub fn show_welcome(ui: &mut egui::Ui, loading: Option<&str>) {
    ui.centered_and_justified(|ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(20.0);
            if let Some(message) = loading {
                ui.spinner();
                ui.add_space(10.0);
                ui.label(egui::RichText::new(message).size(16.0).color(egui::Color32::from_gray(200)));
                return;
            }
            ui.heading(
                egui::RichText::new("ECG Calipers")
                    .size(32.0)
                    .color(egui::Color32::from_gray(200)),
            );
            ui.add_space(20.0);
            ui.label(
                egui::RichText::new("Open ECG page images to begin measuring")
                    .color(egui::Color32::from_gray(180)),
            );
            ui.add_space(10.0);
            ui.label(
                egui::RichText::new("File → Open Pages...")
                    .weak()
                    .color(egui::Color32::from_gray(130)),
            );
        });
    });
}

/// Page indicator for the status bar.
pub fn page_status(canvas: &PageCanvas, page_count: usize) -> String {
    format!(
        "Page {} / {}  |  {:.2} mm/s  |  {}°",
        canvas.page().page_number(),
        page_count,
        canvas.scroll_rate(),
        canvas.rotation()
    )
}
