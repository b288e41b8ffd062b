// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Magnifier that follows the pointer while a tool is armed.
//!
//! The page is rendered once more at a fixed high resolution. The magnifier
//! window is a small square centered on the pointer, and the high
//! resolution render is panned inside it so the point under the pointer
//! stays under the pointer.

use super::surface::{PageRenderer, RenderRequest, RenderTarget};
use crate::models::annotation::{MeasureKind, Point};
use crate::util::geometry::{Line, Size, Viewport};

/// A pointer position, both in screen space and relative to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    pub screen: Point,
    pub canvas: Point,
}

impl PointerEvent {
    pub fn new(screen: Point, canvas: Point) -> Self {
        Self { screen, canvas }
    }
}

/// Where to draw the magnifier, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnifierLayout {
    /// Top-left corner of the square window.
    pub window: Point,
    pub window_size: f64,
    /// Offset of the high resolution render relative to the window.
    pub zoom_offset: Point,
    pub zoom_size: Size,
}

#[derive(Debug, Clone)]
pub struct Magnifier {
    zoom_size: f64,
    zoom_dpi: f64,
    zoom_canvas: Size,
    visible: bool,
    layout: Option<MagnifierLayout>,
}

impl Magnifier {
    pub fn new(zoom_size: f64, zoom_dpi: f64) -> Self {
        Self {
            zoom_size,
            zoom_dpi,
            zoom_canvas: Size::default(),
            visible: false,
            layout: None,
        }
    }

    /// Re-render the page at the magnifier resolution.
    pub fn reset_viewport<P: PageRenderer>(&mut self, page: &mut P, rotation: i32) {
        let scale = self.zoom_dpi / 72.0;
        let viewport = page.viewport(scale, rotation);
        self.zoom_canvas = viewport;
        page.render(&RenderRequest {
            target: RenderTarget::Magnifier,
            viewport,
            scale,
            rotation,
            transform: None,
        });
    }

    /// Size of the high resolution render.
    pub fn zoom_canvas(&self) -> Size {
        self.zoom_canvas
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Layout of a visible magnifier, once it has been positioned.
    pub fn layout(&self) -> Option<MagnifierLayout> {
        if self.visible {
            self.layout
        } else {
            None
        }
    }

    /// Show the magnifier; ignored when no tool is armed.
    pub fn on(&mut self, tool: Option<MeasureKind>) {
        if tool.is_some() {
            self.visible = true;
        }
    }

    pub fn off(&mut self) {
        self.visible = false;
        self.layout = None;
    }

    /// Crosshair guide through the pointer: vertical for time tools,
    /// horizontal for amplitude.
    pub fn guide_line(tool: Option<MeasureKind>, at: Point, canvas: Size) -> Option<Line> {
        match tool? {
            MeasureKind::Interval | MeasureKind::Qt => Some(Line::vertical(at.x, canvas.height)),
            MeasureKind::Amplitude => Some(Line::horizontal(at.y, canvas.width)),
        }
    }

    /// Follow the pointer. Does nothing while hidden or before the page has
    /// been fitted to the canvas.
    pub fn update(&mut self, pointer: &PointerEvent, viewport: Option<&Viewport>) {
        let Some(viewport) = viewport.filter(|_| self.visible) else {
            return;
        };

        let half = self.zoom_size / 2.0;
        let relative_x = (pointer.canvas.x - viewport.offset.x) / viewport.draw.width;
        let relative_y = (pointer.canvas.y - viewport.offset.y) / viewport.draw.height;

        self.layout = Some(MagnifierLayout {
            window: Point::new(pointer.screen.x - half, pointer.screen.y - half),
            window_size: self.zoom_size,
            zoom_offset: Point::new(
                -(relative_x * self.zoom_canvas.width - half),
                -(relative_y * self.zoom_canvas.height - half),
            ),
            zoom_size: self.zoom_canvas,
        });
    }
}
