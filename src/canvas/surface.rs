// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Ports between the canvas controller and its host.
//!
//! The controller never looks up display resources itself. It is handed a
//! [`PageRenderer`] for the document page and an [`OverlaySurface`] for the
//! measurement lines and labels, so all of its logic runs headless.

use crate::models::measurement::{LabelBox, MeasurementId, StrokeStyle};
use crate::util::geometry::{Line, Size};
use std::collections::HashMap;

/// Which render buffer a page render is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The on-screen page under the overlay.
    Main,
    /// The high resolution buffer shown in the magnifier.
    Magnifier,
}

/// One page render as requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub target: RenderTarget,
    /// Size of the page at `scale` and `rotation`, in points.
    pub viewport: Size,
    pub scale: f64,
    pub rotation: i32,
    /// `[sx, 0, 0, sy, tx, ty]` into the target surface; `None` is identity.
    pub transform: Option<[f64; 6]>,
}

/// A document page that can be measured and rendered.
pub trait PageRenderer {
    /// 1-based page number within its document.
    fn page_number(&self) -> usize;

    /// Page size at the given scale and rotation (degrees, multiple of 90).
    fn viewport(&self, scale: f64, rotation: i32) -> Size;

    fn render(&mut self, request: &RenderRequest);
}

/// Drawing surface for measurement lines plus a container of text labels.
pub trait OverlaySurface {
    /// Erase all lines and set the surface size.
    fn clear(&mut self, size: Size);

    fn stroke(&mut self, line: Line, style: StrokeStyle);

    /// Create or move the label of measurement `id`.
    fn show_label(&mut self, id: MeasurementId, label: LabelBox);

    fn remove_label(&mut self, id: MeasurementId);
}

/// Overlay that keeps the last drawn frame, for hosts that repaint every
/// frame and for tests.
#[derive(Debug, Default)]
pub struct RetainedOverlay {
    size: Size,
    lines: Vec<(Line, StrokeStyle)>,
    labels: HashMap<MeasurementId, LabelBox>,
}

impl RetainedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn lines(&self) -> &[(Line, StrokeStyle)] {
        &self.lines
    }

    pub fn label(&self, id: MeasurementId) -> Option<&LabelBox> {
        self.labels.get(&id)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

impl OverlaySurface for RetainedOverlay {
    fn clear(&mut self, size: Size) {
        self.size = size;
        self.lines.clear();
    }

    fn stroke(&mut self, line: Line, style: StrokeStyle) {
        self.lines.push((line, style));
    }

    fn show_label(&mut self, id: MeasurementId, label: LabelBox) {
        self.labels.insert(id, label);
    }

    fn remove_label(&mut self, id: MeasurementId) {
        self.labels.remove(&id);
    }
}
