// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! A single measurement marker.
//!
//! Geometry is kept in image space so it survives canvas resizes and page
//! rotation; everything on screen (lines, label box, duration text) is
//! derived from the stored fields on demand.

use super::annotation::{MeasureKind, MeasurementRecord, Point};
use crate::error::RecordError;
use crate::util::geometry::{clip_line_to_bounds, Line, Size, Viewport};

/// Identifier of a measurement within one canvas controller.
pub type MeasurementId = u64;

pub const MIN_ANGLE: f64 = 5.0;
pub const MAX_ANGLE: f64 = 175.0;

/// Page rendering unit: 72 points per inch.
const POINTS_PER_INCH: f64 = 72.0;
const MM_PER_INCH: f64 = 25.4;

/// Convert a horizontal image-space distance to milliseconds at the given
/// paper speed (mm/s).
pub fn duration_ms(dx: f64, scroll_rate: f64) -> f64 {
    1000.0 * MM_PER_INCH * dx.abs() / (POINTS_PER_INCH * scroll_rate)
}

/// Stroke used for an overlay line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeStyle {
    /// Marker and guide lines.
    Solid,
    /// Faint QT reference line.
    Reference,
}

/// On-screen label of a measurement, in canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub text: String,
    /// Finalized measurements can be repositioned by dragging the label.
    pub draggable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    id: MeasurementId,
    kind: MeasureKind,
    start: Point,
    end: Point,
    angle: f64,
    label: String,
    finalized: bool,
}

impl Measurement {
    /// Start a measurement with both endpoints at `at`.
    pub fn place(id: MeasurementId, kind: MeasureKind, at: Point, angle: f64) -> Self {
        Self {
            id,
            kind,
            start: at,
            end: at,
            angle,
            label: String::new(),
            finalized: false,
        }
    }

    /// Rebuild a finalized measurement from its stored record. The reference
    /// angle is clamped into [5, 175] degrees.
    pub fn from_record(id: MeasurementId, record: &MeasurementRecord) -> Result<Self, RecordError> {
        if !record.start.is_finite() {
            return Err(RecordError::NonFinite("start"));
        }
        if !record.end.is_finite() {
            return Err(RecordError::NonFinite("end"));
        }
        if !record.angle.is_finite() {
            return Err(RecordError::NonFinite("angle"));
        }

        let mut measurement = Self::place(
            id,
            record.kind,
            record.start,
            record.angle.clamp(MIN_ANGLE, MAX_ANGLE),
        );
        measurement.end = record.end;
        measurement.label = record.label.clone();
        measurement.finalize();
        Ok(measurement)
    }

    pub fn to_record(&self, scroll_rate: f64) -> MeasurementRecord {
        MeasurementRecord {
            kind: self.kind,
            start: self.start,
            end: self.end,
            angle: self.angle,
            label: self.label.clone(),
            duration: Some(self.duration(scroll_rate)),
        }
    }

    pub fn id(&self) -> MeasurementId {
        self.id
    }

    pub fn kind(&self) -> MeasureKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: MeasureKind) {
        self.kind = kind;
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Move the end point while placing. The end never passes left of the
    /// start.
    pub fn update_end(&mut self, at: Point) {
        self.end = Point::new(at.x.max(self.start.x), at.y);
    }

    /// Rotate the QT reference line, clamped to [5, 175] degrees.
    pub fn adjust_angle(&mut self, delta: f64) {
        self.angle = (self.angle + delta).clamp(MIN_ANGLE, MAX_ANGLE);
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Set both endpoints at once (translation during a reposition drag).
    pub fn set_endpoints(&mut self, start: Point, end: Point) {
        self.start = start;
        self.end = end;
    }

    pub fn duration(&self, scroll_rate: f64) -> f64 {
        duration_ms(self.end.x - self.start.x, scroll_rate)
    }

    /// Label text: `"<label>: <ms>"`, or just the rounded duration.
    pub fn label_text(&self, scroll_rate: f64) -> String {
        let ms = self.duration(scroll_rate).round();
        if self.label.is_empty() {
            format!("{}", ms)
        } else {
            format!("{}: {}", self.label, ms)
        }
    }

    pub fn label_box(&self, viewport: &Viewport, scroll_rate: f64) -> LabelBox {
        let start = viewport.image_to_canvas(self.start);
        let end = viewport.image_to_canvas(self.end);
        LabelBox {
            left: start.x.min(end.x),
            top: end.y,
            width: ((end.x - start.x).abs() - 1.0).max(0.0),
            text: self.label_text(scroll_rate),
            draggable: self.finalized,
        }
    }

    /// Overlay lines for this marker on a canvas of the given size.
    pub fn segments(&self, viewport: &Viewport, canvas: Size) -> Vec<(Line, StrokeStyle)> {
        let start = viewport.image_to_canvas(self.start);
        let end = viewport.image_to_canvas(self.end);

        match self.kind {
            MeasureKind::Interval => vec![
                (Line::vertical(start.x, canvas.height), StrokeStyle::Solid),
                (Line::vertical(end.x, canvas.height), StrokeStyle::Solid),
                (
                    Line::new(Point::new(start.x, end.y), end),
                    StrokeStyle::Solid,
                ),
            ],
            MeasureKind::Amplitude => vec![
                (Line::horizontal(start.y, canvas.width), StrokeStyle::Solid),
                (Line::horizontal(end.y, canvas.width), StrokeStyle::Solid),
                (
                    Line::new(Point::new(end.x, start.y), end),
                    StrokeStyle::Solid,
                ),
            ],
            MeasureKind::Qt => vec![
                (Line::horizontal(end.y, canvas.width), StrokeStyle::Solid),
                (Line::vertical(start.x, canvas.height), StrokeStyle::Solid),
                (
                    clip_line_to_bounds(end, self.angle, canvas),
                    StrokeStyle::Reference,
                ),
            ],
        }
    }
}
