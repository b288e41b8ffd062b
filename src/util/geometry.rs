// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides the mapping between image space (the page at its
//! native, rotation-adjusted scale 1 size) and canvas space (the visible
//! drawing surface), plus the line clipping used by the QT reference line.

use crate::models::annotation::Point;
use std::fmt;

/// Width and height of a page viewport or a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not a number.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A straight segment in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub from: Point,
    pub to: Point,
}

impl Line {
    pub fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn vertical(x: f64, height: f64) -> Self {
        Self::new(Point::new(x, 0.0), Point::new(x, height))
    }

    pub fn horizontal(y: f64, width: f64) -> Self {
        Self::new(Point::new(0.0, y), Point::new(width, y))
    }
}

/// Placement of the page image inside the canvas.
///
/// The draw rectangle keeps the image aspect ratio and is centered in the
/// canvas. It is derived state: recompute it with [`Viewport::fit`] whenever
/// the canvas, the page or the rotation changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub image: Size,
    pub draw: Size,
    pub offset: Point,
}

impl Viewport {
    /// Fit `image` into `canvas`, letterboxing along the spare axis.
    ///
    /// Returns `None` when either size is empty, since no transform exists.
    pub fn fit(canvas: Size, image: Size) -> Option<Self> {
        if canvas.is_empty() || image.is_empty() {
            return None;
        }

        let image_ratio = image.aspect_ratio();
        let draw = if canvas.aspect_ratio() < image_ratio {
            // Canvas is relatively narrower - fit to width
            Size::new(canvas.width, canvas.width / image_ratio)
        } else {
            // Fit to height
            Size::new(canvas.height * image_ratio, canvas.height)
        };

        let offset = Point::new(
            (canvas.width - draw.width) / 2.0,
            (canvas.height - draw.height) / 2.0,
        );

        Some(Self { image, draw, offset })
    }

    /// Uniform scale from image units to canvas units.
    pub fn output_scale(&self) -> f64 {
        self.draw.width / self.image.width
    }

    /// Affine `[sx, 0, 0, sy, tx, ty]` for rendering the page into the draw
    /// rectangle, or `None` for the identity.
    pub fn render_transform(&self) -> Option<[f64; 6]> {
        let scale = self.output_scale();
        if scale == 1.0 && self.offset.x == 0.0 && self.offset.y == 0.0 {
            None
        } else {
            Some([scale, 0.0, 0.0, scale, self.offset.x, self.offset.y])
        }
    }

    /// Convert image coordinates to canvas coordinates.
    pub fn image_to_canvas(&self, point: Point) -> Point {
        Point::new(
            self.offset.x + point.x * self.draw.width / self.image.width,
            self.offset.y + point.y * self.draw.height / self.image.height,
        )
    }

    /// Convert canvas coordinates to image coordinates.
    ///
    /// With `relative` set the draw offset is ignored, which converts a
    /// displacement (such as a drag delta) rather than a position.
    pub fn canvas_to_image(&self, point: Point, relative: bool) -> Point {
        let offset = if relative { Point::default() } else { self.offset };
        Point::new(
            self.image.width * (point.x - offset.x) / self.draw.width,
            self.image.height * (point.y - offset.y) / self.draw.height,
        )
    }
}

/// Clip the infinite line through `through` at `angle_degrees` to `bounds`.
///
/// The line is parametrised as `through + t * (cos θ, sin θ)`; the four
/// boundary crossings are sorted and the segment between the middle two is
/// the part inside the rectangle. Axis-aligned directions span the full
/// width or height directly.
pub fn clip_line_to_bounds(through: Point, angle_degrees: f64, bounds: Size) -> Line {
    let radians = angle_degrees.to_radians();
    let dx = radians.cos();
    let dy = radians.sin();

    if dx == 0.0 {
        return Line::vertical(through.x, bounds.height);
    }
    if dy == 0.0 {
        return Line::horizontal(through.y, bounds.width);
    }

    let mut t = [
        -through.x / dx,
        (bounds.width - through.x) / dx,
        -through.y / dy,
        (bounds.height - through.y) / dy,
    ];
    t.sort_by(f64::total_cmp);

    Line::new(
        Point::new(through.x + t[1] * dx, through.y + t[1] * dy),
        Point::new(through.x + t[2] * dx, through.y + t[2] * dy),
    )
}
