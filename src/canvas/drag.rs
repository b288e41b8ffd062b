// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Reposition drag of a finalized measurement.
//!
//! A session captures the pointer position and the measurement's endpoints
//! when the drag starts. Every move translates both endpoints from those
//! captured values.

use crate::models::annotation::Point;
use crate::models::measurement::{Measurement, MeasurementId};

#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    target: MeasurementId,
    pointer_origin: Point,
    initial_start: Point,
    initial_end: Point,
}

impl DragSession {
    pub fn begin(measurement: &Measurement, pointer: Point) -> Self {
        Self {
            target: measurement.id(),
            pointer_origin: pointer,
            initial_start: measurement.start(),
            initial_end: measurement.end(),
        }
    }

    pub fn target(&self) -> MeasurementId {
        self.target
    }

    /// Screen-space displacement of `pointer` since the drag started.
    pub fn screen_delta(&self, pointer: Point) -> Point {
        pointer - self.pointer_origin
    }

    /// Translate `measurement` by an image-space delta from its captured
    /// endpoints.
    pub fn on_move(&self, measurement: &mut Measurement, image_delta: Point) {
        measurement.set_endpoints(self.initial_start + image_delta, self.initial_end + image_delta);
    }

    /// Finish the drag.
    pub fn end(self) -> MeasurementId {
        self.target
    }
}
