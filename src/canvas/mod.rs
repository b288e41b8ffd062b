// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Canvas controller: measurement collection, tool state and input routing.
//!
//! The controller owns the ordered measurement list (last = front), the
//! active tool, the page rotation and scroll rate, and the viewport derived
//! from them. Hosts feed it pointer, wheel and key events with canvas
//! coordinates and it redraws through the injected [`OverlaySurface`].
//!
//! State machine:
//! - idle: no tool selected
//! - armed: tool selected, click to start a measurement
//! - placing: one measurement follows the pointer until the next click
//!
//! The label editor is an orthogonal overlay on top of those states.

pub mod cursor;
pub mod drag;
pub mod label_editor;
pub mod surface;

use crate::config::Settings;
use crate::error::CanvasError;
use crate::io::store::{page_key, KeyValueStore};
use crate::models::annotation::{parse_records, AnnotationRecord, MeasureKind, PageState, Point};
use crate::models::measurement::{Measurement, MeasurementId, StrokeStyle};
use crate::util::geometry::{Size, Viewport};
use anyhow::Result;
use cursor::{Magnifier, PointerEvent};
use drag::DragSession;
use label_editor::{EditorCommit, LabelEditor};
use surface::{OverlaySurface, PageRenderer, RenderRequest, RenderTarget};

/// Keys the canvas reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Enter,
    Escape,
    Delete,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasState {
    Idle,
    Armed(MeasureKind),
    Placing(MeasureKind),
}

/// Pointer shape the host should show over the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAffordance {
    Default,
    Crosshair,
}

pub struct CanvasController<P: PageRenderer, S: OverlaySurface> {
    page: P,
    surface: S,
    canvas: Size,
    page_size: Size,
    viewport: Option<Viewport>,
    measurements: Vec<Measurement>,
    next_id: MeasurementId,
    tool: Option<MeasureKind>,
    placing: Option<MeasurementId>,
    drag: Option<DragSession>,
    magnifier: Magnifier,
    editor: LabelEditor,
    scroll_rate: f64,
    rotation: i32,
    default_scroll_rate: f64,
    default_angle: f64,
}

impl<P: PageRenderer, S: OverlaySurface> CanvasController<P, S> {
    /// Create a controller for `page` on a canvas of `canvas` size and
    /// render the page into it.
    pub fn new(page: P, surface: S, canvas: Size, settings: &Settings) -> Self {
        let mut controller = Self {
            page,
            surface,
            canvas,
            page_size: Size::default(),
            viewport: None,
            measurements: Vec::new(),
            next_id: 1,
            tool: None,
            placing: None,
            drag: None,
            magnifier: Magnifier::new(settings.zoom_size, settings.zoom_dpi),
            editor: LabelEditor::new(),
            scroll_rate: settings.default_scroll_rate,
            rotation: 0,
            default_scroll_rate: settings.default_scroll_rate,
            default_angle: settings.default_angle,
        };
        controller.page_size = controller.page.viewport(1.0, controller.rotation);
        controller.fit();
        controller.magnifier.reset_viewport(&mut controller.page, controller.rotation);
        controller.surface.clear(canvas);
        controller
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn last_measurement(&self) -> Option<&Measurement> {
        self.measurements.last()
    }

    pub fn scroll_rate(&self) -> f64 {
        self.scroll_rate
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn tool(&self) -> Option<MeasureKind> {
        self.tool
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn magnifier(&self) -> &Magnifier {
        &self.magnifier
    }

    pub fn editor(&self) -> &LabelEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut LabelEditor {
        &mut self.editor
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn state(&self) -> CanvasState {
        if let Some(measurement) = self.placing_measurement() {
            return CanvasState::Placing(measurement.kind());
        }
        match self.tool {
            None => CanvasState::Idle,
            Some(kind) => CanvasState::Armed(kind),
        }
    }

    pub fn affordance(&self) -> PointerAffordance {
        if self.tool.is_some() || self.placing.is_some() {
            PointerAffordance::Crosshair
        } else {
            PointerAffordance::Default
        }
    }

    fn established(&self) -> Result<&Viewport, CanvasError> {
        self.viewport.as_ref().ok_or(CanvasError::ViewportNotEstablished {
            canvas: self.canvas,
            page: self.page_size,
        })
    }

    pub fn image_to_canvas(&self, point: Point) -> Result<Point, CanvasError> {
        Ok(self.established()?.image_to_canvas(point))
    }

    pub fn canvas_to_image(&self, point: Point, relative: bool) -> Result<Point, CanvasError> {
        Ok(self.established()?.canvas_to_image(point, relative))
    }

    /// Fit the page into the canvas and render it there.
    fn fit(&mut self) {
        self.viewport = Viewport::fit(self.canvas, self.page_size);
        match self.viewport {
            Some(viewport) => self.page.render(&RenderRequest {
                target: RenderTarget::Main,
                viewport: self.page_size,
                scale: 1.0,
                rotation: self.rotation,
                transform: viewport.render_transform(),
            }),
            None => log::debug!(
                "No viewport for canvas {} and page {}",
                self.canvas,
                self.page_size
            ),
        }
    }

    /// Window resize: refit the page and move every marker and label.
    pub fn resize_canvas(&mut self, canvas: Size) -> Result<(), CanvasError> {
        self.canvas = canvas;
        self.fit();
        self.draw()?;
        self.update_labels()
    }

    /// Re-derive the page size for the current rotation, re-render both the
    /// page and the magnifier, and reposition everything.
    pub fn reset_viewport(&mut self) -> Result<(), CanvasError> {
        self.page_size = self.page.viewport(1.0, self.rotation);
        self.fit();
        self.magnifier.reset_viewport(&mut self.page, self.rotation);
        if self.page_size.is_empty() {
            return Err(CanvasError::EmptyPage(self.page_size));
        }
        self.draw()?;
        self.update_labels()
    }

    /// Rotate by `amount` degrees. Image-space geometry is left as is.
    pub fn rotate(&mut self, amount: i32) -> Result<(), CanvasError> {
        self.rotation = (self.rotation + amount) % 360;
        log::debug!("Rotation is now {}", self.rotation);
        self.reset_viewport()
    }

    /// Redraw every measurement's lines.
    pub fn draw(&mut self) -> Result<(), CanvasError> {
        self.surface.clear(self.canvas);
        if self.measurements.is_empty() {
            return Ok(());
        }
        let viewport = *self.established()?;
        for measurement in &self.measurements {
            for (line, style) in measurement.segments(&viewport, self.canvas) {
                self.surface.stroke(line, style);
            }
        }
        Ok(())
    }

    /// Reposition and re-text every label, e.g. after a scroll rate change.
    pub fn update_labels(&mut self) -> Result<(), CanvasError> {
        if self.measurements.is_empty() {
            return Ok(());
        }
        let viewport = *self.established()?;
        for measurement in &self.measurements {
            self.surface
                .show_label(measurement.id(), measurement.label_box(&viewport, self.scroll_rate));
        }
        Ok(())
    }

    fn update_label(&mut self, id: MeasurementId) -> Result<(), CanvasError> {
        let viewport = *self.established()?;
        if let Some(measurement) = self.measurements.iter().find(|m| m.id() == id) {
            self.surface
                .show_label(id, measurement.label_box(&viewport, self.scroll_rate));
        }
        Ok(())
    }

    fn placing_measurement(&self) -> Option<&Measurement> {
        let id = self.placing?;
        self.measurements.iter().find(|m| m.id() == id)
    }

    fn placing_measurement_mut(&mut self) -> Option<&mut Measurement> {
        let id = self.placing?;
        self.measurements.iter_mut().find(|m| m.id() == id)
    }

    pub fn on_pointer_down(&mut self, pointer: &PointerEvent) {
        self.magnifier.on(self.tool);
        self.magnifier.update(pointer, self.viewport.as_ref());
    }

    pub fn on_pointer_move(&mut self, pointer: &PointerEvent) -> Result<(), CanvasError> {
        if self.drag.is_some() {
            return self.drag_to(pointer.screen);
        }

        if self.placing.is_some() {
            let at = self.canvas_to_image(pointer.canvas, false)?;
            if let Some(measurement) = self.placing_measurement_mut() {
                measurement.update_end(at);
                let id = measurement.id();
                self.update_label(id)?;
            }
            self.draw()?;
        } else if self.tool.is_some() {
            self.draw()?;
            if let Some(guide) = Magnifier::guide_line(self.tool, pointer.canvas, self.canvas) {
                self.surface.stroke(guide, StrokeStyle::Solid);
            }
        }

        self.magnifier.update(pointer, self.viewport.as_ref());
        Ok(())
    }

    pub fn on_pointer_up(&mut self, pointer: &PointerEvent) -> Result<(), CanvasError> {
        if let Some(session) = self.drag.take() {
            log::debug!("Finished moving measurement {}", session.end());
            return Ok(());
        }

        let result = self.toggle_measure(pointer);
        self.magnifier.off();
        result
    }

    /// Pointer capture lost: end any drag and hide the magnifier.
    pub fn on_pointer_cancel(&mut self) {
        if let Some(session) = self.drag.take() {
            log::debug!("Drag of measurement {} cancelled", session.end());
        }
        self.magnifier.off();
    }

    /// A click either starts a measurement (armed) or finishes the one being
    /// placed and opens the label editor on it.
    fn toggle_measure(&mut self, pointer: &PointerEvent) -> Result<(), CanvasError> {
        if self.placing.is_some() {
            let at = self.canvas_to_image(pointer.canvas, false)?;
            if let Some(measurement) = self.placing_measurement_mut() {
                measurement.update_end(at);
                measurement.finalize();
                let id = measurement.id();
                self.update_label(id)?;
            }
            self.placing = None;
            self.editor.reset_off();
            self.toggle_editor()?;
        } else if let Some(kind) = self.tool {
            let at = self.canvas_to_image(pointer.canvas, false)?;
            let id = self.allocate_id();
            self.measurements
                .push(Measurement::place(id, kind, at, self.default_angle));
            self.placing = Some(id);
            self.update_label(id)?;
        }
        self.draw()
    }

    /// Wheel while placing turns the reference angle. Returns whether the
    /// host should suppress its default scrolling.
    pub fn on_wheel(&mut self, delta_y: f64) -> Result<bool, CanvasError> {
        let Some(measurement) = self.placing_measurement_mut() else {
            return Ok(false);
        };
        measurement.adjust_angle(delta_y);
        self.draw()?;
        Ok(true)
    }

    /// Start repositioning a finalized measurement from its label. The
    /// measurement is brought to the front. Refused while a measurement is
    /// being placed.
    pub fn begin_label_drag(&mut self, id: MeasurementId, screen: Point) -> bool {
        if self.placing.is_some() {
            return false;
        }
        let Some(index) = self
            .measurements
            .iter()
            .position(|m| m.id() == id && m.is_finalized())
        else {
            return false;
        };

        let measurement = self.measurements.remove(index);
        self.drag = Some(DragSession::begin(&measurement, screen));
        self.measurements.push(measurement);
        true
    }

    fn drag_to(&mut self, screen: Point) -> Result<(), CanvasError> {
        let Some(session) = self.drag.as_ref() else {
            return Ok(());
        };
        let delta = self.canvas_to_image(session.screen_delta(screen), true)?;
        let id = session.target();
        if let Some(measurement) = self.measurements.iter_mut().find(|m| m.id() == id) {
            session.on_move(measurement, delta);
        }
        self.draw()?;
        self.update_label(id)
    }

    pub fn on_key(&mut self, key: KeyInput) -> Result<(), CanvasError> {
        match key {
            KeyInput::Enter => return self.toggle_editor(),
            KeyInput::Escape => {
                log::debug!("Tool cleared");
                self.tool = None;
                self.magnifier.off();
                self.editor.reset_off();
                return self.draw();
            }
            _ => {}
        }

        if self.editor.has_focus() {
            return Ok(());
        }

        match key {
            KeyInput::Delete | KeyInput::Backspace | KeyInput::Char('d' | 'D') => {
                log::debug!("Removed last measurement");
                self.delete_last()
            }
            KeyInput::Char('i' | 'I' | ' ') => self.select_tool(MeasureKind::Interval),
            KeyInput::Char('a' | 'A') => self.select_tool(MeasureKind::Amplitude),
            KeyInput::Char('q' | 'Q') => self.select_tool(MeasureKind::Qt),
            _ => Ok(()),
        }
    }

    /// Arm `kind`. A measurement being placed changes kind too.
    pub fn select_tool(&mut self, kind: MeasureKind) -> Result<(), CanvasError> {
        log::debug!("{:?} measurement", kind);
        self.tool = Some(kind);
        if let Some(measurement) = self.placing_measurement_mut() {
            measurement.set_kind(kind);
        }
        self.draw()
    }

    /// Remove the most recent measurement and its label.
    pub fn delete_last(&mut self) -> Result<(), CanvasError> {
        if let Some(removed) = self.measurements.pop() {
            self.surface.remove_label(removed.id());
            if self.placing == Some(removed.id()) {
                self.placing = None;
            }
            if self.drag.as_ref().is_some_and(|d| d.target() == removed.id()) {
                self.drag = None;
            }
        }
        self.draw()
    }

    pub fn clear_measurements(&mut self) -> Result<(), CanvasError> {
        for measurement in self.measurements.drain(..) {
            self.surface.remove_label(measurement.id());
        }
        self.placing = None;
        self.drag = None;
        self.draw()
    }

    /// Enter: commit the open editor, or open it on the last measurement.
    pub fn toggle_editor(&mut self) -> Result<(), CanvasError> {
        if self.editor.is_open() {
            match self.editor.commit() {
                Some(commit) => self.apply_commit(commit),
                None => Ok(()),
            }
        } else {
            if let Some(last) = self.measurements.last() {
                self.editor.open(last.id(), last.label());
            }
            Ok(())
        }
    }

    fn apply_commit(&mut self, commit: EditorCommit) -> Result<(), CanvasError> {
        match commit {
            EditorCommit::Label { target, text } => {
                match self.measurements.iter_mut().find(|m| m.id() == target) {
                    Some(measurement) => measurement.set_label(text),
                    None => {
                        log::warn!("Measurement {} no longer exists, label dropped", target);
                        return Ok(());
                    }
                }
                self.update_label(target)
            }
            EditorCommit::Calibrate {
                target,
                true_duration_ms,
            } => {
                let Some(measurement) = self.measurements.iter().find(|m| m.id() == target) else {
                    log::warn!("Measurement {} no longer exists, calibration dropped", target);
                    return Ok(());
                };
                let measured = measurement.duration(self.scroll_rate);
                self.calibrate(measured, true_duration_ms as f64)
            }
        }
    }

    /// Correct the scroll rate so a measurement currently reading
    /// `measured_ms` reads `true_ms`. Every label follows.
    fn calibrate(&mut self, measured_ms: f64, true_ms: f64) -> Result<(), CanvasError> {
        let corrected = self.scroll_rate * measured_ms / true_ms;
        if !(corrected.is_finite() && corrected > 0.0) {
            log::warn!(
                "Cannot calibrate a {} ms measurement to {} ms",
                measured_ms,
                true_ms
            );
            return Ok(());
        }
        self.scroll_rate = corrected;
        log::info!("Corrected scroll rate to {} mm/s", self.scroll_rate);
        self.update_labels()
    }

    fn allocate_id(&mut self) -> MeasurementId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn page_state(&self) -> PageState {
        PageState {
            measurements: self
                .measurements
                .iter()
                .map(|m| m.to_record(self.scroll_rate))
                .collect(),
            scroll_rate: self.scroll_rate,
            rotation: self.rotation,
        }
    }

    /// Measurement records in list order followed by the scroll rate and
    /// rotation records.
    pub fn annotations(&self) -> Vec<AnnotationRecord> {
        self.page_state().to_records()
    }

    /// Replace all state with `records`. The scroll rate restarts from the
    /// default; records that cannot be rebuilt are logged and skipped.
    pub fn set_annotations(&mut self, records: Vec<AnnotationRecord>) -> Result<(), CanvasError> {
        self.clear_measurements()?;

        let state = PageState::from_records(records, self.default_scroll_rate, self.rotation);
        self.scroll_rate = state.scroll_rate;
        self.rotation = state.rotation;

        for record in &state.measurements {
            let id = self.allocate_id();
            match Measurement::from_record(id, record) {
                Ok(measurement) => self.measurements.push(measurement),
                Err(e) => log::error!("Could not add an annotation: {}", e),
            }
        }

        self.reset_viewport()
    }

    /// Persist this page's annotations under `<document_id>-<page>`.
    pub fn save_annotations(&self, store: &mut dyn KeyValueStore, document_id: &str) -> Result<()> {
        let key = page_key(document_id, self.page.page_number());
        let json = serde_json::to_string(&self.annotations())?;
        store.set(&key, json)?;
        log::info!("Saved {} measurements to {}", self.measurements.len(), key);
        Ok(())
    }

    /// Load this page's annotations. A page never saved starts empty and
    /// keeps the current scroll rate and rotation.
    pub fn load_annotations(&mut self, store: &dyn KeyValueStore, document_id: &str) -> Result<()> {
        let key = page_key(document_id, self.page.page_number());
        match store.get(&key)? {
            Some(data) => match parse_records(&data) {
                Ok(records) => {
                    self.set_annotations(records)?;
                    log::info!("Loaded {} measurements from {}", self.measurements.len(), key);
                }
                Err(e) => log::error!("Stored annotations for {} are unreadable: {}", key, e),
            },
            None => {
                self.clear_measurements()?;
                self.reset_viewport()?;
            }
        }
        Ok(())
    }

    /// Save the current page, switch to `page` and load its annotations.
    /// Returns the previous page.
    pub fn switch_page(
        &mut self,
        page: P,
        store: &mut dyn KeyValueStore,
        document_id: &str,
    ) -> Result<P> {
        self.save_annotations(store, document_id)?;
        self.editor.reset_off();
        let previous = std::mem::replace(&mut self.page, page);
        self.load_annotations(store, document_id)?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::surface::RetainedOverlay;
    use super::*;
    use crate::io::store::MemoryStore;
    use crate::models::measurement::duration_ms;
    use proptest::prelude::*;

    /// Page stand-in that records every render request.
    struct FakePage {
        number: usize,
        size: Size,
        renders: Vec<RenderRequest>,
    }

    impl FakePage {
        fn new(number: usize, width: f64, height: f64) -> Self {
            Self {
                number,
                size: Size::new(width, height),
                renders: Vec::new(),
            }
        }
    }

    impl PageRenderer for FakePage {
        fn page_number(&self) -> usize {
            self.number
        }

        fn viewport(&self, scale: f64, rotation: i32) -> Size {
            let size = Size::new(self.size.width * scale, self.size.height * scale);
            if rotation.rem_euclid(180) == 90 {
                Size::new(size.height, size.width)
            } else {
                size
            }
        }

        fn render(&mut self, request: &RenderRequest) {
            self.renders.push(request.clone());
        }
    }

    type Controller = CanvasController<FakePage, RetainedOverlay>;

    /// Canvas the same size as the page, so canvas and image coordinates match.
    fn controller() -> Controller {
        CanvasController::new(
            FakePage::new(1, 612.0, 792.0),
            RetainedOverlay::new(),
            Size::new(612.0, 792.0),
            &Settings::default(),
        )
    }

    fn at(x: f64, y: f64) -> PointerEvent {
        PointerEvent::new(Point::new(x, y), Point::new(x, y))
    }

    fn click(c: &mut Controller, x: f64, y: f64) {
        c.on_pointer_down(&at(x, y));
        c.on_pointer_up(&at(x, y)).unwrap();
    }

    /// Place a measurement from (x0, y0) to (x1, y1) and dismiss the editor.
    fn measure(c: &mut Controller, kind: MeasureKind, from: (f64, f64), to: (f64, f64)) {
        c.select_tool(kind).unwrap();
        click(c, from.0, from.1);
        c.on_pointer_move(&at(to.0, to.1)).unwrap();
        click(c, to.0, to.1);
        c.editor_mut().reset_off();
    }

    #[test]
    fn test_new_fits_and_renders_page() {
        let c = controller();
        assert_eq!(c.state(), CanvasState::Idle);
        assert_eq!(c.viewport().unwrap().offset, Point::new(0.0, 0.0));
        let targets: Vec<RenderTarget> = c.page().renders.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![RenderTarget::Main, RenderTarget::Magnifier]);
        assert_eq!(c.page().renders[1].scale, 300.0 / 72.0);
    }

    #[test]
    fn test_transform_before_viewport_is_contract_error() {
        let c = CanvasController::new(
            FakePage::new(1, 612.0, 792.0),
            RetainedOverlay::new(),
            Size::new(0.0, 0.0),
            &Settings::default(),
        );
        assert!(matches!(
            c.image_to_canvas(Point::new(1.0, 1.0)),
            Err(CanvasError::ViewportNotEstablished { .. })
        ));
        assert!(c.canvas_to_image(Point::new(1.0, 1.0), true).is_err());
    }

    #[test]
    fn test_basic_interval_scenario() {
        let mut c = controller();
        c.on_key(KeyInput::Char('i')).unwrap();
        assert_eq!(c.state(), CanvasState::Armed(MeasureKind::Interval));
        assert_eq!(c.affordance(), PointerAffordance::Crosshair);

        click(&mut c, 100.0, 50.0);
        assert_eq!(c.state(), CanvasState::Placing(MeasureKind::Interval));
        c.on_pointer_move(&at(300.0, 50.0)).unwrap();
        click(&mut c, 300.0, 50.0);
        assert_eq!(c.state(), CanvasState::Armed(MeasureKind::Interval));

        let m = c.last_measurement().unwrap();
        assert!(m.is_finalized());
        assert_eq!(m.start(), Point::new(100.0, 50.0));
        assert_eq!(m.end(), Point::new(300.0, 50.0));
        let expected = 1000.0 * 25.4 * 200.0 / (72.0 * 25.0);
        assert!((m.duration(c.scroll_rate()) - expected).abs() < 1e-9);
        assert!((expected - 2822.2).abs() < 0.1);

        // Finishing a placement opens the editor on it
        assert_eq!(c.editor().target(), Some(m.id()));
        assert_eq!(c.surface().label(m.id()).unwrap().text, "2822");
        assert_eq!(c.surface().lines().len(), 3);
    }

    #[test]
    fn test_placing_never_reverses() {
        let mut c = controller();
        c.select_tool(MeasureKind::Interval).unwrap();
        click(&mut c, 200.0, 50.0);
        c.on_pointer_move(&at(120.0, 70.0)).unwrap();
        let m = c.last_measurement().unwrap();
        assert_eq!(m.end(), Point::new(200.0, 70.0));
    }

    #[test]
    fn test_click_without_tool_does_nothing() {
        let mut c = controller();
        click(&mut c, 10.0, 10.0);
        assert!(c.measurements().is_empty());
        assert!(!c.magnifier().is_visible());
    }

    #[test]
    fn test_magnifier_follows_armed_pointer() {
        let mut c = controller();
        c.select_tool(MeasureKind::Amplitude).unwrap();
        c.on_pointer_down(&at(50.0, 60.0));
        assert!(c.magnifier().layout().is_some());
        c.on_pointer_up(&at(50.0, 60.0)).unwrap();
        assert!(!c.magnifier().is_visible());
    }

    #[test]
    fn test_guide_line_drawn_while_armed() {
        let mut c = controller();
        c.select_tool(MeasureKind::Qt).unwrap();
        c.on_pointer_move(&at(42.0, 10.0)).unwrap();
        let (line, _) = c.surface().lines()[0];
        assert_eq!(line.from, Point::new(42.0, 0.0));
        assert_eq!(line.to, Point::new(42.0, 792.0));
    }

    #[test]
    fn test_wheel_adjusts_angle_only_while_placing() {
        let mut c = controller();
        c.select_tool(MeasureKind::Qt).unwrap();
        assert!(!c.on_wheel(10.0).unwrap());

        click(&mut c, 100.0, 100.0);
        assert!(c.on_wheel(30.0).unwrap());
        assert_eq!(c.last_measurement().unwrap().angle(), 75.0);
        assert!(c.on_wheel(500.0).unwrap());
        assert_eq!(c.last_measurement().unwrap().angle(), 175.0);
    }

    #[test]
    fn test_select_tool_while_placing_retypes() {
        let mut c = controller();
        c.select_tool(MeasureKind::Interval).unwrap();
        click(&mut c, 100.0, 100.0);
        c.on_key(KeyInput::Char('Q')).unwrap();
        assert_eq!(c.last_measurement().unwrap().kind(), MeasureKind::Qt);
        assert_eq!(c.state(), CanvasState::Placing(MeasureKind::Qt));
    }

    #[test]
    fn test_delete_last_scenario() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        measure(&mut c, MeasureKind::Amplitude, (100.0, 10.0), (120.0, 60.0));
        let first = c.measurements()[0].id();
        let second = c.measurements()[1].id();
        assert_eq!(c.surface().label_count(), 2);

        c.on_key(KeyInput::Delete).unwrap();
        assert_eq!(c.measurements().len(), 1);
        assert_eq!(c.measurements()[0].id(), first);
        assert!(c.surface().label(second).is_none());
        assert!(c.surface().label(first).is_some());
    }

    #[test]
    fn test_delete_ignored_while_editor_focused() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        c.on_key(KeyInput::Enter).unwrap();
        assert!(c.editor().has_focus());
        c.on_key(KeyInput::Char('d')).unwrap();
        c.on_key(KeyInput::Backspace).unwrap();
        assert_eq!(c.measurements().len(), 1);
    }

    #[test]
    fn test_escape_clears_tool_but_keeps_measurements() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        c.on_key(KeyInput::Enter).unwrap();
        c.on_key(KeyInput::Escape).unwrap();
        assert_eq!(c.state(), CanvasState::Idle);
        assert_eq!(c.affordance(), PointerAffordance::Default);
        assert!(!c.editor().is_open());
        assert_eq!(c.measurements().len(), 1);
        assert_eq!(c.surface().lines().len(), 3);
    }

    #[test]
    fn test_enter_opens_then_commits_label() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Qt, (72.0, 10.0), (144.0, 10.0));
        let id = c.last_measurement().unwrap().id();

        c.on_key(KeyInput::Enter).unwrap();
        assert_eq!(c.editor().target(), Some(id));
        *c.editor_mut().text_mut() = "QT".to_string();
        c.on_key(KeyInput::Enter).unwrap();

        assert!(!c.editor().is_open());
        assert_eq!(c.last_measurement().unwrap().label(), "QT");
        assert_eq!(c.surface().label(id).unwrap().text, "QT: 1016");

        // Reopening pre-fills the current label
        c.on_key(KeyInput::Enter).unwrap();
        assert_eq!(c.editor().text(), "QT");
    }

    #[test]
    fn test_calibration_corrects_every_measurement() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (0.0, 10.0), (72.0, 10.0));
        measure(&mut c, MeasureKind::Interval, (100.0, 10.0), (136.0, 10.0));
        let first = c.measurements()[0].id();
        let before_first = c.measurements()[0].duration(c.scroll_rate());
        let before_second = c.measurements()[1].duration(c.scroll_rate());
        assert!((before_second - 508.0).abs() < 1e-9);

        c.on_key(KeyInput::Enter).unwrap();
        *c.editor_mut().text_mut() = "$400".to_string();
        c.on_key(KeyInput::Enter).unwrap();

        let rate = c.scroll_rate();
        assert!((rate - 25.0 * 508.0 / 400.0).abs() < 1e-9);
        assert!((c.measurements()[1].duration(rate) - 400.0).abs() < 1e-9);
        let factor = before_second / 400.0;
        assert!((c.measurements()[0].duration(rate) - before_first / factor).abs() < 1e-9);
        assert_eq!(c.measurements()[1].label(), "");
        assert_eq!(c.surface().label(first).unwrap().text, "800");
    }

    #[test]
    fn test_calibration_rejects_zero() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (0.0, 10.0), (72.0, 10.0));
        c.on_key(KeyInput::Enter).unwrap();
        *c.editor_mut().text_mut() = "$0".to_string();
        c.on_key(KeyInput::Enter).unwrap();
        assert_eq!(c.scroll_rate(), 25.0);
        assert_eq!(c.last_measurement().unwrap().label(), "");
    }

    #[test]
    fn test_label_drag_translates_and_brings_to_front() {
        let mut c = CanvasController::new(
            FakePage::new(1, 100.0, 100.0),
            RetainedOverlay::new(),
            Size::new(400.0, 200.0),
            &Settings::default(),
        );
        // Scale 2, offset (100, 0)
        measure(&mut c, MeasureKind::Interval, (120.0, 20.0), (160.0, 20.0));
        measure(&mut c, MeasureKind::Interval, (200.0, 40.0), (240.0, 40.0));
        let first = c.measurements()[0].clone();

        assert!(c.begin_label_drag(first.id(), Point::new(500.0, 500.0)));
        assert_eq!(c.last_measurement().unwrap().id(), first.id());

        let pointer = PointerEvent::new(Point::new(520.0, 490.0), Point::new(0.0, 0.0));
        c.on_pointer_move(&pointer).unwrap();
        let moved = c.last_measurement().unwrap();
        assert_eq!(moved.start(), first.start() + Point::new(10.0, -5.0));
        assert_eq!(moved.end(), first.end() + Point::new(10.0, -5.0));

        c.on_pointer_up(&pointer).unwrap();
        assert!(!c.is_dragging());
        assert_eq!(c.measurements().len(), 2);
    }

    #[test]
    fn test_pointer_cancel_ends_drag() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        let id = c.last_measurement().unwrap().id();
        assert!(c.begin_label_drag(id, Point::new(0.0, 0.0)));
        c.on_pointer_cancel();
        assert!(!c.is_dragging());

        let before = c.last_measurement().unwrap().start();
        c.on_pointer_move(&at(30.0, 30.0)).unwrap();
        assert_eq!(c.last_measurement().unwrap().start(), before);
    }

    #[test]
    fn test_placing_measurement_cannot_be_dragged() {
        let mut c = controller();
        c.select_tool(MeasureKind::Interval).unwrap();
        click(&mut c, 10.0, 10.0);
        let id = c.last_measurement().unwrap().id();
        assert!(!c.begin_label_drag(id, Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_finalized_measurement_untouched_by_placement() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        let first = c.measurements()[0].clone();

        click(&mut c, 200.0, 100.0);
        assert!(!c.begin_label_drag(first.id(), Point::new(0.0, 0.0)));
        assert!(!c.is_dragging());
        c.on_pointer_move(&at(5.0, 300.0)).unwrap();
        click(&mut c, 5.0, 300.0);

        assert_eq!(c.measurements()[0], first);
        let second = &c.measurements()[1];
        assert!(second.is_finalized());
        assert_eq!(second.start(), Point::new(200.0, 100.0));
        assert_eq!(second.end(), Point::new(200.0, 300.0));
        assert_eq!(c.state(), CanvasState::Armed(MeasureKind::Interval));
    }

    #[test]
    fn test_escape_while_placing_keeps_placing() {
        let mut c = controller();
        c.select_tool(MeasureKind::Amplitude).unwrap();
        click(&mut c, 100.0, 100.0);
        c.on_key(KeyInput::Escape).unwrap();
        assert_eq!(c.state(), CanvasState::Placing(MeasureKind::Amplitude));
        assert_eq!(c.affordance(), PointerAffordance::Crosshair);

        c.on_pointer_move(&at(150.0, 120.0)).unwrap();
        click(&mut c, 150.0, 120.0);
        assert_eq!(c.state(), CanvasState::Idle);
        let m = c.last_measurement().unwrap();
        assert!(m.is_finalized());
        assert_eq!(m.end(), Point::new(150.0, 120.0));
    }

    #[test]
    fn test_rotate_round_trip() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Qt, (10.0, 20.0), (90.0, 40.0));
        let before: Vec<(Point, Point)> =
            c.measurements().iter().map(|m| (m.start(), m.end())).collect();

        c.rotate(90).unwrap();
        assert_eq!(c.rotation(), 90);
        assert_eq!(c.viewport().unwrap().image, Size::new(792.0, 612.0));
        c.rotate(-90).unwrap();
        assert_eq!(c.rotation().rem_euclid(360), 0);
        assert_eq!(c.viewport().unwrap().image, Size::new(612.0, 792.0));

        let after: Vec<(Point, Point)> =
            c.measurements().iter().map(|m| (m.start(), m.end())).collect();
        assert_eq!(before, after);

        let last = c.page().renders.last().unwrap();
        assert_eq!(last.target, RenderTarget::Magnifier);
        assert_eq!(last.rotation, 0);
    }

    #[test]
    fn test_rotation_can_go_negative() {
        let mut c = controller();
        c.rotate(-90).unwrap();
        assert_eq!(c.rotation(), -90);
        c.rotate(-270).unwrap();
        assert_eq!(c.rotation(), 0);
    }

    #[test]
    fn test_annotations_round_trip() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (50.0, 10.0));
        measure(&mut c, MeasureKind::Qt, (100.0, 10.0), (180.0, 60.0));
        c.on_key(KeyInput::Enter).unwrap();
        *c.editor_mut().text_mut() = "QT".to_string();
        c.on_key(KeyInput::Enter).unwrap();
        c.rotate(90).unwrap();
        c.on_key(KeyInput::Enter).unwrap();
        *c.editor_mut().text_mut() = "$300".to_string();
        c.on_key(KeyInput::Enter).unwrap();

        let state = c.page_state();
        let records = c.annotations();
        assert!(matches!(records[records.len() - 2], AnnotationRecord::ScrollRate(_)));
        assert_eq!(records[records.len() - 1], AnnotationRecord::Rotation(90));

        let mut other = controller();
        other.set_annotations(records).unwrap();
        assert_eq!(other.page_state(), state);
        assert!(other.measurements().iter().all(|m| m.is_finalized()));
        assert_eq!(other.surface().label_count(), 2);
    }

    #[test]
    fn test_set_annotations_resets_scroll_rate_and_skips_bad_records() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (0.0, 10.0), (72.0, 10.0));
        c.on_key(KeyInput::Enter).unwrap();
        *c.editor_mut().text_mut() = "$500".to_string();
        c.on_key(KeyInput::Enter).unwrap();
        assert!(c.scroll_rate() != 25.0);

        let json = r#"[
            {"type":"amplitude","start":{"x":1,"y":2},"end":{"x":3,"y":4},"label":"ST"},
            {"type":"bogus"},
            {"type":"__rotation","value":180}
        ]"#;
        c.set_annotations(parse_records(json).unwrap()).unwrap();
        assert_eq!(c.scroll_rate(), 25.0);
        assert_eq!(c.rotation(), 180);
        assert_eq!(c.measurements().len(), 1);
        assert_eq!(c.measurements()[0].label(), "ST");
        assert_eq!(c.surface().label_count(), 1);
    }

    #[test]
    fn test_set_annotations_skips_non_finite_record() {
        let mut c = controller();
        let bad = AnnotationRecord::Measurement(crate::models::annotation::MeasurementRecord {
            kind: MeasureKind::Interval,
            start: Point::new(f64::INFINITY, 0.0),
            end: Point::new(1.0, 1.0),
            angle: 45.0,
            label: String::new(),
            duration: None,
        });
        c.set_annotations(vec![bad]).unwrap();
        assert!(c.measurements().is_empty());
    }

    #[test]
    fn test_page_switch_saves_and_loads() {
        let mut store = MemoryStore::new();
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (0.0, 10.0), (72.0, 10.0));
        c.rotate(180).unwrap();

        let previous = c
            .switch_page(FakePage::new(2, 612.0, 792.0), &mut store, "doc")
            .unwrap();
        assert_eq!(previous.page_number(), 1);
        assert!(c.measurements().is_empty());
        assert_eq!(c.rotation(), 180);
        assert!(store.get("doc-1").unwrap().is_some());

        c.switch_page(previous, &mut store, "doc").unwrap();
        assert_eq!(c.measurements().len(), 1);
        assert_eq!(c.measurements()[0].end(), Point::new(72.0, 10.0));
        assert!(store.get("doc-2").unwrap().is_some());
    }

    #[test]
    fn test_unreadable_stored_page_leaves_state() {
        let mut store = MemoryStore::new();
        store.set("doc-1", "{\"not\": \"an array\"}".to_string()).unwrap();
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (0.0, 10.0), (72.0, 10.0));
        c.load_annotations(&store, "doc").unwrap();
        assert_eq!(c.measurements().len(), 1);
    }

    #[test]
    fn test_resize_moves_labels() {
        let mut c = controller();
        measure(&mut c, MeasureKind::Interval, (100.0, 50.0), (300.0, 50.0));
        let id = c.last_measurement().unwrap().id();
        c.resize_canvas(Size::new(1224.0, 2000.0)).unwrap();

        // Fit to width: scale 2, letterboxed vertically
        let label = c.surface().label(id).unwrap();
        assert!((label.left - 200.0).abs() < 1e-6);
        assert!((label.top - (208.0 + 100.0)).abs() < 1e-6);
        let transform = c.page().renders.last().unwrap().transform.unwrap();
        assert!((transform[0] - 2.0).abs() < 1e-9);
        assert!((transform[5] - 208.0).abs() < 1e-6);
    }

    fn kind_strategy() -> impl Strategy<Value = MeasureKind> {
        prop_oneof![
            Just(MeasureKind::Interval),
            Just(MeasureKind::Amplitude),
            Just(MeasureKind::Qt),
        ]
    }

    proptest! {
        #[test]
        fn prop_annotations_survive_reload(
            specs in prop::collection::vec(
                (
                    kind_strategy(),
                    (-1000.0f64..1000.0, -1000.0f64..1000.0),
                    (-1000.0f64..1000.0, -1000.0f64..1000.0),
                    5.0f64..175.0,
                    "[A-Za-z ]{0,8}",
                ),
                0..6,
            ),
            rate in 1.0f64..100.0,
            rotation in prop::sample::select(vec![0, 90, 180, 270, -90]),
        ) {
            let records: Vec<AnnotationRecord> = specs
                .iter()
                .map(|(kind, start, end, angle, label)| {
                    AnnotationRecord::Measurement(crate::models::annotation::MeasurementRecord {
                        kind: *kind,
                        start: Point::new(start.0, start.1),
                        end: Point::new(end.0, end.1),
                        angle: *angle,
                        label: label.clone(),
                        duration: None,
                    })
                })
                .chain([AnnotationRecord::ScrollRate(rate), AnnotationRecord::Rotation(rotation)])
                .collect();

            let mut c = controller();
            c.set_annotations(records).unwrap();
            prop_assert_eq!(c.scroll_rate(), rate);
            prop_assert_eq!(c.rotation(), rotation);
            prop_assert_eq!(c.measurements().len(), specs.len());
            for (m, (kind, start, end, angle, label)) in c.measurements().iter().zip(&specs) {
                prop_assert_eq!(m.kind(), *kind);
                prop_assert_eq!(m.start(), Point::new(start.0, start.1));
                prop_assert_eq!(m.end(), Point::new(end.0, end.1));
                prop_assert_eq!(m.angle(), *angle);
                prop_assert_eq!(m.label(), label.as_str());
                prop_assert!(m.is_finalized());
            }

            let mut other = controller();
            other.set_annotations(c.annotations()).unwrap();
            prop_assert_eq!(other.page_state(), c.page_state());
        }

        #[test]
        fn prop_calibration_hits_target(
            dx in 1.0f64..500.0,
            other_dx in 1.0f64..500.0,
            target_ms in 1u64..5000,
        ) {
            let mut c = controller();
            measure(&mut c, MeasureKind::Interval, (10.0, 10.0), (10.0 + other_dx, 10.0));
            measure(&mut c, MeasureKind::Interval, (10.0, 20.0), (10.0 + dx, 20.0));
            let rate = c.scroll_rate();
            let measured = duration_ms(dx, rate);
            let other_before = c.measurements()[0].duration(rate);

            c.on_key(KeyInput::Enter).unwrap();
            *c.editor_mut().text_mut() = format!("${}", target_ms);
            c.on_key(KeyInput::Enter).unwrap();

            let corrected = c.scroll_rate();
            let target = target_ms as f64;
            prop_assert!((c.measurements()[1].duration(corrected) - target).abs() < 1e-6 * target);
            let expected_other = other_before * target / measured;
            prop_assert!((c.measurements()[0].duration(corrected) - expected_other).abs() < 1e-6 * (1.0 + expected_other));
        }
    }
}
