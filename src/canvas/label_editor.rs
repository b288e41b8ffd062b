// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Single-line label editor bound to one measurement.
//!
//! Committed text becomes the measurement's label, except text containing
//! `$<digits>`, which is a calibration command giving the measurement's
//! true duration in milliseconds.

use crate::models::measurement::MeasurementId;

/// Result of committing the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorCommit {
    Label { target: MeasurementId, text: String },
    Calibrate { target: MeasurementId, true_duration_ms: u64 },
}

/// Extract the calibration value: the first `$` directly followed by digits.
pub fn parse_calibration(text: &str) -> Option<u64> {
    text.match_indices('$').find_map(|(index, _)| {
        let rest = &text[index + 1..];
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let digits = &rest[..end];
        if digits.is_empty() {
            None
        } else {
            // Overlong digit runs saturate.
            Some(digits.parse().unwrap_or(u64::MAX))
        }
    })
}

#[derive(Debug, Clone, Default)]
pub struct LabelEditor {
    target: Option<MeasurementId>,
    text: String,
    focused: bool,
    select_on_focus: bool,
}

impl LabelEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<MeasurementId> {
        self.target
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Editable buffer for the host's text input.
    pub fn text_mut(&mut self) -> &mut String {
        &mut self.text
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    /// Host reports input focus changes.
    pub fn set_focus(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// True once after opening: the host should focus the input and select
    /// its text.
    pub fn take_select_request(&mut self) -> bool {
        std::mem::take(&mut self.select_on_focus)
    }

    /// Open on `target`, pre-filled with its current label.
    pub fn open(&mut self, target: MeasurementId, current_label: &str) {
        self.target = Some(target);
        self.text = current_label.to_string();
        self.focused = true;
        self.select_on_focus = true;
    }

    /// Close without committing.
    pub fn reset_off(&mut self) {
        self.target = None;
        self.text.clear();
        self.focused = false;
        self.select_on_focus = false;
    }

    /// Close and hand back what was entered for the current target.
    pub fn commit(&mut self) -> Option<EditorCommit> {
        let target = self.target?;
        let text = std::mem::take(&mut self.text);
        self.reset_off();

        Some(match parse_calibration(&text) {
            Some(true_duration_ms) => EditorCommit::Calibrate {
                target,
                true_duration_ms,
            },
            None => EditorCommit::Label { target, text },
        })
    }
}
