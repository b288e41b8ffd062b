// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar and tool selection UI.
//!
//! This module provides the toolbar for arming a measurement tool,
//! rotating the page, paging through the document and removing
//! measurements.

use crate::models::annotation::MeasureKind;

/// Result of toolbar interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    None,
    SelectTool(MeasureKind),
    ClearTool,
    Rotate(i32),
    DeleteLast,
    ClearAll,
    PreviousPage,
    NextPage,
}

/// Display the toolbar with tool selection buttons.
pub fn show(ui: &mut egui::Ui, current_tool: Option<MeasureKind>, has_page: bool) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;
        ui.add_enabled_ui(has_page, |ui| {
            ui.label("Tools:");
            ui.separator();

            if ui.selectable_label(current_tool.is_none(), "⬆ None").clicked() {
                action = ToolbarAction::ClearTool;
            }
            for (kind, text) in [
                (MeasureKind::Interval, "↔ Interval (I)"),
                (MeasureKind::Amplitude, "↕ Amplitude (A)"),
                (MeasureKind::Qt, "⟋ QT (Q)"),
            ] {
                if ui.selectable_label(current_tool == Some(kind), text).clicked() {
                    action = ToolbarAction::SelectTool(kind);
                }
            }

            ui.separator();

            if ui.button("⟲").on_hover_text("Rotate left").clicked() {
                action = ToolbarAction::Rotate(-90);
            }
            if ui.button("⟳").on_hover_text("Rotate right").clicked() {
                action = ToolbarAction::Rotate(90);
            }

            ui.separator();

            if ui.button("◀").on_hover_text("Previous page (←)").clicked() {
                action = ToolbarAction::PreviousPage;
            }
            if ui.button("▶").on_hover_text("Next page (→)").clicked() {
                action = ToolbarAction::NextPage;
            }

            ui.separator();

            if ui.button("Delete Last (D)").clicked() {
                action = ToolbarAction::DeleteLast;
            }
            if ui.button("Clear All").clicked() {
                action = ToolbarAction::ClearAll;
            }
        });

        ui.separator();

        // Tool description
        let tool_text = match current_tool {
            None => "Select a tool to start measuring",
            Some(MeasureKind::Interval) => "Click to start, click again to finish. Enter edits the label",
            Some(MeasureKind::Amplitude) => "Click at the baseline, click again at the peak",
            Some(MeasureKind::Qt) => "Click to start, scroll to turn the reference line, click to finish",
        };

        ui.label(egui::RichText::new(tool_text).italics().weak());
    });

    action
}
