// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the measurement core.

use crate::util::geometry::Size;

/// Contract violations raised by the canvas controller.
///
/// These indicate an integration mistake (a transform requested before the
/// page has been fitted to a non-empty canvas), not a user-recoverable
/// condition.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CanvasError {
    #[error("viewport has not been established (canvas {canvas}, page {page})")]
    ViewportNotEstablished { canvas: Size, page: Size },
    #[error("page reported an empty viewport ({0})")]
    EmptyPage(Size),
}

/// A single annotation record that could not be turned into page state.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed annotation record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("annotation record has non-finite {0}")]
    NonFinite(&'static str),
    #[error("invalid {field} value: {value}")]
    InvalidSentinel { field: &'static str, value: String },
}

/// Failures of the persisted key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
