// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! ECG Calipers
//!
//! Interval, amplitude and QT measurement markers placed over a rendered ECG
//! page. The geometry, measurement state machine and annotation persistence
//! are headless; the egui host in `app` and `ui` drives them.

pub mod app;
pub mod canvas;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod ui;
pub mod util;
