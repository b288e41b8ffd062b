// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! ECG Calipers
//!
//! A cross-platform desktop application for measuring intervals,
//! amplitudes and QT segments on rendered ECG pages.

use anyhow::Result;
use ecg_calipers::app::EcgApp;
use ecg_calipers::config::Settings;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load(&Settings::default_path());

    // Page images given on the command line are opened at startup
    let pages: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("ECG Calipers"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "ECG Calipers",
        options,
        Box::new(move |_cc| {
            let mut app = EcgApp::new(settings);
            if !pages.is_empty() {
                app.open_document(pages);
            }
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
