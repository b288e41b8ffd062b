// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application settings.
//!
//! Settings are read from `<config dir>/ecg-calipers/settings.json`. Every
//! field has a default, so a partial file is fine and a missing one means
//! all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Paper speed assumed for a page without a stored scroll rate (mm/s).
    pub default_scroll_rate: f64,
    /// Initial QT reference line angle (degrees).
    pub default_angle: f64,
    /// Resolution of the magnifier render.
    pub zoom_dpi: f64,
    /// Side of the magnifier window (points).
    pub zoom_size: f64,
    /// Raster resolution of page image files.
    pub image_dpi: f64,
    /// Annotation store file; defaults to the platform config directory.
    pub store_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_scroll_rate: 25.0,
            default_angle: 45.0,
            zoom_dpi: 300.0,
            zoom_size: 100.0,
            image_dpi: 72.0,
            store_path: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("ecg-calipers");
        path.push("settings.json");
        path
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// cannot be parsed.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings file at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Failed to read settings {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => settings.validated(),
            Err(e) => {
                log::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Replace non-positive numeric settings with their defaults.
    fn validated(mut self) -> Self {
        let defaults = Self::default();
        for (value, default, name) in [
            (&mut self.default_scroll_rate, defaults.default_scroll_rate, "default_scroll_rate"),
            (&mut self.zoom_dpi, defaults.zoom_dpi, "zoom_dpi"),
            (&mut self.zoom_size, defaults.zoom_size, "zoom_size"),
            (&mut self.image_dpi, defaults.image_dpi, "image_dpi"),
        ] {
            if !(value.is_finite() && *value > 0.0) {
                log::warn!("Setting {} must be positive, using {}", name, default);
                *value = default;
            }
        }
        if !(self.default_angle.is_finite() && (5.0..=175.0).contains(&self.default_angle)) {
            log::warn!("Setting default_angle must be within [5, 175], using {}", defaults.default_angle);
            self.default_angle = defaults.default_angle;
        }
        self
    }
}
