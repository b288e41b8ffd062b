// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation export serialization and deserialization.
//!
//! This module handles writing and reading document-wide annotation exports
//! in JSON and YAML formats.

use crate::models::project::AnnotationExport;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Export annotations to YAML format.
pub fn export_yaml(data: &AnnotationExport, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Export annotations to JSON format.
pub fn export_json(data: &AnnotationExport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Import annotations from YAML format.
pub fn import_yaml(path: &Path) -> Result<AnnotationExport> {
    let yaml = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let data = serde_yaml::from_str(&yaml)?;
    Ok(data)
}

/// Import annotations from JSON format.
pub fn import_json(path: &Path) -> Result<AnnotationExport> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let data = serde_json::from_str(&json)?;
    Ok(data)
}

/// Export by file extension (`.json`, `.yaml` or `.yml`).
pub fn export_by_extension(data: &AnnotationExport, path: &Path) -> Result<()> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => export_yaml(data, path),
        Some("json") => export_json(data, path),
        other => bail!("Unsupported file extension: {:?}", other),
    }
}

/// Import by file extension (`.json`, `.yaml` or `.yml`).
pub fn import_by_extension(path: &Path) -> Result<AnnotationExport> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        other => bail!("Unsupported file extension: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AnnotationExport {
        serde_json::from_value(json!([
            [
                {"type": "qt", "start": {"x": 10.5, "y": 20.0}, "end": {"x": 40.0, "y": 22.0},
                 "angle": 60.0, "label": "QT", "duration": 437.5},
                {"type": "__scroll_rate", "value": 25.0},
                {"type": "__rotation", "value": 0}
            ],
            {}
        ]))
        .unwrap()
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("export_annotations.json");
        export_by_extension(&sample(), &path).unwrap();
        assert_eq!(import_by_extension(&path).unwrap(), sample());
    }

    #[test]
    fn test_yaml_file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("export_annotations.yaml");
        export_by_extension(&sample(), &path).unwrap();
        assert_eq!(import_by_extension(&path).unwrap(), sample());
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        assert!(export_by_extension(&sample(), &dir.path().join("out.csv")).is_err());
    }
}
