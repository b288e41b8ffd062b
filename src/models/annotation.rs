// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the persisted form of a page's annotations: an
//! ordered array of records, where measurement records come first in
//! creation order and two page-level records (scroll rate and rotation)
//! follow. [`PageState`] is the in-memory envelope of the same data.

use crate::error::RecordError;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SCROLL_RATE_TAG: &str = "__scroll_rate";
const ROTATION_TAG: &str = "__rotation";

/// A 2D point in image or canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Kind of measurement marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    /// Time duration between two vertical markers.
    Interval,
    /// Height between two horizontal markers.
    Amplitude,
    /// Time duration plus an adjustable reference line through the end point.
    Qt,
}

fn default_angle() -> f64 {
    45.0
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Snapshot of one measurement as stored and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "type")]
    pub kind: MeasureKind,
    pub start: Point,
    pub end: Point,
    #[serde(default = "default_angle")]
    pub angle: f64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub label: String,
    /// Derived duration in milliseconds at export time. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// One entry of a page's annotation array.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationRecord {
    Measurement(MeasurementRecord),
    ScrollRate(f64),
    Rotation(i32),
}

impl AnnotationRecord {
    /// Decode one record, validating page-level values.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        match value.get("type").and_then(|t| t.as_str()) {
            Some(SCROLL_RATE_TAG) => {
                let raw = value.get("value");
                sentinel_number(raw)
                    .filter(|rate| *rate > 0.0)
                    .map(AnnotationRecord::ScrollRate)
                    .ok_or_else(|| invalid_sentinel("scroll rate", raw))
            }
            Some(ROTATION_TAG) => {
                let raw = value.get("value");
                sentinel_number(raw)
                    .filter(|deg| deg.fract() == 0.0 && deg % 90.0 == 0.0)
                    .map(|deg| AnnotationRecord::Rotation((deg % 360.0) as i32))
                    .ok_or_else(|| invalid_sentinel("rotation", raw))
            }
            _ => Ok(AnnotationRecord::Measurement(serde_json::from_value(value)?)),
        }
    }
}

/// Read a sentinel value that may be a JSON number or a numeric string.
fn sentinel_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn invalid_sentinel(field: &'static str, value: Option<&serde_json::Value>) -> RecordError {
    RecordError::InvalidSentinel {
        field,
        value: value.map_or_else(|| "missing".to_string(), |v| v.to_string()),
    }
}

impl Serialize for AnnotationRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AnnotationRecord::Measurement(record) => record.serialize(serializer),
            AnnotationRecord::ScrollRate(rate) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", SCROLL_RATE_TAG)?;
                map.serialize_entry("value", rate)?;
                map.end()
            }
            AnnotationRecord::Rotation(degrees) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", ROTATION_TAG)?;
                map.serialize_entry("value", degrees)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for AnnotationRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        AnnotationRecord::from_value(value).map_err(D::Error::custom)
    }
}

/// Page-level annotation state: measurements plus scroll rate and rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub measurements: Vec<MeasurementRecord>,
    pub scroll_rate: f64,
    pub rotation: i32,
}

impl PageState {
    /// Flatten into the stored record order (measurements, then sentinels).
    pub fn to_records(&self) -> Vec<AnnotationRecord> {
        self.measurements
            .iter()
            .cloned()
            .map(AnnotationRecord::Measurement)
            .chain([
                AnnotationRecord::ScrollRate(self.scroll_rate),
                AnnotationRecord::Rotation(self.rotation),
            ])
            .collect()
    }

    /// Replay records in order over the given defaults. Later sentinels win.
    pub fn from_records(records: Vec<AnnotationRecord>, scroll_rate: f64, rotation: i32) -> Self {
        let mut state = Self {
            measurements: Vec::new(),
            scroll_rate,
            rotation,
        };
        for record in records {
            match record {
                AnnotationRecord::Measurement(m) => state.measurements.push(m),
                AnnotationRecord::ScrollRate(rate) => state.scroll_rate = rate,
                AnnotationRecord::Rotation(degrees) => state.rotation = degrees,
            }
        }
        state
    }
}

/// Parse a stored annotation array, skipping records that fail to decode.
///
/// Only a payload that is not a JSON array at all is an error; each bad
/// element is logged and dropped so the rest of the page still loads.
pub fn parse_records(json: &str) -> Result<Vec<AnnotationRecord>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(records_from_values(values))
}

/// Decode already-parsed record values, skipping and logging bad ones.
pub fn records_from_values(values: Vec<serde_json::Value>) -> Vec<AnnotationRecord> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match AnnotationRecord::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::error!("Could not add annotation {}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interval() -> MeasurementRecord {
        MeasurementRecord {
            kind: MeasureKind::Interval,
            start: Point::new(100.0, 50.0),
            end: Point::new(300.0, 50.0),
            angle: 45.0,
            label: "RR".to_string(),
            duration: None,
        }
    }

    #[test]
    fn test_sentinels_use_legacy_wire_shape() {
        let state = PageState {
            measurements: vec![interval()],
            scroll_rate: 25.0,
            rotation: 90,
        };
        let value = serde_json::to_value(state.to_records()).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "interval", "start": {"x": 100.0, "y": 50.0},
                 "end": {"x": 300.0, "y": 50.0}, "angle": 45.0, "label": "RR"},
                {"type": "__scroll_rate", "value": 25.0},
                {"type": "__rotation", "value": 90}
            ])
        );
    }

    #[test]
    fn test_page_state_survives_json() {
        let state = PageState {
            measurements: vec![interval()],
            scroll_rate: 12.5,
            rotation: -90,
        };
        let json = serde_json::to_string(&state.to_records()).unwrap();
        let records = parse_records(&json).unwrap();
        assert_eq!(PageState::from_records(records, 25.0, 0), state);
    }

    #[test]
    fn test_missing_sentinels_fall_back_to_defaults() {
        let records = parse_records(r#"[{"type":"qt","start":{"x":1,"y":2},"end":{"x":3,"y":4}}]"#)
            .unwrap();
        let state = PageState::from_records(records, 25.0, 180);
        assert_eq!(state.scroll_rate, 25.0);
        assert_eq!(state.rotation, 180);
        assert_eq!(state.measurements[0].angle, 45.0);
        assert_eq!(state.measurements[0].label, "");
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let json = r#"[
            {"type":"interval","start":{"x":1,"y":2},"end":{"x":3,"y":4},"label":null},
            {"type":"ellipse","start":{"x":1,"y":2},"end":{"x":3,"y":4}},
            {"type":"amplitude","start":{"x":1}},
            {"type":"__scroll_rate","value":"abc"},
            {"type":"__scroll_rate","value":"50"},
            {"type":"__rotation","value":45}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], AnnotationRecord::Measurement(_)));
        assert_eq!(records[1], AnnotationRecord::ScrollRate(50.0));
    }

    #[test]
    fn test_non_array_payload_is_an_error() {
        assert!(parse_records("{}").is_err());
        assert!(parse_records("not json").is_err());
    }

    #[test]
    fn test_rotation_sentinel_is_normalized() {
        let record = AnnotationRecord::from_value(json!({"type": "__rotation", "value": 450})).unwrap();
        assert_eq!(record, AnnotationRecord::Rotation(90));
        let record = AnnotationRecord::from_value(json!({"type": "__rotation", "value": -270.0})).unwrap();
        assert_eq!(record, AnnotationRecord::Rotation(-270));
    }

    #[test]
    fn test_non_positive_scroll_rate_rejected() {
        let err = AnnotationRecord::from_value(json!({"type": "__scroll_rate", "value": 0})).unwrap_err();
        assert!(matches!(err, RecordError::InvalidSentinel { field: "scroll rate", .. }));
        assert!(AnnotationRecord::from_value(json!({"type": "__scroll_rate"})).is_err());
    }
}
