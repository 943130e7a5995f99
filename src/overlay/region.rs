use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use super::Quad;
use crate::error::BlockError;

#[derive(Debug, Clone)]
pub struct DetectedRegion {
    pub quad: Result<Quad, BlockError>,
    pub text: String,
}

/// Source of detected text regions for one image, in reading order.
pub trait RegionDetector {
    fn detect(&self) -> Result<Vec<DetectedRegion>>;
}

/// Regions read from a JSON file written by an external detector.
///
/// Accepts objects (`{"points": [[x, y], ...], "text": "..."}`) and
/// `[points, text]` pairs.
pub struct RegionFile {
    path: PathBuf,
}

impl RegionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str) -> Result<Vec<DetectedRegion>> {
        let entries: Vec<RegionEntry> =
            serde_json::from_str(content).with_context(|| "failed to parse region list")?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let (points, text) = match entry {
                    RegionEntry::Object { points, text } => (points, text),
                    RegionEntry::Pair(points, text) => (points, text),
                };
                DetectedRegion {
                    quad: parse_quad(&points),
                    text,
                }
            })
            .collect())
    }
}

impl RegionDetector for RegionFile {
    fn detect(&self) -> Result<Vec<DetectedRegion>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read regions: {}", self.path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", self.path.display()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegionEntry {
    Object {
        #[serde(default)]
        points: Value,
        #[serde(default)]
        text: String,
    },
    Pair(Value, String),
}

fn parse_quad(value: &Value) -> Result<Quad, BlockError> {
    let invalid = || BlockError::InvalidBox(format!("unreadable corner points: {}", value));
    let corners = value.as_array().ok_or_else(invalid)?;
    let mut points = Vec::with_capacity(corners.len());
    for corner in corners {
        let pair = corner.as_array().ok_or_else(invalid)?;
        let [x, y] = pair.as_slice() else {
            return Err(invalid());
        };
        let x = coordinate(x).ok_or_else(invalid)?;
        let y = coordinate(y).ok_or_else(invalid)?;
        points.push((x, y));
    }
    if points.is_empty() {
        return Err(invalid());
    }
    Ok(Quad { points })
}

fn coordinate(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(number) => number.as_f64().map(|v| v as f32),
        Value::String(text) => text.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
