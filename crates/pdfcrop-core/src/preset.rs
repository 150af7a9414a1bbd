//! Crop presets and the persisted per-document record
//!
//! Preset geometry lives in ratio space: values in [0, 1] relative to the
//! page's rendered MediaBox, top-left origin, y increasing downward.

use crate::error::CropError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slack allowed on upper bounds when validating ratio geometry
pub const RATIO_EPSILON: f64 = 1e-9;

/// A point in ratio space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioPoint {
    pub x: f64,
    pub y: f64,
}

impl RatioPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A rectangle in ratio space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RatioRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounding box of two corner points, regardless of drag direction
    pub fn from_corners(a: RatioPoint, b: RatioPoint) -> Self {
        let (min_x, max_x) = if a.x < b.x { (a.x, b.x) } else { (b.x, a.x) };
        let (min_y, max_y) = if a.y < b.y { (a.y, b.y) } else { (b.y, a.y) };
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: RatioPoint) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Check the persisted-geometry invariant:
    /// `0 <= x <= 1`, `0 <= y <= 1`, `0 < width <= 1 - x`, `0 < height <= 1 - y`
    pub fn validate(&self) -> Result<(), CropError> {
        let Self {
            x,
            y,
            width,
            height,
        } = *self;

        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(CropError::InvalidGeometry(
                "Coordinates must be finite numbers".into(),
            ));
        }
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(CropError::InvalidGeometry(format!(
                "Origin ({}, {}) is outside the page",
                x, y
            )));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(CropError::InvalidGeometry(format!(
                "Size {}x{} must be positive",
                width, height
            )));
        }
        if width > 1.0 - x + RATIO_EPSILON {
            return Err(CropError::InvalidGeometry(format!(
                "Width {} extends past the right edge (x = {})",
                width, x
            )));
        }
        if height > 1.0 - y + RATIO_EPSILON {
            return Err(CropError::InvalidGeometry(format!(
                "Height {} extends past the bottom edge (y = {})",
                height, y
            )));
        }
        Ok(())
    }

    /// Whether two rects differ by more than floating point noise
    pub fn differs_from(&self, other: &RatioRect) -> bool {
        (self.x - other.x).abs() > RATIO_EPSILON
            || (self.y - other.y).abs() > RATIO_EPSILON
            || (self.width - other.width).abs() > RATIO_EPSILON
            || (self.height - other.height).abs() > RATIO_EPSILON
    }
}

/// Geometry update from a move or resize gesture; missing fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRect {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PartialRect {
    pub fn merge_over(&self, base: &RatioRect) -> RatioRect {
        RatioRect {
            x: self.x.unwrap_or(base.x),
            y: self.y.unwrap_or(base.y),
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
        }
    }
}

impl From<RatioRect> for PartialRect {
    fn from(rect: RatioRect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
        }
    }
}

/// A named, persisted crop rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPreset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropPreset {
    /// Create a preset with a fresh random id
    pub fn new(name: impl Into<String>, rect: RatioRect) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name, rect)
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, rect: RatioRect) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }

    pub fn rect(&self) -> RatioRect {
        RatioRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_rect(&mut self, rect: RatioRect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }
}

/// Auto-generated name for the next drawn preset
pub fn default_preset_name(existing: usize) -> String {
    format!("Preset {}", existing + 1)
}

/// Page number (1-indexed) to the preset applied on it, if any
pub type PageStates = BTreeMap<u32, Option<String>>;

/// Everything persisted for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub presets: Vec<CropPreset>,
    #[serde(default)]
    pub pages: PageStates,
}

impl DocumentRecord {
    pub fn preset(&self, preset_id: &str) -> Option<&CropPreset> {
        self.presets.iter().find(|p| p.id == preset_id)
    }

    pub fn preset_mut(&mut self, preset_id: &str) -> Option<&mut CropPreset> {
        self.presets.iter_mut().find(|p| p.id == preset_id)
    }

    /// Clear every page entry that points at `preset_id`; returns the cleared pages
    pub fn clear_references(&mut self, preset_id: &str) -> Vec<u32> {
        let mut cleared = Vec::new();
        for (page, applied) in self.pages.iter_mut() {
            if applied.as_deref() == Some(preset_id) {
                *applied = None;
                cleared.push(*page);
            }
        }
        cleared
    }
}

/// Snapshot of the active document and its editing state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workspace {
    pub document_id: String,
    pub document_name: String,
    pub total_pages: u32,
    pub presets: Vec<CropPreset>,
    pub pages: PageStates,
}
