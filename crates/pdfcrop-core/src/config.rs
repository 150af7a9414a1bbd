//! Session configuration
//!
//! Hosts inject configuration as JSON (the web app passes a JS object through
//! serde-wasm-bindgen). Every field has a default so partial objects work.

use crate::error::CropError;
use serde::{Deserialize, Serialize};

/// Tunables for presets, gestures and preview rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Maximum number of presets per document
    pub max_presets: usize,
    /// Width of the canvas pixel buffer used to rasterize a page
    pub render_width: u32,
    /// Minimum drag extent, in canvas pixels, for a drawn rectangle to count
    pub min_drag_px: f64,
    /// Smallest width/height a resize may produce, in ratio space
    pub min_resize_ratio: f64,
    /// Pages beyond this count are not offered for preview
    pub max_preview_pages: u32,
    /// Key prefix for persisted preset records
    pub storage_prefix: String,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            max_presets: 1,
            render_width: 900,
            min_drag_px: 5.0,
            min_resize_ratio: 0.01,
            max_preview_pages: 50,
            storage_prefix: "pdfcrop".to_string(),
        }
    }
}

impl CropConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, CropError> {
        let config: CropConfig = serde_json::from_str(json)
            .map_err(|e| CropError::Operation(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CropError> {
        if self.max_presets == 0 {
            return Err(CropError::Operation(
                "max_presets must be at least 1".into(),
            ));
        }
        if self.render_width == 0 {
            return Err(CropError::Operation(
                "render_width must be at least 1".into(),
            ));
        }
        if !self.min_drag_px.is_finite() || self.min_drag_px < 0.0 {
            return Err(CropError::Operation(format!(
                "min_drag_px must be a non-negative number, got {}",
                self.min_drag_px
            )));
        }
        if !(self.min_resize_ratio > 0.0 && self.min_resize_ratio < 1.0) {
            return Err(CropError::Operation(format!(
                "min_resize_ratio must be within (0, 1), got {}",
                self.min_resize_ratio
            )));
        }
        if self.max_preview_pages == 0 {
            return Err(CropError::Operation(
                "max_preview_pages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
