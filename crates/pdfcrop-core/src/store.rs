//! Crop preset store
//!
//! Per-document presets and per-page applied-preset links, persisted through
//! an injected [`PresetBackend`]. Each mutation loads the document record,
//! edits a copy and saves it back in one call, so a failed save leaves the
//! persisted record untouched.

use crate::error::CropError;
use crate::preset::{CropPreset, DocumentRecord, PageStates, PartialRect};
use std::collections::BTreeMap;

/// Persistence contract for preset records, keyed by document id
pub trait PresetBackend {
    fn load(&self, document_id: &str) -> Result<Option<DocumentRecord>, CropError>;

    /// Replace the whole record for a document
    fn save(&mut self, document_id: &str, record: &DocumentRecord) -> Result<(), CropError>;

    fn remove(&mut self, document_id: &str) -> Result<(), CropError>;

    /// Ids of every document with a stored record
    fn documents(&self) -> Result<Vec<String>, CropError>;
}

/// In-process backend; records are kept as serialized JSON so the same
/// encoding path runs as in browser storage
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: BTreeMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetBackend for MemoryBackend {
    fn load(&self, document_id: &str) -> Result<Option<DocumentRecord>, CropError> {
        self.records
            .get(document_id)
            .map(|json| serde_json::from_str(json).map_err(CropError::from))
            .transpose()
    }

    fn save(&mut self, document_id: &str, record: &DocumentRecord) -> Result<(), CropError> {
        let json = serde_json::to_string(record)?;
        self.records.insert(document_id.to_string(), json);
        Ok(())
    }

    fn remove(&mut self, document_id: &str) -> Result<(), CropError> {
        self.records.remove(document_id);
        Ok(())
    }

    fn documents(&self) -> Result<Vec<String>, CropError> {
        Ok(self.records.keys().cloned().collect())
    }
}

pub struct PresetStore<B: PresetBackend> {
    backend: B,
    max_presets: usize,
}

impl<B: PresetBackend> PresetStore<B> {
    pub fn new(backend: B, max_presets: usize) -> Self {
        Self {
            backend,
            max_presets,
        }
    }

    pub fn max_presets(&self) -> usize {
        self.max_presets
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn record(&self, document_id: &str) -> Result<DocumentRecord, CropError> {
        Ok(self.backend.load(document_id)?.unwrap_or_default())
    }

    /// The record of `document_id`, provided it owns `preset_id`
    fn owning_record(
        &self,
        document_id: &str,
        preset_id: &str,
    ) -> Result<DocumentRecord, CropError> {
        let record = self.record(document_id)?;
        if record.preset(preset_id).is_none() {
            return Err(CropError::PresetNotFound(preset_id.to_string()));
        }
        Ok(record)
    }

    /// The whole stored record, for putting it back after a failed release
    pub(crate) fn snapshot(&self, document_id: &str) -> Result<Option<DocumentRecord>, CropError> {
        self.backend.load(document_id)
    }

    pub(crate) fn restore(
        &mut self,
        document_id: &str,
        record: &DocumentRecord,
    ) -> Result<(), CropError> {
        self.backend.save(document_id, record)
    }

    pub fn create(&mut self, document_id: &str, preset: CropPreset) -> Result<CropPreset, CropError> {
        let mut record = self.record(document_id)?;

        if record.presets.len() >= self.max_presets {
            return Err(CropError::LimitExceeded {
                limit: self.max_presets,
            });
        }
        preset.rect().validate()?;
        if record.preset(&preset.id).is_some() {
            return Err(CropError::InvalidGeometry(format!(
                "Preset id {} already exists",
                preset.id
            )));
        }

        record.presets.push(preset.clone());
        self.backend.save(document_id, &record)?;

        tracing::debug!(document_id, preset_id = %preset.id, "Created preset");
        Ok(preset)
    }

    /// Remove a preset and clear every page that had it applied
    pub fn delete(&mut self, document_id: &str, preset_id: &str) -> Result<Vec<u32>, CropError> {
        let mut record = self.owning_record(document_id, preset_id)?;

        record.presets.retain(|p| p.id != preset_id);
        let cleared = record.clear_references(preset_id);
        self.backend.save(document_id, &record)?;

        tracing::debug!(
            document_id,
            preset_id,
            cleared_pages = cleared.len(),
            "Deleted preset"
        );
        Ok(cleared)
    }

    pub fn rename(
        &mut self,
        document_id: &str,
        preset_id: &str,
        name: &str,
    ) -> Result<CropPreset, CropError> {
        let mut record = self.owning_record(document_id, preset_id)?;

        let preset = record
            .preset_mut(preset_id)
            .ok_or_else(|| CropError::PresetNotFound(preset_id.to_string()))?;
        preset.name = name.trim().to_string();
        let updated = preset.clone();

        self.backend.save(document_id, &record)?;
        Ok(updated)
    }

    /// Merge a partial rectangle over the stored geometry, re-validating first
    pub fn update_geometry(
        &mut self,
        document_id: &str,
        preset_id: &str,
        partial: PartialRect,
    ) -> Result<CropPreset, CropError> {
        let mut record = self.owning_record(document_id, preset_id)?;

        let preset = record
            .preset_mut(preset_id)
            .ok_or_else(|| CropError::PresetNotFound(preset_id.to_string()))?;
        let rect = partial.merge_over(&preset.rect());
        rect.validate()?;
        preset.set_rect(rect);
        let updated = preset.clone();

        self.backend.save(document_id, &record)?;

        tracing::debug!(document_id, preset_id, ?rect, "Updated preset geometry");
        Ok(updated)
    }

    /// Associate a preset with a page. The preset is not required to exist.
    pub fn apply_to_page(
        &mut self,
        document_id: &str,
        page: u32,
        preset_id: &str,
    ) -> Result<(), CropError> {
        if page == 0 {
            return Err(CropError::InvalidRange("Page numbers must be >= 1".into()));
        }
        let mut record = self.record(document_id)?;
        record.pages.insert(page, Some(preset_id.to_string()));
        self.backend.save(document_id, &record)
    }

    pub fn clear_page(&mut self, document_id: &str, page: u32) -> Result<(), CropError> {
        if page == 0 {
            return Err(CropError::InvalidRange("Page numbers must be >= 1".into()));
        }
        let mut record = self.record(document_id)?;
        record.pages.insert(page, None);
        self.backend.save(document_id, &record)
    }

    pub fn list_presets(&self, document_id: &str) -> Result<Vec<CropPreset>, CropError> {
        Ok(self.record(document_id)?.presets)
    }

    pub fn list_page_states(&self, document_id: &str) -> Result<PageStates, CropError> {
        Ok(self.record(document_id)?.pages)
    }

    pub fn get(&self, document_id: &str, preset_id: &str) -> Result<Option<CropPreset>, CropError> {
        Ok(self.record(document_id)?.preset(preset_id).cloned())
    }

    /// The preset applied to `page`, if the link is set and the preset still exists
    pub fn applied_preset(
        &self,
        document_id: &str,
        page: u32,
    ) -> Result<Option<CropPreset>, CropError> {
        let record = self.record(document_id)?;
        Ok(record
            .pages
            .get(&page)
            .and_then(|applied| applied.as_deref())
            .and_then(|id| record.preset(id))
            .cloned())
    }

    pub fn remove_document(&mut self, document_id: &str) -> Result<(), CropError> {
        self.backend.remove(document_id)
    }
}
