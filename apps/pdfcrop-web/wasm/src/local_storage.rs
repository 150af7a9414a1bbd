//! Preset records in `window.localStorage`
//!
//! One JSON value per document under `{prefix}:doc:{document_id}`. A record
//! is written with a single `setItem`, so a failed write keeps the old value.

use pdfcrop_core::preset::DocumentRecord;
use pdfcrop_core::{CropError, PresetBackend};
use wasm_bindgen::JsValue;
use web_sys::Storage;

#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    prefix: String,
}

impl LocalStorageBackend {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn storage(&self) -> Result<Storage, CropError> {
        let window = web_sys::window().ok_or_else(|| CropError::Storage("No window".into()))?;
        window
            .local_storage()
            .map_err(js_storage_error)?
            .ok_or_else(|| CropError::Storage("No localStorage".into()))
    }
}

pub(crate) fn record_key(prefix: &str, document_id: &str) -> String {
    format!("{}:doc:{}", prefix, document_id)
}

pub(crate) fn document_id_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix(":doc:")
        .filter(|id| !id.is_empty())
}

fn js_storage_error(e: JsValue) -> CropError {
    CropError::Storage(
        e.as_string()
            .unwrap_or_else(|| "localStorage request failed".to_string()),
    )
}

impl PresetBackend for LocalStorageBackend {
    fn load(&self, document_id: &str) -> Result<Option<DocumentRecord>, CropError> {
        let json = self
            .storage()?
            .get_item(&record_key(&self.prefix, document_id))
            .map_err(js_storage_error)?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, document_id: &str, record: &DocumentRecord) -> Result<(), CropError> {
        let json = serde_json::to_string(record)?;
        self.storage()?
            .set_item(&record_key(&self.prefix, document_id), &json)
            .map_err(js_storage_error)
    }

    fn remove(&mut self, document_id: &str) -> Result<(), CropError> {
        self.storage()?
            .remove_item(&record_key(&self.prefix, document_id))
            .map_err(js_storage_error)
    }

    fn documents(&self) -> Result<Vec<String>, CropError> {
        let storage = self.storage()?;
        let len = storage.length().map_err(js_storage_error)?;

        let mut ids = Vec::new();
        for i in 0..len {
            if let Some(key) = storage.key(i).map_err(js_storage_error)? {
                if let Some(id) = document_id_from_key(&self.prefix, &key) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let key = record_key("pdfcrop", "abc-123");
        assert_eq!(key, "pdfcrop:doc:abc-123");
        assert_eq!(document_id_from_key("pdfcrop", &key), Some("abc-123"));
    }

    #[test]
    fn test_foreign_keys_are_ignored() {
        assert_eq!(document_id_from_key("pdfcrop", "other:doc:abc"), None);
        assert_eq!(document_id_from_key("pdfcrop", "pdfcrop:settings"), None);
        assert_eq!(document_id_from_key("pdfcrop", "pdfcrop:doc:"), None);
    }
}
