//! Document bytes and display handles
//!
//! The session never owns PDF bytes directly. They live in a [`BinaryStore`]
//! keyed by an opaque document id, and the preview reads them through a
//! revocable display handle (a blob URL in the browser).

use crate::error::CropError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata stored next to a document's bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub name: String,
    pub page_count: u32,
}

pub trait BinaryStore {
    /// Store bytes and return a fresh document id
    fn put(&mut self, bytes: Vec<u8>, meta: DocumentMeta) -> Result<String, CropError>;

    fn get(&self, document_id: &str) -> Result<Vec<u8>, CropError>;

    fn metadata(&self, document_id: &str) -> Result<DocumentMeta, CropError>;

    /// Deleting an unknown id is not an error
    fn delete(&mut self, document_id: &str) -> Result<(), CropError>;
}

#[derive(Debug, Default)]
pub struct MemoryBinaryStore {
    entries: HashMap<String, (Vec<u8>, DocumentMeta)>,
}

impl MemoryBinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put bytes back under a known id, e.g. after reading them from a persistent vault
    pub fn insert(&mut self, document_id: &str, bytes: Vec<u8>, meta: DocumentMeta) {
        self.entries.insert(document_id.to_string(), (bytes, meta));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BinaryStore for MemoryBinaryStore {
    fn put(&mut self, bytes: Vec<u8>, meta: DocumentMeta) -> Result<String, CropError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.entries.insert(id.clone(), (bytes, meta));
        Ok(id)
    }

    fn get(&self, document_id: &str) -> Result<Vec<u8>, CropError> {
        self.entries
            .get(document_id)
            .map(|(bytes, _)| bytes.clone())
            .ok_or(CropError::MissingDocument)
    }

    fn metadata(&self, document_id: &str) -> Result<DocumentMeta, CropError> {
        self.entries
            .get(document_id)
            .map(|(_, meta)| meta.clone())
            .ok_or(CropError::MissingDocument)
    }

    fn delete(&mut self, document_id: &str) -> Result<(), CropError> {
        self.entries.remove(document_id);
        Ok(())
    }
}

/// Creates and releases display handles for document bytes
pub trait DisplayHandles {
    fn create(&mut self, bytes: &[u8]) -> Result<String, CropError>;

    fn release(&mut self, handle: &str);
}

/// Handle provider for hosts that render straight from bytes
#[derive(Debug, Default)]
pub struct NoDisplayHandles {
    next: u64,
}

impl DisplayHandles for NoDisplayHandles {
    fn create(&mut self, _bytes: &[u8]) -> Result<String, CropError> {
        self.next += 1;
        Ok(format!("memory:{}", self.next))
    }

    fn release(&mut self, _handle: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> DocumentMeta {
        DocumentMeta {
            name: "a.pdf".into(),
            page_count: 2,
        }
    }

    #[test]
    fn test_put_get_delete() {
        let mut store = MemoryBinaryStore::new();
        let id = store.put(b"%PDF-1.7".to_vec(), meta()).unwrap();

        assert_eq!(store.get(&id).unwrap(), b"%PDF-1.7".to_vec());
        assert_eq!(store.metadata(&id).unwrap(), meta());

        store.delete(&id).unwrap();
        assert_eq!(store.get(&id), Err(CropError::MissingDocument));
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = MemoryBinaryStore::new();
        let a = store.put(Vec::new(), meta()).unwrap();
        let b = store.put(Vec::new(), meta()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_under_known_id() {
        let mut store = MemoryBinaryStore::new();
        store.insert("doc-1", b"%PDF-1.4".to_vec(), meta());
        assert_eq!(store.metadata("doc-1").unwrap().page_count, 2);
    }
}
