//! Page geometry and document validation
//!
//! Reads MediaBox, CropBox and rotation for each page, and validates uploads
//! before they enter a workspace.

use crate::coords::PdfRect;
use crate::error::CropError;
use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

/// US Letter, used when a page tree carries no MediaBox at all
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Geometry of a single page, in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Page number (1-indexed)
    pub page_num: u32,
    pub media_box: PdfRect,
    /// Falls back to the MediaBox when absent or malformed
    pub crop_box: PdfRect,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

impl PageGeometry {
    pub fn from_document(doc: &Document, page_num: u32) -> Result<Self, CropError> {
        let pages = doc.get_pages();
        let page_id = pages
            .get(&page_num)
            .ok_or_else(|| CropError::InvalidRange(format!("Page {} not found", page_num)))?;

        let page_dict = doc
            .get_object(*page_id)
            .and_then(Object::as_dict)
            .map_err(|_| CropError::Parse(format!("Page {} is not a dictionary", page_num)))?;

        let media_box = inherited_box(doc, page_dict, b"MediaBox")
            .map(PdfRect::from_box_array)
            .unwrap_or_else(|| PdfRect::from_box_array(DEFAULT_MEDIA_BOX));

        let crop_box = match inherited_box(doc, page_dict, b"CropBox") {
            Some(values) => PdfRect::from_box_array(values),
            None => media_box,
        };
        // A CropBox without area is as good as missing
        let crop_box = if crop_box.width > 0.0 && crop_box.height > 0.0 {
            crop_box
        } else {
            tracing::warn!(page_num, "Ignoring degenerate CropBox");
            media_box
        };

        Ok(Self {
            page_num,
            media_box,
            crop_box,
            rotation: get_rotation(doc, page_dict),
        })
    }

}

/// Look up a page box, walking up the page tree for inherited values.
///
/// Malformed boxes are treated as absent.
fn inherited_box(doc: &Document, page_dict: &Dictionary, key: &[u8]) -> Option<[f64; 4]> {
    let mut current = page_dict;
    // Bounded walk so a cyclic Parent chain cannot hang
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            let resolved = resolve(doc, value);
            return match resolved.and_then(|obj| obj.as_array().ok()) {
                Some(array) => parse_box_array(array).ok(),
                None => None,
            };
        }
        let parent_id = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_object(parent_id).and_then(Object::as_dict).ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Parse a box array [x1, y1, x2, y2]
pub fn parse_box_array(array: &[Object]) -> Result<[f64; 4], CropError> {
    if array.len() != 4 {
        return Err(CropError::Parse("Page box must have 4 elements".to_string()));
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => {
                return Err(CropError::Parse(format!(
                    "Page box element {} is not a number",
                    i
                )))
            }
        };
    }

    Ok(result)
}

/// Get rotation from page, inheriting from parent if necessary
fn get_rotation(doc: &Document, page_dict: &Dictionary) -> i32 {
    if let Ok(rotate) = page_dict.get(b"Rotate") {
        if let Ok(angle) = rotate.as_i64() {
            return normalize_rotation(angle as i32);
        }
    }

    if let Ok(parent_id) = page_dict.get(b"Parent").and_then(Object::as_reference) {
        if let Ok(parent_dict) = doc.get_object(parent_id).and_then(Object::as_dict) {
            if let Ok(angle) = parent_dict.get(b"Rotate").and_then(Object::as_i64) {
                return normalize_rotation(angle as i32);
            }
        }
    }

    0
}

/// Normalize rotation to 0, 90, 180, or 270
fn normalize_rotation(angle: i32) -> i32 {
    let normalized = angle % 360;
    if normalized < 0 {
        normalized + 360
    } else {
        normalized
    }
}

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default)]
pub struct PdfInfo {
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Validate an uploaded PDF and extract basic info
pub fn validate_pdf(bytes: &[u8]) -> Result<(Document, PdfInfo), CropError> {
    if bytes.len() < 8 {
        return Err(CropError::Parse("File too small to be a valid PDF".to_string()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(CropError::Parse(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }

    let document = Document::load_mem(bytes).map_err(|e| CropError::Parse(e.to_string()))?;

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(CropError::Parse("PDF has no pages".to_string()));
    }

    let info = PdfInfo {
        page_count,
        version: extract_version(bytes),
        encrypted: document.is_encrypted(),
        size_bytes: bytes.len(),
        title: info_string(&document, b"Title"),
        author: info_string(&document, b"Author"),
    };

    Ok((document, info))
}

/// Header and trailer sanity check without parsing, for large files
pub fn quick_validate(bytes: &[u8]) -> Result<(), CropError> {
    if bytes.len() < 8 || !bytes.starts_with(b"%PDF-") {
        return Err(CropError::Parse(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }

    let tail = if bytes.len() > 1024 {
        &bytes[bytes.len() - 1024..]
    } else {
        bytes
    };

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(CropError::Parse(
            "PDF appears truncated (missing %%EOF marker)".to_string(),
        ));
    }

    Ok(())
}

fn extract_version(bytes: &[u8]) -> String {
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

/// A string entry from the trailer's Info dictionary
fn info_string(document: &Document, key: &[u8]) -> Option<String> {
    let info_id = document.trailer.get(b"Info").and_then(Object::as_reference).ok()?;
    let info = document.get_object(info_id).and_then(Object::as_dict).ok()?;
    let value = info.get(key).and_then(Object::as_str).ok()?;
    let decoded = String::from_utf8_lossy(value);
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}

/// Pages offered for preview: the first `cap` pages, in order
pub fn preview_pages(total: u32, cap: u32) -> Vec<u32> {
    (1..=total.min(cap)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, create_test_pdf_with};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
    }

    #[test]
    fn test_parse_box_array() {
        let array = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(612.0),
            Object::Real(792.0),
        ];
        assert_eq!(parse_box_array(&array).unwrap(), [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_parse_box_array_rejects_short() {
        let array = vec![Object::Integer(0), Object::Integer(0)];
        assert!(parse_box_array(&array).is_err());
    }

    #[test]
    fn test_crop_box_defaults_to_media_box() {
        let doc = Document::load_mem(&create_test_pdf(1)).unwrap();
        let geometry = PageGeometry::from_document(&doc, 1).unwrap();
        assert_eq!(geometry.media_box, PdfRect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(geometry.crop_box, geometry.media_box);
        assert_eq!(geometry.rotation, 0);
    }

    #[test]
    fn test_reads_offset_crop_box() {
        let pdf = create_test_pdf_with(1, |page| {
            page.set(
                "CropBox",
                Object::Array(vec![
                    Object::Integer(36),
                    Object::Integer(36),
                    Object::Integer(576),
                    Object::Integer(756),
                ]),
            );
        });
        let doc = Document::load_mem(&pdf).unwrap();
        let geometry = PageGeometry::from_document(&doc, 1).unwrap();
        assert_eq!(geometry.crop_box, PdfRect::new(36.0, 36.0, 540.0, 720.0));
    }

    #[test]
    fn test_malformed_crop_box_falls_back() {
        let pdf = create_test_pdf_with(1, |page| {
            page.set("CropBox", Object::Array(vec![Object::Integer(1)]));
        });
        let doc = Document::load_mem(&pdf).unwrap();
        let geometry = PageGeometry::from_document(&doc, 1).unwrap();
        assert_eq!(geometry.crop_box, geometry.media_box);
    }

    #[test]
    fn test_missing_page_is_invalid_range() {
        let doc = Document::load_mem(&create_test_pdf(2)).unwrap();
        assert!(matches!(
            PageGeometry::from_document(&doc, 3),
            Err(CropError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_validate_pdf_counts_pages() {
        let (_, info) = validate_pdf(&create_test_pdf(5)).unwrap();
        assert_eq!(info.page_count, 5);
        assert_eq!(info.version, "1.7");
        assert!(!info.encrypted);
    }

    #[test]
    fn test_validate_pdf_rejects_garbage() {
        assert!(validate_pdf(b"not a valid pdf").is_err());
        assert!(validate_pdf(b"tiny").is_err());
    }

    #[test]
    fn test_quick_validate() {
        assert!(quick_validate(&create_test_pdf(1)).is_ok());
        assert!(quick_validate(b"%PDF-1.7\nno trailer here").is_err());
    }

    #[test]
    fn test_preview_pages_is_deterministic_prefix() {
        assert_eq!(preview_pages(3, 50), vec![1, 2, 3]);
        assert_eq!(preview_pages(100, 4), vec![1, 2, 3, 4]);
        assert!(preview_pages(0, 4).is_empty());
    }
}
