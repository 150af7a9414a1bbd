//! Cropped export
//!
//! Applies a ratio rectangle as the CropBox of every selected page. Content
//! streams are left alone: cropping only changes the visible region.

use crate::coords::{ratio_to_pdf_points, unrotate_ratio_rect, PdfRect};
use crate::error::CropError;
use crate::geometry::PageGeometry;
use crate::preset::RatioRect;
use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Inclusive, 1-based page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Lenient normalization for user input: pull both ends into `[1, total]`
    /// and keep `end >= start`
    pub fn clamp_to(&self, total: u32) -> Self {
        let total = total.max(1);
        let start = self.start.min(total).max(1);
        let end = self.end.min(total).max(start);
        Self { start, end }
    }

    /// Strict check used before exporting
    pub fn validate(&self, total: u32) -> Result<(), CropError> {
        if self.start == 0 {
            return Err(CropError::InvalidRange("Page numbers must be >= 1".into()));
        }
        if self.start > self.end {
            return Err(CropError::InvalidRange(format!(
                "Start {} > end {}",
                self.start, self.end
            )));
        }
        if self.end > total {
            return Err(CropError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                self.end, total
            )));
        }
        Ok(())
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn len(&self) -> u32 {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn covers(&self, total: u32) -> bool {
        self.start == 1 && self.end == total
    }
}

/// Result of an export, ready for download
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub page_count: u32,
}

/// Produce a new document holding only the selected pages, each cropped to `rect`
///
/// 1. Validate the range before touching any page
/// 2. Drop every page outside the range
/// 3. Write each remaining page's CropBox from its own MediaBox
/// 4. Prune orphaned objects and serialize
pub fn export_cropped(
    bytes: &[u8],
    rect: &RatioRect,
    range: Option<PageRange>,
) -> Result<Vec<u8>, CropError> {
    rect.validate()?;

    let doc = Document::load_mem(bytes).map_err(|e| CropError::Parse(e.to_string()))?;
    let page_count = doc.get_pages().len() as u32;

    let range = match range {
        Some(range) => {
            range.validate(page_count)?;
            range
        }
        None => PageRange::new(1, page_count),
    };

    let mut new_doc = doc;

    let pages_to_keep: HashSet<u32> = range.pages().collect();
    let mut pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| !pages_to_keep.contains(p))
        .collect();

    // Delete in reverse order to keep page numbers stable
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    let kept = new_doc.get_pages();
    for (&page_num, &page_id) in kept.iter() {
        let geometry = PageGeometry::from_document(&new_doc, page_num)?;
        let crop = crop_box_for(&geometry, rect);

        let page = new_doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| CropError::Operation(format!("Page {}: {}", page_num, e)))?;
        page.set("CropBox", box_object(&crop));
    }

    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| CropError::Operation(format!("Save failed: {}", e)))?;

    tracing::info!(
        pages = kept.len(),
        start = range.start,
        end = range.end,
        "Exported cropped document"
    );
    Ok(buffer)
}

/// Absolute CropBox for a page
///
/// `rect` is drawn on the page as displayed, so `/Rotate` is undone first.
/// The result is in MediaBox space, shifted by the MediaBox origin.
pub fn crop_box_for(geometry: &PageGeometry, rect: &RatioRect) -> PdfRect {
    let media = geometry.media_box;
    let rect = unrotate_ratio_rect(rect, geometry.rotation);
    ratio_to_pdf_points(&rect, media.width, media.height).translate(media.x, media.y)
}

fn box_object(rect: &PdfRect) -> Object {
    Object::Array(
        rect.to_box_array()
            .iter()
            .map(|v| Object::Real(*v as _))
            .collect(),
    )
}

/// `report.pdf` -> `report_cropped.pdf`, plus `_page{N}` / `_pages{a}-{b}` for sub-ranges
pub fn output_filename(original: &str, range: Option<PageRange>, total: u32) -> String {
    let trimmed = original.trim();
    let stem = match trimmed.len().checked_sub(4) {
        Some(cut)
            if trimmed
                .get(cut..)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(".pdf")) =>
        {
            &trimmed[..cut]
        }
        _ => trimmed,
    };
    let stem = if stem.is_empty() { "document" } else { stem };

    let suffix = match range {
        Some(range) if !range.covers(total) => {
            if range.start == range.end {
                format!("_page{}", range.start)
            } else {
                format!("_pages{}-{}", range.start, range.end)
            }
        }
        _ => String::new(),
    };

    format!("{}_cropped{}.pdf", stem, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, create_test_pdf_with};
    use pretty_assertions::assert_eq;

    fn crop_box_of(doc: &Document, page_num: u32) -> [f64; 4] {
        let page_id = doc.get_pages()[&page_num];
        let array = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .and_then(|d| d.get(b"CropBox"))
            .and_then(Object::as_array)
            .unwrap();
        crate::geometry::parse_box_array(array).unwrap()
    }

    fn assert_box_close(actual: [f64; 4], expected: [f64; 4]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            // CropBox values are stored as f32 reals
            assert!((a - e).abs() < 1e-3, "expected {:?}, got {:?}", expected, actual);
        }
    }

    #[test]
    fn test_export_all_pages() {
        let pdf = create_test_pdf(5);
        let rect = RatioRect::new(0.1, 0.1, 0.5, 0.5);

        let result = export_cropped(&pdf, &rect, None).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
        for page in 1..=5 {
            assert_box_close(crop_box_of(&doc, page), [61.2, 316.8, 367.2, 712.8]);
        }
    }

    #[test]
    fn test_export_single_page_range() {
        let pdf = create_test_pdf(5);
        let rect = RatioRect::new(0.0, 0.0, 1.0, 0.5);

        let result = export_cropped(&pdf, &rect, Some(PageRange::single(2))).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_box_close(crop_box_of(&doc, 1), [0.0, 396.0, 612.0, 792.0]);
    }

    #[test]
    fn test_export_keeps_content_streams() {
        let pdf = create_test_pdf(3);
        let rect = RatioRect::new(0.1, 0.1, 0.5, 0.5);

        let result = export_cropped(&pdf, &rect, Some(PageRange::new(2, 3))).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let first = doc.get_pages()[&1];
        let content = doc.get_page_content(first).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("Page 2"), "content was {}", text);
    }

    #[test]
    fn test_export_uses_each_pages_own_size() {
        let pdf = create_test_pdf_with(2, |page| {
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(842),
                    Object::Integer(595),
                ]),
            );
        });
        let rect = RatioRect::new(0.0, 0.0, 0.5, 0.5);

        let result = export_cropped(&pdf, &rect, None).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        assert_box_close(crop_box_of(&doc, 1), [0.0, 297.5, 421.0, 595.0]);
    }

    #[test]
    fn test_export_offsets_by_media_box_origin() {
        let pdf = create_test_pdf_with(1, |page| {
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(100),
                    Object::Integer(50),
                    Object::Integer(300),
                    Object::Integer(250),
                ]),
            );
        });
        let rect = RatioRect::new(0.5, 0.5, 0.5, 0.5);

        let result = export_cropped(&pdf, &rect, None).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        assert_box_close(crop_box_of(&doc, 1), [200.0, 50.0, 300.0, 150.0]);
    }

    #[test]
    fn test_export_maps_rotated_view_back_to_page() {
        let pdf = create_test_pdf_with(1, |page| {
            page.set("Rotate", Object::Integer(90));
        });

        // Left half of the clockwise-rotated view is the bottom half of the page
        let left_half = RatioRect::new(0.0, 0.0, 0.5, 1.0);
        let result = export_cropped(&pdf, &left_half, None).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_box_close(crop_box_of(&doc, 1), [0.0, 0.0, 612.0, 396.0]);

        // Top strip of the view is the page's left edge
        let top_strip = RatioRect::new(0.0, 0.0, 1.0, 0.25);
        let result = export_cropped(&pdf, &top_strip, None).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_box_close(crop_box_of(&doc, 1), [0.0, 0.0, 153.0, 792.0]);
    }

    #[test]
    fn test_export_rejects_invalid_ranges() {
        let pdf = create_test_pdf(5);
        let rect = RatioRect::new(0.1, 0.1, 0.5, 0.5);

        for range in [
            PageRange::new(0, 2),
            PageRange::new(4, 2),
            PageRange::new(3, 6),
        ] {
            assert!(matches!(
                export_cropped(&pdf, &rect, Some(range)),
                Err(CropError::InvalidRange(_))
            ));
        }
    }

    #[test]
    fn test_export_rejects_degenerate_rect() {
        let pdf = create_test_pdf(1);
        let rect = RatioRect::new(0.1, 0.1, 0.0, 0.5);
        assert!(matches!(
            export_cropped(&pdf, &rect, None),
            Err(CropError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_export_rejects_garbage() {
        let rect = RatioRect::new(0.1, 0.1, 0.5, 0.5);
        assert!(matches!(
            export_cropped(b"not a pdf", &rect, None),
            Err(CropError::Parse(_))
        ));
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(PageRange::new(0, 9).clamp_to(5), PageRange::new(1, 5));
        assert_eq!(PageRange::new(7, 2).clamp_to(5), PageRange::new(5, 5));
        assert_eq!(PageRange::new(4, 2).clamp_to(5), PageRange::new(4, 4));
        assert_eq!(PageRange::new(2, 3).clamp_to(5), PageRange::new(2, 3));
    }

    #[test]
    fn test_range_len() {
        assert_eq!(PageRange::new(2, 4).len(), 3);
        assert_eq!(PageRange::single(3).len(), 1);
        assert_eq!(PageRange::new(0, u32::MAX).len(), u32::MAX);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = PageRange::new(3, 1);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(range.pages().count(), 0);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("report.pdf", None, 5), "report_cropped.pdf");
        assert_eq!(output_filename("Scan.PDF", None, 5), "Scan_cropped.pdf");
        assert_eq!(
            output_filename("report.pdf", Some(PageRange::single(2)), 5),
            "report_cropped_page2.pdf"
        );
        assert_eq!(
            output_filename("report.pdf", Some(PageRange::new(2, 4)), 5),
            "report_cropped_pages2-4.pdf"
        );
        assert_eq!(
            output_filename("report.pdf", Some(PageRange::new(1, 5)), 5),
            "report_cropped.pdf"
        );
        assert_eq!(output_filename("notes", None, 1), "notes_cropped.pdf");
        assert_eq!(output_filename(".pdf", None, 1), "document_cropped.pdf");
        assert_eq!(output_filename("résumé.pdf", None, 1), "résumé_cropped.pdf");
    }
}
