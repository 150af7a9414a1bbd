//! Visual PDF cropping
//!
//! Crop rectangles are drawn on a rendered page preview, stored per document
//! as ratios of the page, and written into each exported page's CropBox.
//!
//! - [`coords`]: display, canvas, ratio and PDF point conversions
//! - [`store`]: crop presets and per-page applied presets over a pluggable backend
//! - [`editor`]: pointer gesture state machine (draw, move, resize)
//! - [`export`]: cropped copy of a page range via lopdf
//! - [`session`]: the active document tying it all together

pub mod blob;
pub mod config;
pub mod coords;
pub mod editor;
pub mod error;
pub mod export;
pub mod geometry;
pub mod preset;
pub mod render;
pub mod session;
pub mod store;

pub use blob::{BinaryStore, DisplayHandles, DocumentMeta, MemoryBinaryStore, NoDisplayHandles};
pub use config::CropConfig;
pub use coords::{PdfRect, PercentRect, Size};
pub use editor::{EditorEffect, HitTarget, PointerEvent, ResizeHandle};
pub use error::CropError;
pub use export::{export_cropped, output_filename, ExportOutput, PageRange};
pub use geometry::{validate_pdf, PageGeometry, PdfInfo};
pub use preset::{CropPreset, PartialRect, RatioPoint, RatioRect, Workspace};
pub use render::{RenderTicket, RenderedPage};
pub use session::{CropSession, PointerOutcome};
pub use store::{MemoryBackend, PresetBackend, PresetStore};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, CropError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| CropError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// lopdf fixtures shared by unit tests, integration tests and the wasm crate
#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream};

    fn letter_box() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(612),
            Object::Integer(792),
        ])
    }

    /// Letter-sized pages, each showing "Page N"
    pub fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        create_test_pdf_with(num_pages, |_| {})
    }

    /// Like [`create_test_pdf`], with a hook to edit each page dictionary
    pub fn create_test_pdf_with(num_pages: u32, mut edit: impl FnMut(&mut Dictionary)) -> Vec<u8> {
        build(num_pages, false, |page| {
            page.set("MediaBox", letter_box());
            edit(page);
        })
    }

    /// Letter-sized pages whose MediaBox is only on the page tree root
    pub fn create_test_pdf_inherited(num_pages: u32) -> Vec<u8> {
        build(num_pages, true, |_| {})
    }

    fn build(
        num_pages: u32,
        media_box_on_root: bool,
        mut edit: impl FnMut(&mut Dictionary),
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();

        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                    ),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let mut page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]);
            edit(&mut page);
            page_ids.push(doc.add_object(page));
        }

        let mut pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        if media_box_on_root {
            pages.set("MediaBox", letter_box());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
