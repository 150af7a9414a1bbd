//! WASM bindings for the visual PDF cropper
//!
//! All editing state lives in Rust behind [`CropSession`]. JavaScript renders
//! pages with pdf.js, forwards pointer events in ratio space and downloads
//! the exported bytes.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { CropSession, openVault } from './pkg/pdfcrop_wasm.js';
//!
//! await init();
//!
//! const session = new CropSession({ max_presets: 3 });
//! const workspace = session.loadDocument("report.pdf", bytes);
//! const url = session.displayHandle();            // blob: URL for pdf.js
//!
//! const ticket = session.beginRender();
//! const page = await renderWithPdfJs(url, ticket.page, ticket.target_width);
//! session.finishRender(ticket, page);            // ignored if stale
//!
//! session.pointerDown(x, y, null, null, canvasW, canvasH);
//! session.pointerMove(x2, y2, canvasW, canvasH);
//! const outcome = session.pointerUp(x2, y2, canvasW, canvasH);
//!
//! const result = session.exportCropped(null, 2, 2);
//! download(result.bytes, result.filename);
//!
//! // Keep the bytes across reloads, and drop them with the workspace
//! const vault = await openVault();
//! await vault.storeDocument(workspace.document_id, "report.pdf", workspace.total_pages, bytes);
//! session.reset();
//! await vault.forget(session.takeReleasedDocuments());
//! ```

pub mod blob_url;
pub mod local_storage;
pub mod session;
pub mod vault;

use wasm_bindgen::prelude::*;

pub use blob_url::BlobUrlHandles;
pub use local_storage::LocalStorageBackend;
pub use session::{CropSession, ExportResult};
pub use vault::DocumentVault;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfcrop_core::geometry::quick_validate(bytes).map_err(to_js_error)
}

/// Get PDF info (page count, version, title) without creating a session
#[wasm_bindgen]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let (_, info) = pdfcrop_core::validate_pdf(bytes).map_err(to_js_error)?;
    to_js(&info)
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    pdfcrop_core::get_page_count(bytes).map_err(to_js_error)
}

/// Render canvas size for a page, as `[width, height]`
#[wasm_bindgen]
pub fn render_size(page_width: f64, page_height: f64, target_width: u32) -> Vec<u32> {
    let (width, height) = pdfcrop_core::coords::render_size(page_width, page_height, target_width);
    vec![width, height]
}

/// Normalize a user-typed page range into `[start, end]` within the document
#[wasm_bindgen]
pub fn clamp_range(start: u32, end: u32, total: u32) -> Vec<u32> {
    let range = pdfcrop_core::PageRange::new(start, end).clamp_to(total);
    vec![range.start, range.end]
}

pub(crate) fn to_js_error(e: pdfcrop_core::CropError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

pub(crate) fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_size_letter() {
        assert_eq!(render_size(612.0, 792.0, 900), vec![900, 1165]);
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(0, 99, 5), vec![1, 5]);
        assert_eq!(clamp_range(4, 2, 5), vec![4, 4]);
    }
}
