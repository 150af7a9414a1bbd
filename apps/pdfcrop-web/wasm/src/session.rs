//! Stateful crop session exposed to JavaScript
//!
//! Wraps the core session with browser storage: presets in localStorage,
//! document bytes in memory, previews through blob URLs. Native builds (and
//! tests) swap in the in-memory backends.

use crate::{to_js, to_js_error};
use pdfcrop_core::blob::{BinaryStore, DocumentMeta, MemoryBinaryStore};
use pdfcrop_core::coords::{
    contain_fit, display_to_ratio, format_percent_rect, ratio_to_canvas_pixels,
};
use pdfcrop_core::{
    CropConfig, CropError, CropPreset, HitTarget, PageRange, PartialRect, PointerEvent,
    PointerOutcome, RatioPoint, RatioRect, RenderTicket, RenderedPage, ResizeHandle, Size,
    Workspace,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
type Backend = crate::LocalStorageBackend;
#[cfg(not(target_arch = "wasm32"))]
type Backend = pdfcrop_core::MemoryBackend;

#[cfg(target_arch = "wasm32")]
type Handles = crate::BlobUrlHandles;
#[cfg(not(target_arch = "wasm32"))]
type Handles = pdfcrop_core::NoDisplayHandles;

type Inner = pdfcrop_core::CropSession<MemoryBinaryStore, Backend, Handles>;

#[cfg(target_arch = "wasm32")]
fn backends(config: &CropConfig) -> (Backend, Handles) {
    (
        crate::LocalStorageBackend::new(&config.storage_prefix),
        crate::BlobUrlHandles::new(),
    )
}

#[cfg(not(target_arch = "wasm32"))]
fn backends(_config: &CropConfig) -> (Backend, Handles) {
    (pdfcrop_core::MemoryBackend::new(), pdfcrop_core::NoDisplayHandles::default())
}

/// Pointer result for JS: what was committed plus what to draw
#[derive(Serialize)]
struct PointerReply {
    created: Option<CropPreset>,
    updated: Option<CropPreset>,
    error: Option<String>,
    /// Rectangle to draw while a gesture is active
    preview: Option<RatioRect>,
    selected: Option<String>,
}

/// Cropped document ready for download
#[wasm_bindgen]
pub struct ExportResult {
    bytes: Vec<u8>,
    filename: String,
    page_count: u32,
}

#[wasm_bindgen]
impl ExportResult {
    #[wasm_bindgen(getter)]
    pub fn bytes(&self) -> js_sys::Uint8Array {
        let array = js_sys::Uint8Array::new_with_length(self.bytes.len() as u32);
        array.copy_from(&self.bytes);
        array
    }

    #[wasm_bindgen(getter)]
    pub fn filename(&self) -> String {
        self.filename.clone()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}

#[wasm_bindgen]
pub struct CropSession {
    inner: Inner,
}

impl CropSession {
    /// Build a session from a config (testable without JsValue)
    pub fn with_config(config: CropConfig) -> Result<Self, CropError> {
        let (backend, handles) = backends(&config);
        let inner = Inner::new(config, MemoryBinaryStore::new(), backend, handles)?;
        Ok(Self { inner })
    }

    fn load_document_internal(&mut self, name: &str, bytes: &[u8]) -> Result<Workspace, CropError> {
        self.inner.load_document(name, bytes.to_vec())
    }

    fn restore_document_internal(
        &mut self,
        document_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<Workspace, CropError> {
        let page_count = pdfcrop_core::get_page_count(bytes)?;
        let already_active = self.inner.document_id() == Some(document_id);
        self.inner.blobs_mut().insert(
            document_id,
            bytes.to_vec(),
            DocumentMeta {
                name: name.to_string(),
                page_count,
            },
        );

        let restored = self.inner.restore_document(document_id);
        if restored.is_err() && !already_active {
            self.inner.blobs_mut().delete(document_id)?;
        }
        restored
    }

    fn pointer_internal(
        &mut self,
        event: PointerEvent,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<PointerOutcome, CropError> {
        self.inner
            .pointer(event, Size::new(canvas_width, canvas_height))
    }

    fn reply(&self, outcome: PointerOutcome) -> Result<JsValue, JsValue> {
        to_js(&PointerReply {
            created: outcome.created,
            updated: outcome.updated,
            error: outcome.error.map(|e| e.to_string()),
            preview: self.inner.editor().state().preview(),
            selected: self.inner.selected().map(str::to_string),
        })
    }

    fn export_internal(
        &self,
        preset_id: Option<&str>,
        start: Option<u32>,
        end: Option<u32>,
    ) -> Result<ExportResult, CropError> {
        let range = match (start, end) {
            (Some(start), Some(end)) => Some(PageRange::new(start, end)),
            (Some(page), None) | (None, Some(page)) => Some(PageRange::single(page)),
            (None, None) => None,
        };
        let output = self.inner.export(preset_id, range)?;
        Ok(ExportResult {
            bytes: output.bytes,
            filename: output.filename,
            page_count: output.page_count,
        })
    }
}

fn target(preset_id: Option<String>, handle: Option<String>) -> Result<HitTarget, CropError> {
    match (preset_id, handle) {
        (None, _) => Ok(HitTarget::Empty),
        (Some(id), None) => Ok(HitTarget::PresetBody(id)),
        (Some(id), Some(name)) => ResizeHandle::parse(&name)
            .map(|handle| HitTarget::Handle(id, handle))
            .ok_or_else(|| CropError::InvalidGeometry(format!("Unknown resize handle: {}", name))),
    }
}

#[wasm_bindgen]
impl CropSession {
    /// Create a session; `config` may be undefined or a partial config object
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<CropSession, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            CropConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid configuration: {}", e)))?
        };
        Self::with_config(config).map_err(to_js_error)
    }

    /// Upload a document, replacing the current one. Returns the workspace.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let workspace = self
            .load_document_internal(name, bytes)
            .map_err(to_js_error)?;
        to_js(&workspace)
    }

    /// Reopen a document read back from the vault, with its saved presets
    #[wasm_bindgen(js_name = restoreDocument)]
    pub fn restore_document(
        &mut self,
        document_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<JsValue, JsValue> {
        let workspace = self
            .restore_document_internal(document_id, name, bytes)
            .map_err(to_js_error)?;
        to_js(&workspace)
    }

    pub fn reset(&mut self) -> Result<(), JsValue> {
        self.inner.reset().map_err(to_js_error)
    }

    /// Ids of documents dropped since the last call; pass them to
    /// `DocumentVault.forget` so the vault does not keep stale bytes
    #[wasm_bindgen(js_name = takeReleasedDocuments)]
    pub fn take_released_documents(&mut self) -> Vec<String> {
        self.inner.take_released()
    }

    #[wasm_bindgen(js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    #[wasm_bindgen(js_name = documentId)]
    pub fn document_id(&self) -> Option<String> {
        self.inner.document_id().map(str::to_string)
    }

    pub fn workspace(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.workspace().map_err(to_js_error)?)
    }

    /// Blob URL for pdf.js, created on first call
    #[wasm_bindgen(js_name = displayHandle)]
    pub fn display_handle(&mut self) -> Result<String, JsValue> {
        self.inner.display_handle().map_err(to_js_error)
    }

    // Presets

    #[wasm_bindgen(js_name = createPreset)]
    pub fn create_preset(
        &mut self,
        name: Option<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<JsValue, JsValue> {
        let preset = self
            .inner
            .create_preset(name.as_deref(), RatioRect::new(x, y, width, height))
            .map_err(to_js_error)?;
        to_js(&preset)
    }

    /// Delete a preset; returns the pages whose applied preset was cleared
    #[wasm_bindgen(js_name = deletePreset)]
    pub fn delete_preset(&mut self, preset_id: &str) -> Result<Vec<u32>, JsValue> {
        self.inner.delete_preset(preset_id).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = renamePreset)]
    pub fn rename_preset(&mut self, preset_id: &str, name: &str) -> Result<JsValue, JsValue> {
        to_js(&self.inner.rename_preset(preset_id, name).map_err(to_js_error)?)
    }

    /// Merge `{ x?, y?, width?, height? }` over the stored geometry
    #[wasm_bindgen(js_name = updatePreset)]
    pub fn update_preset(&mut self, preset_id: &str, partial: JsValue) -> Result<JsValue, JsValue> {
        let partial: PartialRect = serde_wasm_bindgen::from_value(partial)
            .map_err(|e| JsValue::from_str(&format!("Invalid geometry: {}", e)))?;
        to_js(&self.inner.update_preset(preset_id, partial).map_err(to_js_error)?)
    }

    #[wasm_bindgen(js_name = applyPreset)]
    pub fn apply_preset(&mut self, page: u32, preset_id: &str) -> Result<(), JsValue> {
        self.inner.apply_preset(page, preset_id).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = clearPage)]
    pub fn clear_page(&mut self, page: u32) -> Result<(), JsValue> {
        self.inner.clear_page(page).map_err(to_js_error)
    }

    pub fn select(&mut self, preset_id: Option<String>) -> Result<(), JsValue> {
        self.inner.select(preset_id.as_deref()).map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn selected(&self) -> Option<String> {
        self.inner.selected().map(str::to_string)
    }

    /// Preset geometry as CropBox percentages, formatted for the clipboard
    #[wasm_bindgen(js_name = cropBoxPercent)]
    pub fn crop_box_percent(&self, preset_id: &str) -> Result<String, JsValue> {
        let pct = self.inner.crop_box_percent(preset_id).map_err(to_js_error)?;
        Ok(format_percent_rect(&pct))
    }

    /// Preset rectangle in canvas pixels, for drawing the overlay
    #[wasm_bindgen(js_name = presetPixels)]
    pub fn preset_pixels(
        &self,
        preset_id: &str,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<JsValue, JsValue> {
        let preset = self
            .inner
            .presets()
            .map_err(to_js_error)?
            .into_iter()
            .find(|p| p.id == preset_id)
            .ok_or_else(|| to_js_error(CropError::PresetNotFound(preset_id.to_string())))?;
        to_js(&ratio_to_canvas_pixels(
            &preset.rect(),
            Size::new(canvas_width, canvas_height),
        ))
    }

    // Pages and rendering

    #[wasm_bindgen(js_name = currentPage)]
    pub fn current_page(&self) -> Result<u32, JsValue> {
        self.inner.current_page().map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = setCurrentPage)]
    pub fn set_current_page(&mut self, page: u32) -> Result<(), JsValue> {
        self.inner.set_current_page(page).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = previewPages)]
    pub fn preview_pages(&self) -> Result<Vec<u32>, JsValue> {
        self.inner.preview_pages().map_err(to_js_error)
    }

    /// Ticket `{ generation, page, target_width }` for rendering the current page
    #[wasm_bindgen(js_name = beginRender)]
    pub fn begin_render(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.begin_render().map_err(to_js_error)?)
    }

    /// Returns false when the ticket is stale and the render was discarded
    #[wasm_bindgen(js_name = finishRender)]
    pub fn finish_render(&mut self, ticket: JsValue, page: JsValue) -> Result<bool, JsValue> {
        let ticket: RenderTicket = serde_wasm_bindgen::from_value(ticket)?;
        let page: RenderedPage = serde_wasm_bindgen::from_value(page)?;
        let accepted = self
            .inner
            .finish_render(ticket, Ok(page))
            .map_err(to_js_error)?;
        Ok(accepted.is_some())
    }

    #[wasm_bindgen(js_name = failRender)]
    pub fn fail_render(&mut self, ticket: JsValue, message: &str) -> Result<(), JsValue> {
        let ticket: RenderTicket = serde_wasm_bindgen::from_value(ticket)?;
        self.inner
            .finish_render(ticket, Err(message.to_string()))
            .map(|_| ())
            .map_err(to_js_error)
    }

    // Gestures

    /// Where a page of `content` size sits inside the preview element, as
    /// `[offset_x, offset_y, width, height]`
    #[wasm_bindgen(js_name = containFit)]
    pub fn contain_fit(
        container_width: f64,
        container_height: f64,
        content_width: f64,
        content_height: f64,
    ) -> Vec<f64> {
        let fit = contain_fit(
            Size::new(container_width, container_height),
            Size::new(content_width, content_height),
        );
        vec![fit.offset_x, fit.offset_y, fit.width, fit.height]
    }

    /// Map a pointer on the letterboxed preview to ratio space, as `[x, y]`
    #[wasm_bindgen(js_name = displayToRatio)]
    pub fn display_to_ratio(
        pointer_x: f64,
        pointer_y: f64,
        display_width: f64,
        display_height: f64,
        offset_x: f64,
        offset_y: f64,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Vec<f64> {
        let point = display_to_ratio(
            (pointer_x, pointer_y),
            Size::new(display_width, display_height),
            (offset_x, offset_y),
            Size::new(canvas_width, canvas_height),
        );
        vec![point.x, point.y]
    }

    /// `preset_id` null means empty space; `handle` is one of n, s, e, w, ne, nw, se, sw
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(
        &mut self,
        x: f64,
        y: f64,
        preset_id: Option<String>,
        handle: Option<String>,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<JsValue, JsValue> {
        let target = target(preset_id, handle).map_err(to_js_error)?;
        let event = PointerEvent::Down {
            point: RatioPoint::new(x, y),
            target,
        };
        let outcome = self
            .pointer_internal(event, canvas_width, canvas_height)
            .map_err(to_js_error)?;
        self.reply(outcome)
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(
        &mut self,
        x: f64,
        y: f64,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<JsValue, JsValue> {
        let event = PointerEvent::Move {
            point: RatioPoint::new(x, y),
        };
        let outcome = self
            .pointer_internal(event, canvas_width, canvas_height)
            .map_err(to_js_error)?;
        self.reply(outcome)
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(
        &mut self,
        x: f64,
        y: f64,
        canvas_width: f64,
        canvas_height: f64,
    ) -> Result<JsValue, JsValue> {
        let event = PointerEvent::Up {
            point: RatioPoint::new(x, y),
        };
        let outcome = self
            .pointer_internal(event, canvas_width, canvas_height)
            .map_err(to_js_error)?;
        self.reply(outcome)
    }

    #[wasm_bindgen(js_name = pointerLeave)]
    pub fn pointer_leave(&mut self) -> Result<JsValue, JsValue> {
        let outcome = self
            .pointer_internal(PointerEvent::Leave, 0.0, 0.0)
            .map_err(to_js_error)?;
        self.reply(outcome)
    }

    // Export

    /// Export with the given preset (or the page's applied / first preset).
    /// Pass `start`/`end` for a sub-range; omit both for the whole document.
    #[wasm_bindgen(js_name = exportCropped)]
    pub fn export_cropped(
        &self,
        preset_id: Option<String>,
        start: Option<u32>,
        end: Option<u32>,
    ) -> Result<ExportResult, JsValue> {
        self.export_internal(preset_id.as_deref(), start, end)
            .map_err(to_js_error)
    }
}
