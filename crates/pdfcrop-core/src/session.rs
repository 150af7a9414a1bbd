//! Workspace session
//!
//! Owns the active document and wires the editor, preset store, preview
//! tracker and export together. Hosts construct one explicitly with their
//! own storage and display-handle implementations.

use crate::blob::{BinaryStore, DisplayHandles, DocumentMeta};
use crate::config::CropConfig;
use crate::coords::{
    pdf_points_to_crop_box_percent, pixels_to_ratio_size, PercentRect, Size,
};
use crate::editor::{Editor, EditorContext, EditorEffect, PointerEvent};
use crate::error::CropError;
use crate::export::{crop_box_for, export_cropped, output_filename, ExportOutput, PageRange};
use crate::geometry::{preview_pages, validate_pdf, PageGeometry};
use crate::preset::{default_preset_name, CropPreset, PageStates, PartialRect, RatioRect, Workspace};
use crate::render::{PreviewTracker, RenderTicket, RenderedPage};
use crate::store::{PresetBackend, PresetStore};
use serde::Serialize;

#[derive(Debug, Clone)]
struct ActiveDocument {
    id: String,
    name: String,
    total_pages: u32,
    current_page: u32,
    display_handle: Option<String>,
}

/// Result of feeding one pointer event through the session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointerOutcome {
    #[serde(skip)]
    pub effects: Vec<EditorEffect>,
    /// Preset created by this event, if a drawing gesture committed
    pub created: Option<CropPreset>,
    /// Preset whose geometry was committed by this event
    pub updated: Option<CropPreset>,
    /// Recoverable failure; the editor stays usable
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<CropError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<CropError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

pub struct CropSession<S: BinaryStore, P: PresetBackend, H: DisplayHandles> {
    config: CropConfig,
    blobs: S,
    store: PresetStore<P>,
    handles: H,
    editor: Editor,
    preview: PreviewTracker,
    active: Option<ActiveDocument>,
    released: Vec<String>,
}

impl<S: BinaryStore, P: PresetBackend, H: DisplayHandles> CropSession<S, P, H> {
    pub fn new(config: CropConfig, blobs: S, backend: P, handles: H) -> Result<Self, CropError> {
        config.validate()?;
        let store = PresetStore::new(backend, config.max_presets);
        Ok(Self {
            config,
            blobs,
            store,
            handles,
            editor: Editor::new(),
            preview: PreviewTracker::new(),
            active: None,
            released: Vec::new(),
        })
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn blobs(&self) -> &S {
        &self.blobs
    }

    pub fn blobs_mut(&mut self) -> &mut S {
        &mut self.blobs
    }

    pub fn handles(&self) -> &H {
        &self.handles
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn document_id(&self) -> Option<&str> {
        self.active.as_ref().map(|doc| doc.id.as_str())
    }

    fn active(&self) -> Result<&ActiveDocument, CropError> {
        self.active.as_ref().ok_or(CropError::MissingDocument)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveDocument, CropError> {
        self.active.as_mut().ok_or(CropError::MissingDocument)
    }

    fn check_page(&self, page: u32) -> Result<(), CropError> {
        let total = self.active()?.total_pages;
        if page == 0 || page > total {
            return Err(CropError::InvalidRange(format!(
                "Page {} does not exist (document has {} pages)",
                page, total
            )));
        }
        Ok(())
    }

    /// Validate and store an uploaded document, replacing the current one
    pub fn load_document(&mut self, name: &str, bytes: Vec<u8>) -> Result<Workspace, CropError> {
        let (_, info) = validate_pdf(&bytes)?;

        self.reset()?;

        let meta = DocumentMeta {
            name: name.to_string(),
            page_count: info.page_count,
        };
        let id = self.blobs.put(bytes, meta)?;
        self.active = Some(ActiveDocument {
            id: id.clone(),
            name: name.to_string(),
            total_pages: info.page_count,
            current_page: 1,
            display_handle: None,
        });

        tracing::info!(
            document_id = %id,
            pages = info.page_count,
            size_bytes = info.size_bytes,
            "Loaded document"
        );
        self.workspace()
    }

    /// Reopen a document that is still in the binary store, keeping its presets
    pub fn restore_document(&mut self, document_id: &str) -> Result<Workspace, CropError> {
        let meta = self.blobs.metadata(document_id)?;

        if let Some(doc) = self.active.as_mut().filter(|doc| doc.id == document_id) {
            doc.current_page = 1;
            self.editor.reset();
            self.preview.invalidate();
            return self.workspace();
        }

        self.reset()?;
        self.active = Some(ActiveDocument {
            id: document_id.to_string(),
            name: meta.name,
            total_pages: meta.page_count,
            current_page: 1,
            display_handle: None,
        });

        tracing::info!(document_id, "Restored document");
        self.workspace()
    }

    /// Drop the active document: bytes, display handle and preset record
    ///
    /// On failure the document stays loaded with its presets and bytes.
    pub fn reset(&mut self) -> Result<(), CropError> {
        self.release_active()?;
        self.editor.reset();
        self.preview.invalidate();
        Ok(())
    }

    fn release_active(&mut self) -> Result<(), CropError> {
        let Some(id) = self.active.as_ref().map(|doc| doc.id.clone()) else {
            return Ok(());
        };

        // The record is removed first and written back if the bytes stay
        let record = self.store.snapshot(&id)?;
        self.store.remove_document(&id)?;
        if let Err(error) = self.blobs.delete(&id) {
            if let Some(record) = &record {
                self.store.restore(&id, record)?;
            }
            return Err(error);
        }

        if let Some(handle) = self.active.take().and_then(|doc| doc.display_handle) {
            self.handles.release(&handle);
        }
        self.released.push(id.clone());

        tracing::debug!(document_id = %id, "Released document");
        Ok(())
    }

    /// Ids of documents released since the last call
    ///
    /// Hosts that keep their own copy of the bytes (the browser vault) purge
    /// these entries.
    pub fn take_released(&mut self) -> Vec<String> {
        std::mem::take(&mut self.released)
    }

    pub fn workspace(&self) -> Result<Workspace, CropError> {
        let doc = self.active()?;
        Ok(Workspace {
            document_id: doc.id.clone(),
            document_name: doc.name.clone(),
            total_pages: doc.total_pages,
            presets: self.store.list_presets(&doc.id)?,
            pages: self.store.list_page_states(&doc.id)?,
        })
    }

    /// Display handle for the active document's bytes, created on first use
    pub fn display_handle(&mut self) -> Result<String, CropError> {
        if let Some(handle) = self.active()?.display_handle.clone() {
            return Ok(handle);
        }
        let bytes = self.blobs.get(&self.active()?.id)?;
        let handle = self.handles.create(&bytes)?;
        self.active_mut()?.display_handle = Some(handle.clone());
        Ok(handle)
    }

    // Presets

    pub fn presets(&self) -> Result<Vec<CropPreset>, CropError> {
        self.store.list_presets(&self.active()?.id)
    }

    pub fn page_states(&self) -> Result<PageStates, CropError> {
        self.store.list_page_states(&self.active()?.id)
    }

    /// Create a preset; an empty or missing name gets the next default name
    pub fn create_preset(
        &mut self,
        name: Option<&str>,
        rect: RatioRect,
    ) -> Result<CropPreset, CropError> {
        let document_id = self.active()?.id.clone();
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_preset_name(self.store.list_presets(&document_id)?.len()),
        };
        self.store.create(&document_id, CropPreset::new(name, rect))
    }

    pub fn delete_preset(&mut self, preset_id: &str) -> Result<Vec<u32>, CropError> {
        let document_id = self.active()?.id.clone();
        let cleared = self.store.delete(&document_id, preset_id)?;
        if self.editor.selected() == Some(preset_id) {
            self.editor.reset();
        }
        Ok(cleared)
    }

    pub fn rename_preset(&mut self, preset_id: &str, name: &str) -> Result<CropPreset, CropError> {
        let document_id = self.active()?.id.clone();
        self.store.rename(&document_id, preset_id, name)
    }

    pub fn update_preset(
        &mut self,
        preset_id: &str,
        partial: PartialRect,
    ) -> Result<CropPreset, CropError> {
        let document_id = self.active()?.id.clone();
        self.store.update_geometry(&document_id, preset_id, partial)
    }

    pub fn apply_preset(&mut self, page: u32, preset_id: &str) -> Result<(), CropError> {
        self.check_page(page)?;
        let document_id = self.active()?.id.clone();
        self.store.apply_to_page(&document_id, page, preset_id)
    }

    pub fn clear_page(&mut self, page: u32) -> Result<(), CropError> {
        self.check_page(page)?;
        let document_id = self.active()?.id.clone();
        self.store.clear_page(&document_id, page)
    }

    pub fn select(&mut self, preset_id: Option<&str>) -> Result<(), CropError> {
        if let Some(id) = preset_id {
            let document_id = &self.active()?.id;
            if self.store.get(document_id, id)?.is_none() {
                return Err(CropError::PresetNotFound(id.to_string()));
            }
        }
        self.editor.select(preset_id.map(str::to_string));
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.editor.selected()
    }

    // Pages and preview

    pub fn current_page(&self) -> Result<u32, CropError> {
        Ok(self.active()?.current_page)
    }

    /// Switch page; in-flight renders and gestures are abandoned
    pub fn set_current_page(&mut self, page: u32) -> Result<(), CropError> {
        self.check_page(page)?;
        let doc = self.active_mut()?;
        if doc.current_page != page {
            doc.current_page = page;
            self.preview.invalidate();
            self.editor.cancel();
        }
        Ok(())
    }

    /// Pages the host should offer for preview
    pub fn preview_pages(&self) -> Result<Vec<u32>, CropError> {
        let total = self.active()?.total_pages;
        Ok(preview_pages(total, self.config.max_preview_pages))
    }

    /// Start rendering the current page
    pub fn begin_render(&mut self) -> Result<RenderTicket, CropError> {
        let page = self.active()?.current_page;
        Ok(self.preview.begin(page, self.config.render_width))
    }

    /// Hand back a host render. Stale tickets yield `Ok(None)`.
    pub fn finish_render(
        &mut self,
        ticket: RenderTicket,
        result: Result<RenderedPage, String>,
    ) -> Result<Option<RenderedPage>, CropError> {
        self.active()?;
        Ok(self.preview.finish(ticket, result)?.cloned())
    }

    pub fn rendered(&self) -> Option<&RenderedPage> {
        self.preview.current()
    }

    // Gestures

    /// Run one pointer event through the editor and persist what it commits
    ///
    /// `canvas_size` is the rendered canvas the pointer is over; it converts
    /// the minimum drag distance from pixels to ratio space.
    pub fn pointer(
        &mut self,
        event: PointerEvent,
        canvas_size: Size,
    ) -> Result<PointerOutcome, CropError> {
        let document_id = self.active()?.id.clone();
        let presets = self.store.list_presets(&document_id)?;

        let ctx = EditorContext {
            presets: &presets,
            selected: None,
            max_presets: self.config.max_presets,
            min_draw: pixels_to_ratio_size(self.config.min_drag_px, canvas_size),
            min_size: self.config.min_resize_ratio,
        };
        let effects = self.editor.handle(event, ctx);

        let mut outcome = PointerOutcome::default();
        for effect in &effects {
            let result = match effect {
                EditorEffect::CreatePreset(rect) => {
                    let preset = CropPreset::new(default_preset_name(presets.len()), *rect);
                    self.store.create(&document_id, preset).map(|created| {
                        self.editor.select(Some(created.id.clone()));
                        outcome.created = Some(created);
                    })
                }
                EditorEffect::UpdateGeometry { preset_id, rect } => self
                    .store
                    .update_geometry(&document_id, preset_id, PartialRect::from(*rect))
                    .map(|updated| outcome.updated = Some(updated)),
                EditorEffect::Rejected(error) => Err(error.clone()),
                _ => Ok(()),
            };

            if let Err(error) = result {
                if !error.is_recoverable() {
                    return Err(error);
                }
                tracing::debug!(%error, "Gesture rejected");
                outcome.error = Some(error);
            }
        }

        outcome.effects = effects;
        Ok(outcome)
    }

    // Export

    /// Preset used for export: the explicit one, else the current page's
    /// applied preset, else the first preset
    fn export_preset(&self, preset_id: Option<&str>) -> Result<CropPreset, CropError> {
        let doc = self.active()?;
        if let Some(id) = preset_id {
            return self
                .store
                .get(&doc.id, id)?
                .ok_or_else(|| CropError::PresetNotFound(id.to_string()));
        }
        if let Some(applied) = self.store.applied_preset(&doc.id, doc.current_page)? {
            return Ok(applied);
        }
        self.store
            .list_presets(&doc.id)?
            .into_iter()
            .next()
            .ok_or(CropError::MissingPreset)
    }

    pub fn export(
        &self,
        preset_id: Option<&str>,
        range: Option<PageRange>,
    ) -> Result<ExportOutput, CropError> {
        let doc = self.active()?;
        let preset = self.export_preset(preset_id)?;
        let bytes = self.blobs.get(&doc.id)?;

        let output = export_cropped(&bytes, &preset.rect(), range)?;
        let page_count = range.map_or(doc.total_pages, |r| r.len());

        tracing::info!(
            document_id = %doc.id,
            preset_id = %preset.id,
            pages = page_count,
            "Export ready"
        );
        Ok(ExportOutput {
            bytes: output,
            filename: output_filename(&doc.name, range, doc.total_pages),
            page_count,
        })
    }

    /// A preset's crop on the current page as percentages of that page's CropBox
    pub fn crop_box_percent(&self, preset_id: &str) -> Result<PercentRect, CropError> {
        let doc = self.active()?;
        let preset = self
            .store
            .get(&doc.id, preset_id)?
            .ok_or_else(|| CropError::PresetNotFound(preset_id.to_string()))?;

        let bytes = self.blobs.get(&doc.id)?;
        let pdf = lopdf::Document::load_mem(&bytes).map_err(|e| CropError::Parse(e.to_string()))?;
        let geometry = PageGeometry::from_document(&pdf, doc.current_page)?;

        let crop = crop_box_for(&geometry, &preset.rect());
        Ok(pdf_points_to_crop_box_percent(&crop, &geometry.crop_box))
    }
}
