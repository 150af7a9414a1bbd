//! Preview render bookkeeping
//!
//! Rasterization runs asynchronously in the host. Each request gets a ticket
//! stamped with the current generation; switching page or document bumps the
//! generation so late results are dropped instead of overwriting the preview.

use crate::error::CropError;
use serde::{Deserialize, Serialize};

/// What the host rasterizer reports back for a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub width: u32,
    pub height: u32,
    pub media_box_width: f64,
    pub media_box_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTicket {
    pub generation: u64,
    pub page: u32,
    /// Requested canvas size for this page
    pub target_width: u32,
}

#[derive(Debug, Default)]
pub struct PreviewTracker {
    generation: u64,
    current_page: Option<u32>,
    current: Option<RenderedPage>,
}

impl PreviewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rendering `page`; any render still in flight becomes stale
    pub fn begin(&mut self, page: u32, target_width: u32) -> RenderTicket {
        self.generation += 1;
        if self.current_page != Some(page) {
            self.current = None;
        }
        self.current_page = Some(page);
        RenderTicket {
            generation: self.generation,
            page,
            target_width,
        }
    }

    /// Invalidate everything, e.g. when the document changes
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.current_page = None;
        self.current = None;
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Accept a finished render.
    ///
    /// Returns `Ok(None)` for a stale ticket (result discarded) and
    /// `RenderFailure` when the host rasterizer failed for the current ticket.
    pub fn finish(
        &mut self,
        ticket: RenderTicket,
        result: Result<RenderedPage, String>,
    ) -> Result<Option<&RenderedPage>, CropError> {
        if !self.is_current(&ticket) {
            tracing::warn!(
                page = ticket.page,
                generation = ticket.generation,
                current = self.generation,
                "Discarding stale render"
            );
            return Ok(None);
        }

        let page = result.map_err(CropError::RenderFailure)?;
        if page.width == 0 || page.height == 0 {
            return Err(CropError::RenderFailure(format!(
                "Page {} rendered to an empty canvas",
                ticket.page
            )));
        }
        self.current = Some(page);
        Ok(self.current.as_ref())
    }

    pub fn current(&self) -> Option<&RenderedPage> {
        self.current.as_ref()
    }
}
