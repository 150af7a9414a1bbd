//! Blob URLs as display handles
//!
//! pdf.js loads the uploaded document from an object URL. Every URL created
//! here is revoked exactly once, when the session releases it or on drop.

use pdfcrop_core::{CropError, DisplayHandles};
use std::collections::HashSet;
use wasm_bindgen::JsValue;
use web_sys::{Blob, BlobPropertyBag, Url};

#[derive(Debug, Default)]
pub struct BlobUrlHandles {
    live: HashSet<String>,
}

impl BlobUrlHandles {
    pub fn new() -> Self {
        Self::default()
    }
}

fn js_error(e: JsValue) -> CropError {
    CropError::Storage(
        e.as_string()
            .unwrap_or_else(|| "Blob URL request failed".to_string()),
    )
}

impl DisplayHandles for BlobUrlHandles {
    fn create(&mut self, bytes: &[u8]) -> Result<String, CropError> {
        let array = js_sys::Uint8Array::from(bytes);
        let parts = js_sys::Array::of1(&array);

        let options = BlobPropertyBag::new();
        options.set_type("application/pdf");

        let blob =
            Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_error)?;
        let url = Url::create_object_url_with_blob(&blob).map_err(js_error)?;

        self.live.insert(url.clone());
        Ok(url)
    }

    fn release(&mut self, handle: &str) {
        if self.live.remove(handle) {
            let _ = Url::revoke_object_url(handle);
        }
    }
}

impl Drop for BlobUrlHandles {
    fn drop(&mut self) {
        for url in self.live.drain() {
            let _ = Url::revoke_object_url(&url);
        }
    }
}
