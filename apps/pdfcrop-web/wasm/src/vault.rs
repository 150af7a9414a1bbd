//! IndexedDB vault for uploaded documents
//!
//! Keeps the original bytes across page reloads so a workspace can be reopened
//! with [`crate::CropSession::restore_document`]. The session works from
//! memory and reports what it dropped through `takeReleasedDocuments`; the
//! host passes that list to [`DocumentVault::forget`] so entries never outlive
//! their workspace.

use js_sys::{Array, Promise, Reflect, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{IdbDatabase, IdbObjectStore, IdbRequest, IdbTransactionMode};

const DB_NAME: &str = "pdfcrop_local";
const DB_VERSION: u32 = 1;
const DOCUMENTS: &str = "documents";

/// Metadata stored next to the bytes; `data` is added as a `Uint8Array`
#[derive(Serialize)]
struct VaultEntry<'a> {
    name: &'a str,
    page_count: u32,
    stored_at: f64,
}

#[wasm_bindgen]
pub struct DocumentVault {
    db: IdbDatabase,
}

/// Open the vault, creating the object store on first use
#[wasm_bindgen(js_name = openVault)]
pub async fn open_vault() -> Result<DocumentVault, JsValue> {
    let factory = web_sys::window()
        .ok_or("No window")?
        .indexed_db()?
        .ok_or("IndexedDB not available")?;
    let request = factory.open_with_u32(DB_NAME, DB_VERSION)?;

    let upgrading = request.clone();
    let on_upgrade = Closure::once(move |_: web_sys::Event| {
        if let Ok(db) = upgrading.result() {
            let _ = db.unchecked_into::<IdbDatabase>().create_object_store(DOCUMENTS);
        }
    });
    request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    // upgradeneeded always fires before success, so the closure can go after this
    let db = settle(&request).await?;
    request.set_onupgradeneeded(None);
    drop(on_upgrade);

    Ok(DocumentVault {
        db: db.unchecked_into(),
    })
}

/// Resolve once an IndexedDB request succeeds, with its result
async fn settle(request: &IdbRequest) -> Result<JsValue, JsValue> {
    let promise = Promise::new(&mut |resolve, reject| {
        let succeeded = request.clone();
        let on_success = Closure::once_into_js(move |_: web_sys::Event| {
            let result = succeeded.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::NULL, &result);
        });

        let failed = request.clone();
        let on_error = Closure::once_into_js(move |_: web_sys::Event| {
            let message = failed
                .error()
                .ok()
                .flatten()
                .map(|e| JsValue::from_str(&e.message()))
                .unwrap_or_else(|| JsValue::from_str("IndexedDB request failed"));
            let _ = reject.call1(&JsValue::NULL, &message);
        });

        request.set_onsuccess(Some(on_success.unchecked_ref()));
        request.set_onerror(Some(on_error.unchecked_ref()));
    });
    JsFuture::from(promise).await
}

impl DocumentVault {
    fn documents(&self, mode: IdbTransactionMode) -> Result<IdbObjectStore, JsValue> {
        self.db
            .transaction_with_str_and_mode(DOCUMENTS, mode)?
            .object_store(DOCUMENTS)
    }
}

#[wasm_bindgen]
impl DocumentVault {
    /// Save bytes under the session's document id
    #[wasm_bindgen(js_name = storeDocument)]
    pub async fn store_document(
        &self,
        document_id: &str,
        name: &str,
        page_count: u32,
        data: &[u8],
    ) -> Result<(), JsValue> {
        let entry = serde_wasm_bindgen::to_value(&VaultEntry {
            name,
            page_count,
            stored_at: js_sys::Date::now(),
        })?;
        Reflect::set(&entry, &"data".into(), &Uint8Array::from(data))?;

        let request = self
            .documents(IdbTransactionMode::Readwrite)?
            .put_with_key(&entry, &document_id.into())?;
        settle(&request).await?;
        Ok(())
    }

    /// `{ name, page_count, stored_at, data }`, or null when the id is unknown
    #[wasm_bindgen(js_name = loadDocument)]
    pub async fn load_document(&self, document_id: &str) -> Result<JsValue, JsValue> {
        let request = self
            .documents(IdbTransactionMode::Readonly)?
            .get(&document_id.into())?;
        let entry = settle(&request).await?;
        Ok(if entry.is_undefined() { JsValue::NULL } else { entry })
    }

    /// Ids of every stored document
    #[wasm_bindgen(js_name = documentIds)]
    pub async fn document_ids(&self) -> Result<Array, JsValue> {
        let request = self
            .documents(IdbTransactionMode::Readonly)?
            .get_all_keys()?;
        Ok(settle(&request).await?.unchecked_into())
    }

    /// Delete the given entries in one transaction; unknown ids are ignored
    pub async fn forget(&self, document_ids: Vec<String>) -> Result<(), JsValue> {
        if document_ids.is_empty() {
            return Ok(());
        }
        let store = self.documents(IdbTransactionMode::Readwrite)?;
        let requests = document_ids
            .iter()
            .map(|id| store.delete(&id.into()))
            .collect::<Result<Vec<_>, _>>()?;
        for request in &requests {
            settle(request).await?;
        }
        Ok(())
    }
}
