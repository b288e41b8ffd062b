// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Document-wide annotation export.
//!
//! An export is a JSON array indexed by page number (1-based, contiguous).
//! Each element is the page's stored annotation record array, or an empty
//! object when the page has never been saved.

use crate::error::StoreError;
use crate::io::store::{page_key, KeyValueStore};
use serde::{Deserialize, Serialize};

/// Complete annotation export for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationExport {
    pub pages: Vec<serde_json::Value>,
}

impl AnnotationExport {
    /// Gather every page of `document_id` from the store.
    pub fn collect(
        store: &dyn KeyValueStore,
        document_id: &str,
        page_count: usize,
    ) -> Result<Self, StoreError> {
        let mut pages = Vec::with_capacity(page_count);
        for page in 1..=page_count {
            let value = match store.get(&page_key(document_id, page))? {
                Some(data) => serde_json::from_str(&data)?,
                None => serde_json::Value::Object(Default::default()),
            };
            pages.push(value);
        }
        Ok(Self { pages })
    }

    /// Write each page's record array back into the store for `document_id`.
    ///
    /// Entries that are not arrays (unsaved pages) and pages past
    /// `page_count` are skipped. Returns the number of pages written.
    pub fn restore(
        &self,
        store: &mut dyn KeyValueStore,
        document_id: &str,
        page_count: usize,
    ) -> Result<usize, StoreError> {
        if self.pages.len() > page_count {
            log::warn!(
                "Export has {} pages, document has {}; ignoring the rest",
                self.pages.len(),
                page_count
            );
        }

        let mut written = 0;
        for (index, value) in self.pages.iter().take(page_count).enumerate() {
            if value.is_array() {
                store.set(&page_key(document_id, index + 1), serde_json::to_string(value)?)?;
                written += 1;
            }
        }
        Ok(written)
    }
}
