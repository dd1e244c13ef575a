//! Item catalog: the owning store and title dispatch table.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::Item;

/// Errors that abort loading a whole catalog.
///
/// Problems with individual records never abort the load; they are
/// reported as [`Rejection`]s instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The document could not be read.
    #[error("Failed to read items from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not a JSON array.
    #[error("Item document is not a JSON array: {0}")]
    NotAnArray(#[source] serde_json::Error),
}

/// A record that was skipped while loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Position of the record in the source array.
    pub index: usize,
    /// Title of the record, if it had one.
    pub title: Option<String>,
    /// Why the record was skipped.
    pub reason: String,
}

/// Outcome of loading a catalog.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

/// Owns the loaded items and resolves titles to items.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: Vec<Item>,
    by_title: HashMap<String, usize>,
}

impl ItemCatalog {
    /// Builds a catalog from already parsed items.
    ///
    /// Items without a usable coordinate or with a duplicate title are
    /// rejected, exactly like records from a JSON document.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> (Self, LoadReport) {
        let mut catalog = Self::default();
        let mut report = LoadReport::default();

        for (index, item) in items.into_iter().enumerate() {
            match catalog.admit(item) {
                Ok(()) => report.accepted += 1,
                Err((title, reason)) => report.rejected.push(Rejection {
                    index,
                    title: Some(title),
                    reason,
                }),
            }
        }

        (catalog, report)
    }

    /// Parses a JSON array of items.
    ///
    /// Each element is decoded on its own, so one malformed record only
    /// costs that record.
    pub fn from_json(json: &str) -> Result<(Self, LoadReport), CatalogError> {
        let records: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(CatalogError::NotAnArray)?;

        let mut catalog = Self::default();
        let mut report = LoadReport::default();

        for (index, record) in records.into_iter().enumerate() {
            let title = record
                .get("title")
                .and_then(|t| t.as_str())
                .map(str::to_string);

            let outcome = serde_json::from_value::<Item>(record)
                .map_err(|e| e.to_string())
                .and_then(|item| catalog.admit(item).map_err(|(_, reason)| reason));

            match outcome {
                Ok(()) => report.accepted += 1,
                Err(reason) => {
                    warn!(index, title = ?title, reason = %reason, "Rejected item record");
                    report.rejected.push(Rejection {
                        index,
                        title,
                        reason,
                    });
                }
            }
        }

        debug!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "Parsed item document"
        );
        Ok((catalog, report))
    }

    /// Reads and parses an item document from disk.
    pub fn load(path: &Path) -> Result<(Self, LoadReport), CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let (catalog, report) = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            items = catalog.len(),
            rejected = report.rejected.len(),
            "Loaded item catalog"
        );
        Ok((catalog, report))
    }

    /// Looks up an item by its title.
    pub fn get(&self, title: &str) -> Option<&Item> {
        self.by_title.get(title).map(|&i| &self.items[i])
    }

    /// Items in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn admit(&mut self, item: Item) -> Result<(), (String, String)> {
        let Some(coords) = item.coords else {
            return Err((item.title, "missing coords".to_string()));
        };
        if let Err(e) = coords.validate() {
            return Err((item.title, e.to_string()));
        }
        if self.by_title.contains_key(&item.title) {
            return Err((item.title, "duplicate title".to_string()));
        }

        self.by_title.insert(item.title.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }
}
