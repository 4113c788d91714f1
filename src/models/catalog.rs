use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppError, Result};

/// A reference product with display metadata and an associated image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Catalog identifier. Older manifests omit it.
    #[serde(default)]
    pub id: String,
    /// Display name of the product.
    pub product_name: String,
    /// Link to the product page.
    pub product_url: String,
    /// Public URL of the product image.
    pub image_url: String,
    /// File name of the reference image under `<dataset>/images/`.
    #[serde(alias = "filename")]
    pub image_filename: String,
}

/// An ordered product catalog as read from a manifest file.
///
/// The raw manifest bytes are kept so the cache can fingerprint exactly
/// what was on disk.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    raw: Vec<u8>,
}

impl Catalog {
    /// Loads a manifest (JSON array of [`CatalogItem`]).
    ///
    /// Returns [`AppError::NotFound`] when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "manifest file {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json_bytes(raw)
    }

    /// Parses a manifest from its raw JSON bytes.
    pub fn from_json_bytes(raw: Vec<u8>) -> Result<Self> {
        let items: Vec<CatalogItem> = serde_json::from_slice(&raw)?;
        Ok(Self { items, raw })
    }

    /// Builds a catalog from items, serializing them as the manifest body.
    pub fn from_items(items: Vec<CatalogItem>) -> Result<Self> {
        let raw = serde_json::to_vec_pretty(&items)?;
        Ok(Self { items, raw })
    }

    /// Items in manifest order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// Raw manifest bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the catalog, returning its items.
    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }
}
