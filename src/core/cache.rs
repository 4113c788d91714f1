//! Persistent catalog embedding cache.
//!
//! A dataset directory looks like:
//!
//! ```text
//! <dataset>/metadata.json          source manifest
//! <dataset>/images/<filename>      reference images
//! <dataset>/cache/manifest.json    manifest copy the features were computed from
//! <dataset>/cache/features.json    feature matrix, one row per manifest entry
//! ```
//!
//! The feature matrix file stores a fingerprint of the source manifest and the
//! encoder's model id. [`FeatureCache::ensure`] recomputes whenever either no
//! longer matches.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    core::{embeddings::ImageEncoder, hash},
    error::{AppError, Result},
    models::catalog::{Catalog, CatalogItem},
    utils,
};

/// Source manifest file name.
pub const MANIFEST_FILE: &str = "metadata.json";
/// Reference image directory name.
pub const IMAGES_DIR: &str = "images";
/// Cache directory name.
pub const CACHE_DIR: &str = "cache";
/// Feature matrix file name inside the cache directory.
pub const FEATURES_FILE: &str = "features.json";
/// Manifest copy file name inside the cache directory.
pub const MANIFEST_COPY_FILE: &str = "manifest.json";

const FORMAT_VERSION: u32 = 1;

/// What [`FeatureCache::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// A matching feature matrix was already on disk.
    Hit,
    /// Features were (re)computed and written.
    Computed,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureMatrixFile {
    format_version: u32,
    created_at: DateTime<Utc>,
    manifest_fingerprint: Option<String>,
    model: String,
    features: Array2<f32>,
}

/// Header fields only; the matrix body is skipped while parsing.
#[derive(Debug, Deserialize)]
struct FeatureMatrixHeader {
    format_version: u32,
    manifest_fingerprint: Option<String>,
    model: String,
}

/// Catalog items paired row-for-row with their embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCache {
    items: Vec<CatalogItem>,
    features: Array2<f32>,
}

fn features_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join(CACHE_DIR).join(FEATURES_FILE)
}

fn manifest_copy_path(dataset_dir: &Path) -> PathBuf {
    dataset_dir.join(CACHE_DIR).join(MANIFEST_COPY_FILE)
}

impl FeatureCache {
    /// Pairs items with a feature matrix.
    ///
    /// Fails with [`AppError::DataCorruption`] unless there is exactly one
    /// row per item.
    pub fn new(items: Vec<CatalogItem>, features: Array2<f32>) -> Result<Self> {
        if features.nrows() != items.len() {
            return Err(AppError::DataCorruption(format!(
                "feature matrix has {} rows but the manifest lists {} items",
                features.nrows(),
                items.len()
            )));
        }
        Ok(Self { items, features })
    }

    /// Makes sure `dataset_dir` holds features for its current manifest,
    /// computing and persisting them when missing or stale.
    pub fn ensure<P: AsRef<Path>>(dataset_dir: P, encoder: &dyn ImageEncoder) -> Result<CacheStatus> {
        let dataset_dir = dataset_dir.as_ref();
        let catalog = Catalog::load(dataset_dir.join(MANIFEST_FILE))?;
        let fingerprint = hash::fingerprint(catalog.raw());

        match Self::stale_reason(dataset_dir, fingerprint.as_deref(), encoder.model_id()) {
            None => {
                log::info!("Using cached dataset features from {}", dataset_dir.display());
                Ok(CacheStatus::Hit)
            }
            Some(reason) => {
                log::info!(
                    "Precomputing dataset features for {} ({})",
                    dataset_dir.display(),
                    reason
                );
                let cache = Self::compute(dataset_dir, catalog.items(), encoder)?;
                cache.save(dataset_dir, &catalog, fingerprint, encoder.model_id())?;
                Ok(CacheStatus::Computed)
            }
        }
    }

    /// Returns why the on-disk features cannot be used, or `None` if they can.
    fn stale_reason(
        dataset_dir: &Path,
        fingerprint: Option<&str>,
        model: &str,
    ) -> Option<String> {
        let path = features_path(dataset_dir);
        if !path.exists() {
            return Some("no cached features".to_string());
        }

        let header: FeatureMatrixHeader = match std::fs::read(&path)
            .map_err(AppError::from)
            .and_then(|raw| serde_json::from_slice(&raw).map_err(AppError::from))
        {
            Ok(header) => header,
            Err(e) => {
                log::warn!("Unreadable feature cache {}: {}", path.display(), e);
                return Some("cached features unreadable".to_string());
            }
        };

        if header.format_version != FORMAT_VERSION {
            return Some(format!("cache format {} is outdated", header.format_version));
        }
        if header.model != model {
            return Some(format!("encoder changed from {} to {}", header.model, model));
        }

        match (fingerprint, header.manifest_fingerprint.as_deref()) {
            (Some(current), Some(stored)) if current == stored => None,
            (Some(_), _) => Some("manifest changed".to_string()),
            (None, _) => {
                log::warn!(
                    "Manifest fingerprinting disabled; cached features in {} are trusted as-is",
                    dataset_dir.display()
                );
                None
            }
        }
    }

    /// Reads the cached manifest copy and feature matrix.
    pub fn load<P: AsRef<Path>>(dataset_dir: P) -> Result<Self> {
        let dataset_dir = dataset_dir.as_ref();
        let catalog = Catalog::load(manifest_copy_path(dataset_dir))?;

        let path = features_path(dataset_dir);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("feature matrix {}", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let file: FeatureMatrixFile = serde_json::from_slice(&raw).map_err(|e| {
            AppError::DataCorruption(format!(
                "unreadable feature matrix {}: {}",
                path.display(),
                e
            ))
        })?;
        if file.format_version != FORMAT_VERSION {
            return Err(AppError::DataCorruption(format!(
                "unsupported feature cache format {}",
                file.format_version
            )));
        }

        // An interrupted save can leave a new manifest copy beside an old matrix
        if let (Some(stored), Some(current)) = (
            file.manifest_fingerprint.as_deref(),
            hash::fingerprint(catalog.raw()),
        ) {
            if stored != current {
                return Err(AppError::DataCorruption(format!(
                    "feature matrix {} was computed from a different manifest",
                    path.display()
                )));
            }
        }

        let cache = Self::new(catalog.into_items(), file.features)?;
        log::debug!(
            "Loaded {} cached features ({} dims, model {})",
            cache.len(),
            cache.dimension(),
            file.model
        );
        Ok(cache)
    }

    /// Encodes every catalog image without reading or writing the cache.
    pub fn recompute<P: AsRef<Path>>(dataset_dir: P, encoder: &dyn ImageEncoder) -> Result<Self> {
        let dataset_dir = dataset_dir.as_ref();
        let catalog = Catalog::load(dataset_dir.join(MANIFEST_FILE))?;
        Self::compute(dataset_dir, catalog.items(), encoder)
    }

    fn compute(dataset_dir: &Path, items: &[CatalogItem], encoder: &dyn ImageEncoder) -> Result<Self> {
        let images_dir = dataset_dir.join(IMAGES_DIR);
        let mut dimension = None;
        let mut flat = Vec::new();

        for item in items {
            let img_path = images_dir.join(&item.image_filename);
            if !img_path.exists() {
                return Err(AppError::NotFound(format!(
                    "reference image {} for {}",
                    img_path.display(),
                    item.product_name
                )));
            }
            let image = DynamicImage::ImageRgb8(image::open(&img_path)?.to_rgb8());
            let embedding = encoder
                .encode(&image)
                .map_err(|e| AppError::Encoder(format!("{}: {}", img_path.display(), e)))?;

            let expected = *dimension.get_or_insert(embedding.len());
            if embedding.len() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            flat.extend(embedding.iter().copied());
            log::debug!("Encoded {}", item.image_filename);
        }

        let features = Array2::from_shape_vec((items.len(), dimension.unwrap_or(0)), flat)
            .map_err(|e| AppError::Internal(format!("stacking features: {}", e)))?;
        Self::new(items.to_vec(), features)
    }

    fn save(
        &self,
        dataset_dir: &Path,
        catalog: &Catalog,
        fingerprint: Option<String>,
        model: &str,
    ) -> Result<()> {
        let file = FeatureMatrixFile {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            manifest_fingerprint: fingerprint,
            model: model.to_string(),
            features: self.features.clone(),
        };

        // `load` rejects a manifest copy whose fingerprint differs from the matrix
        utils::write_atomic(&manifest_copy_path(dataset_dir), catalog.raw())?;
        utils::write_atomic(&features_path(dataset_dir), &serde_json::to_vec(&file)?)?;

        log::info!(
            "Saved {} dataset features to {}",
            self.len(),
            features_path(dataset_dir).display()
        );
        Ok(())
    }

    /// Catalog items in row order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// The feature matrix.
    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    /// Number of cached items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding dimension, 0 for an empty cache.
    pub fn dimension(&self) -> usize {
        self.features.ncols()
    }
}
