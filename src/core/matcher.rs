use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

use crate::{
    core::{
        cache::FeatureCache,
        detector::Detector,
        embeddings::ImageEncoder,
        regions::{boxes_from_detections, crop_region, select_regions},
        search::top_k,
    },
    error::{AppError, Result},
    models::matches::{MatchResult, SearchOutcome},
};

/// Number of matches returned per region unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Answers "what products look like the object at this point?"
///
/// Holds the detector and encoder services and the loaded feature cache. All
/// of it is read-only after construction, so a matcher can be shared across
/// threads behind an [`Arc`].
#[derive(Clone)]
pub struct ProductMatcher {
    detector: Arc<dyn Detector>,
    encoder: Arc<dyn ImageEncoder>,
    cache: FeatureCache,
    top_k: usize,
}

impl std::fmt::Debug for ProductMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductMatcher")
            .field("encoder", &self.encoder.model_id())
            .field("catalog_size", &self.cache.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl ProductMatcher {
    /// Creates a matcher over an already loaded cache.
    pub fn new(
        detector: Arc<dyn Detector>,
        encoder: Arc<dyn ImageEncoder>,
        cache: FeatureCache,
    ) -> Self {
        Self {
            detector,
            encoder,
            cache,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Ensures the dataset's feature cache is current, loads it, and builds a
    /// matcher over it.
    pub fn from_dataset<P: AsRef<Path>>(
        dataset_dir: P,
        detector: Arc<dyn Detector>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Result<Self> {
        let dataset_dir = dataset_dir.as_ref();
        FeatureCache::ensure(dataset_dir, encoder.as_ref())?;
        let cache = FeatureCache::load(dataset_dir)?;
        log::info!(
            "Catalog ready: {} products from {}",
            cache.len(),
            dataset_dir.display()
        );
        Ok(Self::new(detector, encoder, cache))
    }

    /// Sets how many matches are returned per region.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// The loaded feature cache.
    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    /// Finds catalog products resembling the object(s) under `(x, y)`.
    ///
    /// Every detected box containing the point is searched independently,
    /// smallest first, and all of its matches are appended; the same product
    /// may therefore appear once per box. A detector failure is reported as
    /// [`SearchOutcome::DetectorFailed`] rather than an error. Encoder and
    /// image decoding failures are errors.
    pub fn search<P: AsRef<Path>>(&self, image_path: P, x: i32, y: i32) -> Result<SearchOutcome> {
        let image_path = image_path.as_ref();

        let detections = match self.detector.detect(image_path) {
            Ok(detections) => detections,
            Err(e) => {
                log::error!("Error detecting objects in {}: {:#}", image_path.display(), e);
                return Ok(SearchOutcome::DetectorFailed(format!("{:#}", e)));
            }
        };

        let boxes = boxes_from_detections(&detections);
        if boxes.is_empty() {
            log::info!("No objects detected in {}", image_path.display());
            return Ok(SearchOutcome::NoDetections);
        }

        let regions = select_regions(&boxes, x, y);
        if regions.is_empty() {
            log::info!(
                "{} objects detected, none at ({}, {})",
                boxes.len(),
                x,
                y
            );
            return Ok(SearchOutcome::NoRegionAtPoint);
        }

        let image = DynamicImage::ImageRgb8(image::open(image_path)?.to_rgb8());

        let mut products = Vec::new();
        for region in &regions {
            let Some(crop) = crop_region(&image, region) else {
                log::debug!("Region {:?} lies outside the image", region);
                continue;
            };

            let query = self
                .encoder
                .encode(&crop)
                .map_err(|e| AppError::Encoder(format!("{:#}", e)))?;

            for (index, score) in top_k(query.view(), self.cache.features(), self.top_k)? {
                products.push(MatchResult::from_item(&self.cache.items()[index], score));
            }
        }

        log::debug!(
            "{} matches from {} regions at ({}, {})",
            products.len(),
            regions.len(),
            x,
            y
        );
        Ok(SearchOutcome::Matches(products))
    }

    /// Like [`ProductMatcher::search`], flattening every empty outcome to an
    /// empty list.
    pub fn find_similar_products<P: AsRef<Path>>(
        &self,
        image_path: P,
        x: i32,
        y: i32,
    ) -> Result<Vec<MatchResult>> {
        self.search(image_path, x, y).map(SearchOutcome::into_matches)
    }
}
