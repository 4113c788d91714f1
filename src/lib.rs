#![doc(html_root_url = "https://docs.rs/shoplens/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # shoplens
//!
//! Point-and-match visual product search: given an image and a pixel
//! coordinate, find the catalog products that look most like the object
//! under that point.
//!
//! ## Pipeline
//!
//! - **Detection**: a [`Detector`] finds objects in the image
//! - **Region selection**: boxes containing the point are kept, smallest first
//! - **Embedding**: each region is cropped and encoded by an [`ImageEncoder`]
//! - **Search**: regions are ranked against the catalog by cosine similarity
//! - **Feature cache**: catalog embeddings are computed once per dataset and
//!   recomputed when the manifest or the encoder changes
//!
//! Detector and encoder are services handed to a [`ProductMatcher`]; the
//! `embeddings` feature provides TorchScript-backed implementations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "embeddings")]
//! # fn main() -> shoplens::Result<()> {
//! use shoplens::{ClipEncoder, DetectorParams, ProductMatcher, TorchScriptDetector};
//! use std::sync::Arc;
//!
//! shoplens::init()?;
//! let detector = TorchScriptDetector::load("models/yolov8n.torchscript", DetectorParams::default())?;
//! let encoder = ClipEncoder::load("models/clip_vit_b32_visual.pt")?;
//! let matcher = ProductMatcher::from_dataset("static/dataset", Arc::new(detector), Arc::new(encoder))?;
//!
//! for product in matcher.find_similar_products("static/uploads/frame.png", 543, 521)? {
//!     println!("{} ({:.3}) {}", product.name, product.score, product.link);
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "embeddings"))]
//! # fn main() {}
//! ```

// Internal modules
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;
mod utils;

#[allow(dead_code, unreachable_pub)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        cache::{CacheStatus, FeatureCache},
        detector::{Detector, DetectorParams},
        embeddings::ImageEncoder,
        matcher::{ProductMatcher, DEFAULT_TOP_K},
        regions::select_regions,
        search::{cosine_similarity, top_k},
    },
    error::{AppError, Result, ResultExt},
    models::{
        catalog::{Catalog, CatalogItem},
        detection::{Detection, DetectionBox},
        matches::{MatchResult, SearchOutcome},
    },
    state::{AppState, Config, MatcherLoader},
};

#[cfg(feature = "web")]
pub use crate::api::{create_router, health_check};

#[cfg(feature = "embeddings")]
pub use crate::core::{detector::TorchScriptDetector, embeddings::ClipEncoder};

/// Initialize logging with default settings
///
/// Honors `RUST_LOG`, defaulting to `info`. It should be called early in the
/// application startup process.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
///
/// # Example
///
/// ```no_run
/// use shoplens::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger: {}", e)))?;

    log::info!(
        "Initializing shoplens {} (built {}, {})",
        built_info::PKG_VERSION,
        built_info::BUILT_TIME_UTC,
        built_info::RUSTC_VERSION
    );

    #[cfg(feature = "embeddings")]
    log::info!(
        "Inference device: {}",
        if tch::Cuda::is_available() { "cuda" } else { "cpu" }
    );

    #[cfg(not(feature = "hashing"))]
    log::warn!("Built without `hashing`: feature caches are only invalidated by deletion");

    Ok(())
}
