use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::detector::DetectorParams;
use crate::core::matcher::{ProductMatcher, DEFAULT_TOP_K};
use crate::error::{AppError, Result};

/// Configuration for the application
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Dataset directory holding the manifest, reference images and cache
    pub dataset_dir: PathBuf,
    /// Directory query image paths are resolved against
    pub upload_dir: PathBuf,
    /// Matches returned per detected region
    pub top_k: usize,
    /// TorchScript YOLO export
    pub detector_model: PathBuf,
    /// TorchScript CLIP visual tower
    pub encoder_model: PathBuf,
    /// Detector thresholds
    pub detector: DetectorParams,
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("static/dataset"),
            upload_dir: PathBuf::from("static/uploads"),
            top_k: DEFAULT_TOP_K,
            detector_model: PathBuf::from("models/yolov8n.torchscript"),
            encoder_model: PathBuf::from("models/clip_vit_b32_visual.pt"),
            detector: DetectorParams::default(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, value, e)))
}

fn unit_interval(key: &str, value: f32) -> Result<f32> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::Config(format!("{} must be within 0..=1, got {}", key, value)))
    }
}

impl Config {
    /// Builds a configuration from the process environment, after loading a
    /// `.env` file if one is present.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `SHOPLENS_*` keys, falling back to defaults
    /// for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SHOPLENS_DATASET_DIR") {
            config.dataset_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHOPLENS_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHOPLENS_TOP_K") {
            config.top_k = parse("SHOPLENS_TOP_K", &v)?;
            if config.top_k == 0 {
                return Err(AppError::Config("SHOPLENS_TOP_K must be at least 1".to_string()));
            }
        }
        if let Some(v) = lookup("SHOPLENS_DETECTOR_MODEL") {
            config.detector_model = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHOPLENS_ENCODER_MODEL") {
            config.encoder_model = PathBuf::from(v);
        }
        if let Some(v) = lookup("SHOPLENS_CONF_THRESHOLD") {
            let value = parse("SHOPLENS_CONF_THRESHOLD", &v)?;
            config.detector.conf_threshold = unit_interval("SHOPLENS_CONF_THRESHOLD", value)?;
        }
        if let Some(v) = lookup("SHOPLENS_IOU_THRESHOLD") {
            let value = parse("SHOPLENS_IOU_THRESHOLD", &v)?;
            config.detector.iou_threshold = unit_interval("SHOPLENS_IOU_THRESHOLD", value)?;
        }
        if let Some(v) = lookup("SHOPLENS_BIND_ADDR") {
            config.bind_addr = parse("SHOPLENS_BIND_ADDR", &v)?;
        }

        Ok(config)
    }
}

/// Builds the matcher on first use
pub type MatcherLoader = dyn Fn(&Config) -> Result<ProductMatcher> + Send + Sync;

/// Application state that can be shared across handlers
///
/// The matcher (models plus loaded feature cache) is built lazily, exactly
/// once; concurrent first callers wait for the same load. A failed load is
/// not remembered, so the next call retries it.
pub struct AppState {
    /// Application configuration
    pub config: Config,
    loader: Box<MatcherLoader>,
    matcher: Mutex<Option<Arc<ProductMatcher>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl AppState {
    /// Create application state that loads the TorchScript models from the
    /// configured paths
    #[cfg(feature = "embeddings")]
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_loader(config, load_torch_matcher)
    }

    /// Create application state with a custom matcher loader
    pub fn with_loader<F>(config: Config, loader: F) -> Arc<Self>
    where
        F: Fn(&Config) -> Result<ProductMatcher> + Send + Sync + 'static,
    {
        Arc::new(Self {
            config,
            loader: Box::new(loader),
            matcher: Mutex::new(None),
        })
    }

    /// Returns the shared matcher, building it on the first call
    pub fn matcher(&self) -> Result<Arc<ProductMatcher>> {
        let mut slot = self
            .matcher
            .lock()
            .map_err(|_| AppError::Internal("matcher lock poisoned".to_string()))?;

        if let Some(matcher) = slot.as_ref() {
            return Ok(Arc::clone(matcher));
        }

        log::info!("Loading models and catalog features");
        let matcher = Arc::new((self.loader)(&self.config)?);
        *slot = Some(Arc::clone(&matcher));
        Ok(matcher)
    }
}

#[cfg(feature = "embeddings")]
fn load_torch_matcher(config: &Config) -> Result<ProductMatcher> {
    use crate::core::{detector::TorchScriptDetector, embeddings::ClipEncoder};

    let detector = TorchScriptDetector::load(&config.detector_model, config.detector.clone())?;
    let encoder = ClipEncoder::load(&config.encoder_model)?;

    Ok(
        ProductMatcher::from_dataset(&config.dataset_dir, Arc::new(detector), Arc::new(encoder))?
            .with_top_k(config.top_k),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_keys() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SHOPLENS_DATASET_DIR", "/data/catalog"),
            ("SHOPLENS_TOP_K", "8"),
            ("SHOPLENS_CONF_THRESHOLD", "0.4"),
            ("SHOPLENS_BIND_ADDR", "0.0.0.0:8090"),
        ]))
        .unwrap();

        assert_eq!(config.dataset_dir, PathBuf::from("/data/catalog"));
        assert_eq!(config.top_k, 8);
        assert!((config.detector.conf_threshold - 0.4).abs() < 1e-6);
        assert_eq!(config.bind_addr.port(), 8090);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for pairs in [
            [("SHOPLENS_TOP_K", "five")],
            [("SHOPLENS_TOP_K", "0")],
            [("SHOPLENS_IOU_THRESHOLD", "1.5")],
            [("SHOPLENS_BIND_ADDR", "localhost")],
        ] {
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{:?}", pairs);
        }
    }

    #[test]
    fn test_failed_load_is_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let state = AppState::with_loader(Config::default(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("models".to_string()))
        });

        assert!(state.matcher().is_err());
        assert!(state.matcher().is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
