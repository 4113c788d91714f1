//! Data types shared by the cache, the search and the API

/// Catalog items and manifest loading.
pub mod catalog;
/// Raw detections and validated detection boxes.
pub mod detection;
/// Search results returned to callers.
pub mod matches;
