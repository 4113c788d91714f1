//! Core functionality: feature caching, similarity search and region matching

/// Persists and reloads catalog embeddings per dataset directory.
pub mod cache;
/// Object detector service and YOLO output decoding.
pub mod detector;
/// Image encoder service and CLIP preprocessing.
pub mod embeddings;
/// Manifest fingerprints for cache invalidation.
pub mod hash;
/// Point queries from detection to catalog matches.
pub mod matcher;
/// Point-in-box selection and cropping.
pub mod regions;
/// Cosine similarity ranking.
pub mod search;
