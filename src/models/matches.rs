use serde::{Deserialize, Serialize};

use super::catalog::CatalogItem;

/// A catalog product matched against a query region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Product display name.
    pub name: String,
    /// Product page URL.
    pub link: String,
    /// Product image URL.
    pub image: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

impl MatchResult {
    /// Builds a match from a catalog item and its similarity score.
    pub fn from_item(item: &CatalogItem, score: f32) -> Self {
        Self {
            name: item.product_name.clone(),
            link: item.product_url.clone(),
            image: item.image_url.clone(),
            score,
        }
    }
}

/// Result of a point query, distinguishing the ways a search can come up empty.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// At least one region contained the point. Matches are grouped per
    /// region, smallest region first.
    Matches(Vec<MatchResult>),
    /// The detector ran and found nothing.
    NoDetections,
    /// Objects were detected but none contains the point.
    NoRegionAtPoint,
    /// The detector failed; the message is the underlying error.
    DetectorFailed(String),
}

impl SearchOutcome {
    /// Short machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matches(_) => "matches",
            Self::NoDetections => "no_detections",
            Self::NoRegionAtPoint => "no_region_at_point",
            Self::DetectorFailed(_) => "detector_failed",
        }
    }

    /// The matches, empty for every variant but [`SearchOutcome::Matches`].
    pub fn into_matches(self) -> Vec<MatchResult> {
        match self {
            Self::Matches(matches) => matches,
            _ => Vec::new(),
        }
    }
}
