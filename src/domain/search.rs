//! Query-side domain types: modalities, search modes, filters.

use serde::{Deserialize, Serialize};

/// One of the independent similarity signals a listing is indexed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Location,
    Features,
    Visual,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Location, Modality::Features, Modality::Visual];

    /// Name of the vector collection holding this modality.
    pub fn collection(self) -> &'static str {
        match self {
            Modality::Location => "location_vectors",
            Modality::Features => "features_vectors",
            Modality::Visual => "visual_vectors",
        }
    }

    /// Embedding dimension, fixed per collection for the lifetime of the
    /// index.
    pub fn dimension(self) -> usize {
        match self {
            Modality::Location | Modality::Features => 384,
            Modality::Visual => 512,
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Modality::Location => "location",
            Modality::Features => "features",
            Modality::Visual => "visual",
        };
        write!(f, "{name}")
    }
}

/// Named weighting profile over the three modalities.
///
/// The weight table is required to be total over this enumeration and is
/// validated when the searcher is constructed, never at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Balanced,
    VisualFocus,
    FeaturesFocus,
    LocationFocus,
    BalancedWithoutVisual,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] = [
        SearchMode::Balanced,
        SearchMode::VisualFocus,
        SearchMode::FeaturesFocus,
        SearchMode::LocationFocus,
        SearchMode::BalancedWithoutVisual,
    ];
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchMode::Balanced => "balanced",
            SearchMode::VisualFocus => "visual_focus",
            SearchMode::FeaturesFocus => "features_focus",
            SearchMode::LocationFocus => "location_focus",
            SearchMode::BalancedWithoutVisual => "balanced_without_visual",
        };
        write!(f, "{name}")
    }
}

/// Hard constraints applied to candidates after rank fusion. An unset bound
/// leaves that axis unconstrained. `sale_lease` is overridden per query with
/// the anchor property's own value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<i64>,
    pub max_bedrooms: Option<i64>,
    pub min_bathrooms: Option<f64>,
    pub max_bathrooms: Option<f64>,
    pub property_type: Option<String>,
    pub must_have_amenities: Vec<String>,
    pub sale_lease: Option<String>,
}

/// A candidate produced by rank fusion, before payload resolution.
/// Request-scoped; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: u64,
    pub score: f64,
}
