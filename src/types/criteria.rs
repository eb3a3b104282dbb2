use serde::{Deserialize, Serialize};

use super::ClassificationSet;

/// Upper end of a size range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBound {
    /// No upper limit.
    #[default]
    Open,
    /// Inclusive limit in square meters.
    AtMost(f64),
}

/// Inclusive area range in square meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: f64,
    pub max: SizeBound,
}

impl Default for SizeRange {
    fn default() -> Self { Self::FULL }
}

impl SizeRange {
    pub const FULL: Self = Self { min: 0.0, max: SizeBound::Open };

    pub fn new(min: f64, max: SizeBound) -> Self { Self { min, max } }

    pub fn at_least(min: f64) -> Self { Self { min, max: SizeBound::Open } }

    pub fn between(min: f64, max: f64) -> Self { Self { min, max: SizeBound::AtMost(max) } }

    /// Adapt a UI slider whose top stop means "no limit": `hi >= open_at` becomes open.
    pub fn from_slider(lo: f64, hi: f64, open_at: f64) -> Self {
        let max = if hi >= open_at { SizeBound::Open } else { SizeBound::AtMost(hi) };
        Self { min: lo, max }
    }

    #[inline]
    pub fn contains(&self, area: f64) -> bool {
        area >= self.min && match self.max {
            SizeBound::Open => true,
            SizeBound::AtMost(max) => area <= max,
        }
    }
}

/// Transient filter parameters owned by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Empty means every class.
    pub types: ClassificationSet,
    pub size: SizeRange,
    /// Minimum confidence as a percentage in `[0, 100]`.
    pub min_confidence_pct: f64,
}

impl FilterCriteria {
    pub fn with_types(mut self, types: ClassificationSet) -> Self { self.types = types; self }

    pub fn with_size(mut self, size: SizeRange) -> Self { self.size = size; self }

    pub fn with_min_confidence(mut self, pct: f64) -> Self { self.min_confidence_pct = pct; self }
}
