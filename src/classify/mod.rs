//! Rule-based classification and valuation.

#[cfg(feature = "remote")]
mod http;
mod remote;

#[cfg(feature = "remote")]
pub use http::HttpClassifier;
pub use remote::{ClassifyRequest, RemoteClassifier, reclassify};

use crate::types::Classification;

/// Area bands, largest first; the first band whose test passes wins.
/// Bands compare strictly, so 200, 500 and 1000 fall to the next band down.
pub fn classify(area: f64) -> Classification {
    if area > 1000.0 { return Classification::Industrial }
    if area > 500.0 { return Classification::Institutional }
    if area > 200.0 { return Classification::Commercial }
    if area < 50.0 { return Classification::Mixed }
    Classification::Residential
}

/// Estimated value in local currency: `area * rate[classification]`, unrounded.
#[inline]
pub fn estimate(classification: Classification, area: f64) -> f64 {
    area * classification.rate()
}
