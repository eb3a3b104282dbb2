use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::{Centroid, Point, Polygon};
use serde::{Serialize, Serializer, ser::SerializeSeq};

use crate::classify::{classify, estimate};
use super::Classification;

/// A validated building footprint. Created once at ingestion and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingRecord {
    id: String,
    #[serde(serialize_with = "serialize_ring")]
    polygon: Polygon<f64>,
    classification: Classification,
    area_square_meters: f64,
    confidence: f64,
    estimated_value: f64,
    detected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

impl BuildingRecord {
    /// Build a record from validated parts, deriving classification and value from the area.
    ///
    /// `area` is clamped to be non-negative and `confidence` to `[0, 1]`; both must already be
    /// on their canonical scales.
    pub fn new(id: impl Into<String>, polygon: Polygon<f64>, area: f64, confidence: f64, detected_at: DateTime<Utc>) -> Self {
        let area = if area.is_finite() { area.max(0.0) } else { 0.0 };
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        let classification = classify(area);
        Self {
            id: id.into(),
            polygon,
            classification,
            area_square_meters: area,
            confidence,
            estimated_value: estimate(classification, area),
            detected_at,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach passthrough columns preserved for downstream consumers.
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Copy of this record under a different classification, with the value recomputed.
    pub fn with_classification(&self, classification: Classification) -> Self {
        Self {
            classification,
            estimated_value: estimate(classification, self.area_square_meters),
            ..self.clone()
        }
    }

    #[inline] pub fn id(&self) -> &str { &self.id }

    /// Closed exterior ring, at least four points.
    #[inline] pub fn polygon(&self) -> &Polygon<f64> { &self.polygon }

    #[inline] pub fn classification(&self) -> Classification { self.classification }

    #[inline] pub fn area_square_meters(&self) -> f64 { self.area_square_meters }

    /// Detection confidence in `[0, 1]`.
    #[inline] pub fn confidence(&self) -> f64 { self.confidence }

    #[inline] pub fn estimated_value(&self) -> f64 { self.estimated_value }

    #[inline] pub fn detected_at(&self) -> DateTime<Utc> { self.detected_at }

    #[inline] pub fn attributes(&self) -> &BTreeMap<String, String> { &self.attributes }

    /// Centroid of the footprint (lon, lat).
    pub fn centroid(&self) -> Option<Point<f64>> { self.polygon.centroid() }
}

/// Serialize a polygon as its exterior ring: `[[lon, lat], ...]`.
fn serialize_ring<S: Serializer>(polygon: &Polygon<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    let ring = polygon.exterior();
    let mut seq = serializer.serialize_seq(Some(ring.0.len()))?;
    for c in ring.coords() {
        seq.serialize_element(&[c.x, c.y])?;
    }
    seq.end()
}
