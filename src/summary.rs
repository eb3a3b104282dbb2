//! Aggregate statistics over a record view, plus the revenue projection shown next to them.

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::{BuildingRecord, Classification}};

/// Neumaier compensated sum. Keeps totals over tens of thousands of values stable.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StableSum {
    sum: f64,
    compensation: f64,
}

impl StableSum {
    pub(crate) fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline]
    pub(crate) fn value(&self) -> f64 { self.sum + self.compensation }
}

/// Totals for one classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassBreakdown {
    pub classification: Classification,
    pub count: u64,
    pub total_area: f64,
    pub total_value: f64,
    /// Share of the view's record count, in percent.
    pub percent: f64,
}

/// Statistics over one view of the records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub total_area: f64,
    pub total_value: f64,
    /// Mean confidence in `[0, 1]`; 0 for an empty view.
    pub average_confidence: f64,
    /// One entry per classification in canonical order, zeros included.
    pub by_class: Vec<ClassBreakdown>,
}

impl Summary {
    #[inline]
    pub fn count_of(&self, class: Classification) -> u64 {
        self.by_class[class.index()].count
    }

    #[inline]
    pub fn breakdown(&self, class: Classification) -> &ClassBreakdown {
        &self.by_class[class.index()]
    }

    /// Revenue projection for the view's total value.
    pub fn revenue(&self, model: &RevenueModel) -> RevenueProjection {
        model.project(self.total_value)
    }
}

/// Single-pass aggregation. Pure: the same records always give the same summary.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>) -> Summary {
    let mut count = 0u64;
    let mut area = StableSum::default();
    let mut value = StableSum::default();
    let mut confidence = StableSum::default();
    let mut class_count = [0u64; Classification::COUNT];
    let mut class_area = [StableSum::default(); Classification::COUNT];
    let mut class_value = [StableSum::default(); Classification::COUNT];

    for record in records {
        let i = record.classification().index();
        count += 1;
        area.add(record.area_square_meters());
        value.add(record.estimated_value());
        confidence.add(record.confidence());
        class_count[i] += 1;
        class_area[i].add(record.area_square_meters());
        class_value[i].add(record.estimated_value());
    }

    let by_class = Classification::ALL.iter().map(|&classification| {
        let i = classification.index();
        ClassBreakdown {
            classification,
            count: class_count[i],
            total_area: class_area[i].value(),
            total_value: class_value[i].value(),
            percent: if count == 0 { 0.0 } else { class_count[i] as f64 * 100.0 / count as f64 },
        }
    }).collect();

    Summary {
        count,
        total_area: area.value(),
        total_value: value.value(),
        average_confidence: if count == 0 { 0.0 } else { confidence.value() / count as f64 },
        by_class,
    }
}

/// Tax collection assumptions behind the revenue projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueModel {
    /// Share of buildings currently on the tax roll.
    pub registered_share: f64,
    /// Share of assessed value actually collected from registered buildings.
    pub collection_rate: f64,
}

impl Default for RevenueModel {
    fn default() -> Self {
        Self { registered_share: 0.32, collection_rate: 0.45 }
    }
}

impl RevenueModel {
    /// Both shares must be fractions in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("registered_share", self.registered_share), ("collection_rate", self.collection_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    pub fn project(&self, total_value: f64) -> RevenueProjection {
        let potential = total_value;
        let current = total_value * self.registered_share * self.collection_rate;
        let uplift = potential - current;
        RevenueProjection {
            potential,
            current,
            uplift,
            uplift_percent: if current > 0.0 { uplift / current * 100.0 } else { 0.0 },
        }
    }
}

/// Potential against currently collected revenue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevenueProjection {
    pub potential: f64,
    pub current: f64,
    pub uplift: f64,
    pub uplift_percent: f64,
}
