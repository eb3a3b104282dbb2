//! Record views under transient filter criteria.

use crate::types::{BuildingRecord, FilterCriteria};

/// Absorbs float error in `confidence * 100`, so 0.29 passes a 29% threshold.
const PERCENT_EPSILON: f64 = 1e-9;

/// Whether `record` passes every criterion: class membership (an empty set admits all),
/// inclusive area range, and minimum confidence percentage.
#[inline]
pub fn matches(record: &BuildingRecord, criteria: &FilterCriteria) -> bool {
    (criteria.types.is_empty() || criteria.types.contains(record.classification()))
        && criteria.size.contains(record.area_square_meters())
        && record.confidence() * 100.0 + PERCENT_EPSILON >= criteria.min_confidence_pct
}

/// Records matching `criteria`, in their original order. The input is never modified.
pub fn filter<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>, criteria: &FilterCriteria) -> Vec<&'a BuildingRecord> {
    records.into_iter().filter(|r| matches(r, criteria)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        geom::{RegionBounds, parse_polygon},
        types::{Classification, ClassificationSet, SizeRange},
    };

    fn record(id: &str, area: f64, confidence: f64) -> BuildingRecord {
        let polygon = parse_polygon("POLYGON((11 10, 11.5 10, 11.5 10.5))", &RegionBounds::default()).unwrap();
        BuildingRecord::new(id, polygon, area, confidence, Utc::now())
    }

    fn ids(view: &[&BuildingRecord]) -> Vec<String> {
        view.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn default_criteria_keep_everything() {
        let records = vec![record("a", 10.0, 0.0), record("b", 5000.0, 1.0)];
        assert_eq!(filter(&records, &FilterCriteria::default()).len(), 2);
    }

    #[test]
    fn type_size_and_confidence() {
        let records = vec![
            record("a", 300.0, 0.95),
            record("b", 30.0, 0.95),
            record("c", 300.0, 0.5),
            record("d", 2000.0, 0.95),
        ];
        let criteria = FilterCriteria::default()
            .with_types([Classification::Commercial].into_iter().collect::<ClassificationSet>())
            .with_size(SizeRange::between(100.0, 500.0))
            .with_min_confidence(90.0);
        assert_eq!(ids(&filter(&records, &criteria)), vec!["a"]);
    }

    #[test]
    fn size_bounds_are_inclusive() {
        let records = vec![record("lo", 100.0, 1.0), record("hi", 500.0, 1.0), record("out", 500.5, 1.0)];
        let criteria = FilterCriteria::default().with_size(SizeRange::between(100.0, 500.0));
        assert_eq!(ids(&filter(&records, &criteria)), vec!["lo", "hi"]);
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let records = vec![record("a", 100.0, 0.29), record("b", 100.0, 0.28)];
        let criteria = FilterCriteria::default().with_min_confidence(29.0);
        assert_eq!(ids(&filter(&records, &criteria)), vec!["a"]);
    }

    #[test]
    fn preserves_order() {
        let records: Vec<_> = (0..6).map(|i| record(&format!("r{i}"), 100.0 * i as f64, 0.8)).collect();
        let criteria = FilterCriteria::default().with_size(SizeRange::at_least(150.0));
        assert_eq!(ids(&filter(&records, &criteria)), vec!["r2", "r3", "r4", "r5"]);
    }
}
