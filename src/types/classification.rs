use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseClassificationError;

/// Land-use label assigned to a building footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Residential,
    Commercial,
    Industrial,
    Institutional,
    Mixed,
}

/// Per-class display and valuation properties. One row per class, in `Classification::ALL` order.
struct ClassInfo {
    name: &'static str,
    label: &'static str,
    color: &'static str,
    rate: f64,
}

const CLASS_INFO: [ClassInfo; Classification::COUNT] = [
    ClassInfo { name: "residential",   label: "Residential",   color: "#3B82F6", rate: 500.0 },
    ClassInfo { name: "commercial",    label: "Commercial",    color: "#F59E0B", rate: 1200.0 },
    ClassInfo { name: "industrial",    label: "Industrial",    color: "#8B5CF6", rate: 600.0 },
    ClassInfo { name: "institutional", label: "Institutional", color: "#10B981", rate: 800.0 },
    ClassInfo { name: "mixed",         label: "Mixed Use",     color: "#6B7280", rate: 700.0 },
];

impl Classification {
    pub const COUNT: usize = 5;

    pub const ALL: [Classification; Self::COUNT] = [
        Classification::Residential,
        Classification::Commercial,
        Classification::Industrial,
        Classification::Institutional,
        Classification::Mixed,
    ];

    /// Position of this class in `ALL` (and in every per-class table).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Classification::Residential => 0,
            Classification::Commercial => 1,
            Classification::Industrial => 2,
            Classification::Institutional => 3,
            Classification::Mixed => 4,
        }
    }

    #[inline] fn info(self) -> &'static ClassInfo { &CLASS_INFO[self.index()] }

    /// Machine name, e.g. `"residential"`.
    #[inline] pub fn as_str(self) -> &'static str { self.info().name }

    /// Human-readable label, e.g. `"Mixed Use"`.
    #[inline] pub fn label(self) -> &'static str { self.info().label }

    /// Map fill color as a CSS hex string.
    #[inline] pub fn color(self) -> &'static str { self.info().color }

    /// Valuation rate in local currency per square meter.
    #[inline] pub fn rate(self) -> f64 { self.info().rate }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = ParseClassificationError;

    /// Case-insensitive; accepts `mixed-use`/`mixed_use` for `Mixed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(Classification::Residential),
            "commercial" => Ok(Classification::Commercial),
            "industrial" => Ok(Classification::Industrial),
            "institutional" => Ok(Classification::Institutional),
            "mixed" | "mixed-use" | "mixed_use" | "mixed use" => Ok(Classification::Mixed),
            _ => Err(ParseClassificationError(s.to_string())),
        }
    }
}

/// A subset of the five classes. The empty set means "no restriction" when used as a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ClassificationSet(u8);

impl ClassificationSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self((1 << Classification::COUNT) - 1);

    #[inline] fn bit(class: Classification) -> u8 { 1 << class.index() }

    #[inline] pub fn is_empty(&self) -> bool { self.0 == 0 }

    #[inline] pub fn len(&self) -> usize { self.0.count_ones() as usize }

    #[inline] pub fn contains(&self, class: Classification) -> bool { self.0 & Self::bit(class) != 0 }

    #[inline] pub fn insert(&mut self, class: Classification) { self.0 |= Self::bit(class) }

    #[inline] pub fn remove(&mut self, class: Classification) { self.0 &= !Self::bit(class) }

    /// Iterate members in `Classification::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = Classification> + '_ {
        Classification::ALL.into_iter().filter(move |&c| self.contains(c))
    }

    /// Parse a comma-separated list such as `"residential,commercial"`. Blank entries are ignored.
    pub fn parse_list(list: &str) -> Result<Self, ParseClassificationError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Classification>)
            .collect()
    }
}

impl FromIterator<Classification> for ClassificationSet {
    fn from_iter<I: IntoIterator<Item = Classification>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for class in iter { set.insert(class) }
        set
    }
}

impl Serialize for ClassificationSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ClassificationSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let classes = Vec::<Classification>::deserialize(deserializer)?;
        Ok(classes.into_iter().collect())
    }
}
