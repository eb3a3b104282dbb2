mod classification;
mod criteria;
mod record;

pub use classification::{Classification, ClassificationSet};
pub use crate::error::ParseClassificationError;
pub use criteria::{FilterCriteria, SizeBound, SizeRange};
pub use record::BuildingRecord;
