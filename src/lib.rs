#![doc = "OpenFootprint public API"]
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod geom;
pub mod ingest;
pub mod io;
pub mod store;
pub mod summary;
pub mod types;

#[doc(inline)]
pub use types::{BuildingRecord, Classification, ClassificationSet, FilterCriteria, SizeBound, SizeRange};

#[doc(inline)]
pub use config::IngestConfig;

#[doc(inline)]
pub use ingest::{CancelToken, Ingestor, Progress};

#[doc(inline)]
pub use store::{Publish, RecordSet, RecordStore, ingest_into};

#[doc(inline)]
pub use summary::{RevenueModel, Summary, aggregate};

#[doc(inline)]
pub use filter::filter;
