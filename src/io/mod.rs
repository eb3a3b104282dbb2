//! Export surfaces for a record view, organized by format.
//!
//! - `csv` - delimited table of record fields plus WKT geometry
//! - `geojson` - FeatureCollection for map rendering
//! - `manifest` - provenance summary written next to exports

mod csv;
mod geojson;
mod manifest;

pub use self::csv::{to_dataframe, write_csv, write_csv_file, write_csv_string};
pub use self::geojson::{to_geojson, write_geojson, write_geojson_file};
pub use self::manifest::Manifest;
