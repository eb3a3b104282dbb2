mod bbox;
mod wkt;

pub use bbox::RegionBounds;
pub use wkt::{close_ring, parse_polygon, to_wkt};
