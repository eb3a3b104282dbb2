//! Single-ring WKT `POLYGON((lon lat, ...))` parsing with malformed-input recovery.

use std::{collections::HashSet, fmt::Write as _, sync::LazyLock};

use geo::{Coord, LineString, Polygon};
use regex::Regex;

use crate::error::GeometryError;
use super::RegionBounds;

static POLYGON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^POLYGON\s*\(\((.*)\)\)$").expect("static polygon pattern")
});

/// Characters that can appear inside a decimal coordinate.
#[inline]
fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')
}

/// Collapse whitespace runs into single spaces and trim.
///
/// A line break sitting between two numeric characters was inserted inside a number by the
/// exporter, so it is removed outright rather than turned into a separator.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\r' || c == '\n' {
            let start = i;
            while i < chars.len() && (chars[i] == '\r' || chars[i] == '\n') { i += 1 }
            let before = start.checked_sub(1).map(|j| chars[j]);
            let after = chars.get(i).copied();
            let joins_number = before.is_some_and(is_numeric_char) && after.is_some_and(is_numeric_char);
            if !joins_number { pending_space = true }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() { out.push(' ') }
            pending_space = false;
            out.push(c);
        }
        i += 1;
    }
    out
}

/// Parse one `lon lat` token. Returns `None` for any token that must be dropped.
fn parse_pair(token: &str, bounds: &RegionBounds) -> Option<Coord<f64>> {
    let mut fields = token.split_whitespace();
    let (lon, lat) = (fields.next()?, fields.next()?);
    if fields.next().is_some() { return None }

    let x = lon.parse::<f64>().ok()?;
    let y = lat.parse::<f64>().ok()?;
    bounds.contains(x, y).then_some(Coord { x, y })
}

/// Append a copy of the first point if the ring is not already closed. Idempotent.
pub fn close_ring(coords: &mut Vec<Coord<f64>>) {
    if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
        if first != last { coords.push(first) }
    }
}

/// Number of distinct points, counting up to `limit`.
fn distinct_points(coords: &[Coord<f64>], limit: usize) -> usize {
    let mut seen = HashSet::with_capacity(limit);
    for c in coords {
        seen.insert((c.x.to_bits(), c.y.to_bits()));
        if seen.len() >= limit { break }
    }
    seen.len()
}

/// Parse WKT polygon text into a closed ring of in-bounds points.
///
/// Coordinate pairs that are malformed or outside `bounds` are dropped individually; the
/// polygon only fails if fewer than three distinct points survive. The returned exterior ring
/// always has at least four points, the last equal to the first.
pub fn parse_polygon(text: &str, bounds: &RegionBounds) -> Result<Polygon<f64>, GeometryError> {
    let clean = normalize_whitespace(text);
    if clean.is_empty() { return Err(GeometryError::Empty) }

    let body = POLYGON_RE.captures(&clean)
        .and_then(|caps| caps.get(1))
        .ok_or(GeometryError::MissingWrapper)?
        .as_str();

    let mut coords: Vec<Coord<f64>> = body.split(',')
        .filter_map(|token| parse_pair(token, bounds))
        .collect();

    // Ignore an explicit closing point when counting the ring's own vertices.
    let open_len = match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first == last => coords.len() - 1,
        _ => coords.len(),
    };
    if open_len < 3 || distinct_points(&coords[..open_len], 3) < 3 {
        return Err(GeometryError::TooFewPoints { valid: open_len });
    }

    close_ring(&mut coords);
    Ok(Polygon::new(LineString::new(coords), vec![]))
}

/// Render the exterior ring as WKT. Coordinates use the shortest exact decimal form, so
/// `parse_polygon(&to_wkt(p), ..)` reproduces `p` for in-bounds rings.
pub fn to_wkt(polygon: &Polygon<f64>) -> String {
    let mut out = String::from("POLYGON((");
    for (i, c) in polygon.exterior().coords().enumerate() {
        if i > 0 { out.push_str(", ") }
        let _ = write!(out, "{} {}", c.x, c.y);
    }
    out.push_str("))");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "POLYGON((11.0 10.0, 11.001 10.0, 11.001 10.001, 11.0 10.001, 11.0 10.0))";

    fn ring(p: &Polygon<f64>) -> Vec<(f64, f64)> {
        p.exterior().coords().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn parses_closed_square() {
        let p = parse_polygon(SQUARE, &RegionBounds::default()).unwrap();
        assert_eq!(p.exterior().0.len(), 5);
        assert_eq!(ring(&p)[0], (11.0, 10.0));
        assert_eq!(ring(&p)[4], (11.0, 10.0));
    }

    #[test]
    fn closes_open_ring() {
        let p = parse_polygon("POLYGON((11 10, 11.5 10, 11.5 10.5))", &RegionBounds::default()).unwrap();
        let r = ring(&p);
        assert_eq!(r.len(), 4);
        assert_eq!(r.first(), r.last());
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let p = parse_polygon("polygon ((11 10, 11.5 10, 11.5 10.5))", &RegionBounds::default());
        assert!(p.is_ok());
    }

    #[test]
    fn newline_inside_number_is_joined() {
        let split = "POLYGON((11.0 10.0, 11.00\n1 10.0, 11.001 10.0\r\n01, 11.0 10.001, 11.0 10.0))";
        let a = parse_polygon(split, &RegionBounds::default()).unwrap();
        let b = parse_polygon(SQUARE, &RegionBounds::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn newline_between_tokens_is_a_separator() {
        let text = "POLYGON((11.0 10.0,\n11.001\t10.0,   11.001 \n10.001, 11.0 10.001))";
        let p = parse_polygon(text, &RegionBounds::default()).unwrap();
        assert_eq!(p.exterior().0.len(), 5);
    }

    #[test]
    fn drops_bad_and_out_of_bounds_pairs() {
        let text = "POLYGON((11 10, abc 10, 11.5 10 3, 50.0 10.0, 11.5 10, 11.5 10.5))";
        let p = parse_polygon(text, &RegionBounds::default()).unwrap();
        assert_eq!(ring(&p), vec![(11.0, 10.0), (11.5, 10.0), (11.5, 10.5), (11.0, 10.0)]);
    }

    #[test]
    fn too_few_points_fails() {
        let err = parse_polygon("POLYGON((11 10, 11.5 10, 0 0))", &RegionBounds::default()).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints { valid: 2 });
    }

    #[test]
    fn closed_triangle_of_two_points_fails() {
        let err = parse_polygon("POLYGON((11 10, 11.5 10, 11 10))", &RegionBounds::default()).unwrap_err();
        assert_eq!(err, GeometryError::TooFewPoints { valid: 2 });
    }

    #[test]
    fn repeated_points_are_not_distinct() {
        let err = parse_polygon("POLYGON((11 10, 11 10, 11.5 10))", &RegionBounds::default()).unwrap_err();
        assert!(matches!(err, GeometryError::TooFewPoints { .. }));
    }

    #[test]
    fn missing_wrapper_fails() {
        let bounds = RegionBounds::default();
        assert_eq!(parse_polygon("LINESTRING(11 10, 11.5 10)", &bounds), Err(GeometryError::MissingWrapper));
        assert_eq!(parse_polygon("POLYGON(11 10, 11.5 10, 11.5 10.5)", &bounds), Err(GeometryError::MissingWrapper));
        assert_eq!(parse_polygon(" \n\t", &bounds), Err(GeometryError::Empty));
    }

    #[test]
    fn close_ring_is_idempotent() {
        let mut coords = vec![Coord { x: 11.0, y: 10.0 }, Coord { x: 11.5, y: 10.0 }, Coord { x: 11.5, y: 10.5 }];
        close_ring(&mut coords);
        let once = coords.clone();
        close_ring(&mut coords);
        assert_eq!(coords, once);
        assert_eq!(coords.len(), 4);
    }

    #[test]
    fn wkt_round_trip() {
        let p = parse_polygon(SQUARE, &RegionBounds::default()).unwrap();
        let again = parse_polygon(&to_wkt(&p), &RegionBounds::default()).unwrap();
        assert_eq!(p, again);
    }

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize_whitespace("  a \t\t b\n\nc  "), "a b c");
        assert_eq!(normalize_whitespace("1.2\n3 4"), "1.23 4");
    }
}
