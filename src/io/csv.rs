//! CSV export through a polars DataFrame.

use std::{fs::File, io::Write, path::Path};

use polars::{frame::DataFrame, io::SerWriter, prelude::{CsvWriter, NamedFrom, QuoteStyle}, series::Series};

use crate::{error::ExportError, geom::to_wkt, types::BuildingRecord};

/// Export table with stable column order:
/// `id, classification, area_in_meters, confidence, estimated_value, detected_at,
/// centroid_lon, centroid_lat, geometry`.
pub fn to_dataframe<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>) -> Result<DataFrame, ExportError> {
    let records: Vec<&BuildingRecord> = records.into_iter().collect();
    let centroids: Vec<_> = records.iter().map(|r| r.centroid()).collect();

    let df = DataFrame::new(vec![
        Series::new("id".into(), records.iter().map(|r| r.id()).collect::<Vec<_>>()).into(),
        Series::new("classification".into(), records.iter().map(|r| r.classification().as_str()).collect::<Vec<_>>()).into(),
        Series::new("area_in_meters".into(), records.iter().map(|r| r.area_square_meters()).collect::<Vec<_>>()).into(),
        Series::new("confidence".into(), records.iter().map(|r| r.confidence()).collect::<Vec<_>>()).into(),
        Series::new("estimated_value".into(), records.iter().map(|r| r.estimated_value()).collect::<Vec<_>>()).into(),
        Series::new("detected_at".into(), records.iter().map(|r| r.detected_at().to_rfc3339()).collect::<Vec<_>>()).into(),
        Series::new("centroid_lon".into(), centroids.iter().map(|c| c.map(|p| p.x())).collect::<Vec<Option<f64>>>()).into(),
        Series::new("centroid_lat".into(), centroids.iter().map(|c| c.map(|p| p.y())).collect::<Vec<Option<f64>>>()).into(),
        Series::new("geometry".into(), records.iter().map(|r| to_wkt(r.polygon())).collect::<Vec<_>>()).into(),
    ])?;
    Ok(df)
}

fn separator(delimiter: char) -> Result<u8, ExportError> {
    match u8::try_from(delimiter) {
        Ok(b) if b.is_ascii() && !matches!(b, b'"' | b'\n' | b'\r') => Ok(b),
        _ => Err(ExportError::Delimiter(delimiter)),
    }
}

/// Write records as delimited text. Fields holding the delimiter, a quote or a newline are quoted.
pub fn write_csv<'a, W: Write>(
    records: impl IntoIterator<Item = &'a BuildingRecord>,
    writer: W,
    delimiter: char,
) -> Result<(), ExportError> {
    let separator = separator(delimiter)?;
    let mut df = to_dataframe(records)?;
    CsvWriter::new(writer)
        .include_header(true)
        .with_separator(separator)
        .with_quote_style(QuoteStyle::Necessary)
        .finish(&mut df)?;
    Ok(())
}

pub fn write_csv_string<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>, delimiter: char) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer, delimiter)?;
    String::from_utf8(buffer).map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

pub fn write_csv_file<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>, path: &Path, delimiter: char) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_csv(records, file, delimiter)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::geom::{RegionBounds, parse_polygon};

    fn records() -> Vec<BuildingRecord> {
        let bounds = RegionBounds::default();
        let at = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        vec![
            BuildingRecord::new("6FX8+2C-0", parse_polygon("POLYGON((11 10, 11.5 10, 11.5 10.5))", &bounds).unwrap(), 300.0, 0.9, at),
            BuildingRecord::new("6FX8+3D-1", parse_polygon("POLYGON((11 10, 11.5 10, 11.5 10.5))", &bounds).unwrap(), 30.0, 0.5, at),
        ]
    }

    #[test]
    fn dataframe_shape() {
        let records = records();
        let df = to_dataframe(&records).unwrap();
        assert_eq!(df.height(), 2);
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec![
            "id", "classification", "area_in_meters", "confidence", "estimated_value",
            "detected_at", "centroid_lon", "centroid_lat", "geometry",
        ]);
    }

    #[test]
    fn geometry_is_quoted() {
        let records = records();
        let text = write_csv_string(&records, ',').unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,classification,area_in_meters,confidence,estimated_value,detected_at,centroid_lon,centroid_lat,geometry"),
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("6FX8+2C-0,commercial,"));
        assert!(first.ends_with("\"POLYGON((11 10, 11.5 10, 11.5 10.5, 11 10))\""));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn alternate_delimiter_leaves_commas_unquoted_only_when_safe() {
        let records = records();
        let text = write_csv_string(&records, ';').unwrap();
        assert!(text.lines().next().unwrap().starts_with("id;classification;"));
        assert!(text.contains(";mixed;"));
    }

    #[test]
    fn rejects_quote_delimiter() {
        assert!(matches!(write_csv_string(&records(), '"'), Err(ExportError::Delimiter('"'))));
        assert!(matches!(write_csv_string(&records(), 'é'), Err(ExportError::Delimiter('é'))));
    }
}
