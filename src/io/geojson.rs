use std::{fs::File, io::{BufWriter, Write}, path::Path};

use serde_json::{Value, json};

use crate::{error::ExportError, types::BuildingRecord};

/// Export records as a GeoJSON FeatureCollection of Polygon features, styled by classification.
pub fn to_geojson<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>) -> Value {
    let features: Vec<Value> = records.into_iter().map(|r| {
        let ring: Vec<[f64; 2]> = r.polygon().exterior().coords().map(|c| [c.x, c.y]).collect();
        let class = r.classification();
        json!({
            "type": "Feature",
            "id": r.id(),
            "geometry": {
                "type": "Polygon",
                "coordinates": [ring],
            },
            "properties": {
                "id": r.id(),
                "classification": class.as_str(),
                "label": class.label(),
                "color": class.color(),
                "area_in_meters": r.area_square_meters(),
                "confidence": r.confidence(),
                "estimated_value": r.estimated_value(),
                "detected_at": r.detected_at().to_rfc3339(),
            },
        })
    }).collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

pub fn write_geojson<'a, W: Write>(records: impl IntoIterator<Item = &'a BuildingRecord>, writer: W) -> Result<(), ExportError> {
    serde_json::to_writer(writer, &to_geojson(records))?;
    Ok(())
}

pub fn write_geojson_file<'a>(records: impl IntoIterator<Item = &'a BuildingRecord>, path: &Path) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    write_geojson(records, &mut out)?;
    out.flush()?;
    Ok(())
}
