//! GeoJSON export of feature tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use hri_common::SpatialReference;
use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::table::FeatureTable;

fn feature(table: &FeatureTable, row: usize, field_names: &[&str]) -> Feature {
    let row = table.row(row);
    let mut properties = JsonObject::new();
    properties.insert(table.key_field().to_string(), JsonValue::from(row.key()));
    for field in field_names {
        let value = row.get(field).map_or(JsonValue::Null, JsonValue::from);
        properties.insert(field.to_string(), value);
    }

    Feature {
        bbox: None,
        geometry: row
            .geometry()
            .map(|polygon| Geometry::new(geojson::Value::from(polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Collection-level members: the table name and a named EPSG CRS.
fn collection_members(table: &FeatureTable, srs: &SpatialReference) -> JsonObject {
    let mut members = JsonObject::new();
    members.insert("name".to_string(), JsonValue::from(table.name()));
    members.insert(
        "crs".to_string(),
        json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", srs.wkid) }
        }),
    );
    members
}

/// Feature collection with the key field and every numeric field as
/// properties. Null fields are written as JSON `null`.
pub fn table_to_geojson(table: &FeatureTable, srs: &SpatialReference) -> FeatureCollection {
    let field_names: Vec<&str> = table.field_names().collect();
    FeatureCollection {
        bbox: None,
        features: (0..table.len())
            .map(|row| feature(table, row, &field_names))
            .collect(),
        foreign_members: Some(collection_members(table, srs)),
    }
}

/// Write `table` to `path` as GeoJSON, one feature at a time.
pub fn write_geojson(table: &FeatureTable, srs: &SpatialReference, path: &Path) -> Result<()> {
    let field_names: Vec<&str> = table.field_names().collect();
    let mut writer = BufWriter::new(File::create(path)?);

    writer.write_all(br#"{"type":"FeatureCollection""#)?;
    for (key, value) in &collection_members(table, srs) {
        write!(writer, ",{}:{}", JsonValue::from(key.as_str()), value)?;
    }
    writer.write_all(br#","features":["#)?;
    for row in 0..table.len() {
        if row > 0 {
            writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut writer, &feature(table, row, &field_names))?;
    }
    writer.write_all(b"]}")?;
    writer.flush()?;

    debug!(path = %path.display(), features = table.len(), "Wrote GeoJSON");
    Ok(())
}
