//! Population grid feature source.

use async_trait::async_trait;
use geo::{Area, Coord, LineString, Polygon, Winding};
use geoprocessing::FeatureTable;
use hri_common::Extent;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::arcgis::{build_client, query_all, spatial_query_params};
use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};

/// A source of population polygons with numeric attributes.
#[async_trait]
pub trait PopulationSource: Send + Sync {
    /// Features intersecting `extent`, in the extent's spatial reference.
    async fn fetch_population(&self, extent: &Extent) -> Result<FeatureTable>;
}

/// Population grid served by an ArcGIS FeatureServer layer.
pub struct FeatureServerPopulation {
    client: Client,
    url: String,
    page_size: usize,
}

impl FeatureServerPopulation {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.population_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }
}

fn parse_ring(ring: &Value) -> Option<Vec<Coord<f64>>> {
    ring.as_array()?
        .iter()
        .map(|pt| {
            let pt = pt.as_array()?;
            Some(Coord {
                x: pt.first()?.as_f64()?,
                y: pt.get(1)?.as_f64()?,
            })
        })
        .collect()
}

/// Convert an Esri JSON polygon (`{"rings": [...]}`) to a polygon.
///
/// Esri outer rings run clockwise and holes counter-clockwise. A
/// multi-part geometry keeps its largest part.
pub fn parse_esri_polygon(geometry: &Value) -> Option<Polygon<f64>> {
    let rings = geometry.get("rings")?.as_array()?;

    let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        let coords = parse_ring(ring)?;
        if coords.len() < 4 {
            continue;
        }
        let ring = LineString::new(coords);
        // clockwise or degenerate rings start a new part
        if !ring.is_ccw() || parts.is_empty() {
            parts.push((ring, Vec::new()));
        } else if let Some(last) = parts.last_mut() {
            last.1.push(ring);
        }
    }

    if parts.len() > 1 {
        debug!(parts = parts.len(), "Multi-part population feature, keeping largest part");
    }

    parts
        .into_iter()
        .map(|(outer, holes)| Polygon::new(outer, holes))
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// Build a feature table from query features. Numeric attributes become
/// fields; the object id becomes the key.
pub fn features_to_table(name: &str, features: &[Value], object_id_field: &str) -> Result<FeatureTable> {
    let mut table = FeatureTable::new(name, object_id_field);

    for (i, feature) in features.iter().enumerate() {
        let attributes = feature
            .get("attributes")
            .and_then(Value::as_object)
            .ok_or_else(|| SourceError::InvalidResponse("feature without attributes".to_string()))?;

        let key = match attributes.get(object_id_field) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => i.to_string(),
        };
        let geometry = feature.get("geometry").and_then(parse_esri_polygon);

        let row = table.insert(key, geometry)?;
        for (field, value) in attributes {
            if field == object_id_field {
                continue;
            }
            if let Some(v) = value.as_f64() {
                table.add_field(field);
                table.set_value(row, field, Some(v))?;
            }
        }
    }

    Ok(table)
}

#[async_trait]
impl PopulationSource for FeatureServerPopulation {
    #[instrument(skip(self, extent), fields(url = %self.url))]
    async fn fetch_population(&self, extent: &Extent) -> Result<FeatureTable> {
        let mut params = spatial_query_params(extent);
        params.push(("where", "1=1".to_string()));
        params.push(("outFields", "*".to_string()));
        params.push(("returnGeometry", "true".to_string()));
        params.push(("outSR", extent.srs.wkid.to_string()));

        let url = format!("{}/query", self.url);
        let (features, oid_field) = query_all(&self.client, &url, &params, self.page_size).await?;
        let oid_field = oid_field.unwrap_or_else(|| "OBJECTID".to_string());

        let table = features_to_table("population", &features, &oid_field)?;
        info!(features = table.len(), "Fetched population grid");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use serde_json::json;

    #[test]
    fn test_parse_square_with_hole() {
        let geometry = json!({
            "rings": [
                [[0.0, 0.0], [0.0, 100.0], [100.0, 100.0], [100.0, 0.0], [0.0, 0.0]],
                [[10.0, 10.0], [20.0, 10.0], [20.0, 20.0], [10.0, 20.0], [10.0, 10.0]]
            ]
        });
        let polygon = parse_esri_polygon(&geometry).unwrap();
        assert_eq!(polygon.interiors().len(), 1);
        assert!((polygon.unsigned_area() - 9900.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_multipart_keeps_largest() {
        let geometry = json!({
            "rings": [
                [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
                [[5.0, 5.0], [5.0, 15.0], [15.0, 15.0], [15.0, 5.0], [5.0, 5.0]]
            ]
        });
        let polygon = parse_esri_polygon(&geometry).unwrap();
        assert!((polygon.unsigned_area() - 100.0).abs() < 1e-9);
        assert!(parse_esri_polygon(&json!({"x": 1.0, "y": 2.0})).is_none());
    }

    #[test]
    fn test_parse_counter_clockwise_rings_become_holes() {
        // outer ring listed counter-clockwise first, then a clockwise part
        let geometry = json!({
            "rings": [
                [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]],
                [[10.0, 10.0], [10.0, 13.0], [13.0, 13.0], [13.0, 10.0], [10.0, 10.0]]
            ]
        });
        let polygon = parse_esri_polygon(&geometry).unwrap();
        // 16 - 1 beats 9
        assert_eq!(polygon.interiors().len(), 1);
        assert!((polygon.unsigned_area() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_features_to_table() {
        let features = vec![
            json!({
                "attributes": {"OBJECTID": 7, "Einwohner": 42, "GITTER_ID_100m": "CRS3035RES100mN2689100E4337000"},
                "geometry": {"rings": [[[0.0, 0.0], [0.0, 100.0], [100.0, 100.0], [100.0, 0.0], [0.0, 0.0]]]}
            }),
            json!({
                "attributes": {"OBJECTID": 8, "Einwohner": null},
                "geometry": {"rings": [[[100.0, 0.0], [100.0, 100.0], [200.0, 100.0], [200.0, 0.0], [100.0, 0.0]]]}
            }),
        ];
        let table = features_to_table("population", &features, "OBJECTID").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value("7", "Einwohner"), Some(42.0));
        assert_eq!(table.value("8", "Einwohner"), None);
        assert!(!table.has_field("GITTER_ID_100m"));
        assert!(table.geometry(1).is_some());
    }
}
