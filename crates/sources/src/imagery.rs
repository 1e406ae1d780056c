//! Imagery catalog: scene metadata queries and single-scene exports.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use geoprocessing::Raster;
use hri_common::{AcquisitionTime, Extent};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::arcgis::{build_client, query_all, spatial_query_params};
use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};
use crate::image_server::{export_image, lock_raster_rule, raster_function_rule, ExportRequest};

/// Fill requested for temperature cells the locked scene does not cover.
/// The 8-bit signed minimum, so it survives quantization to `S8`.
pub const TEMPERATURE_NO_DATA: f32 = -128.0;

/// Catalog fields requested for every scene.
pub const SCENE_FIELDS: &str = "OBJECTID,Name,AcquisitionDate,CloudCover,Best";

/// Metadata of one catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub object_id: i64,
    pub name: String,
    pub acquisition_date: DateTime<Utc>,
    /// Cloud cover fraction in [0, 1].
    pub cloud_cover: f64,
    /// Catalog quality rank; lower is better.
    pub best: Option<f64>,
}

impl SceneMetadata {
    pub fn month(&self) -> u32 {
        self.acquisition_date.month()
    }

    /// Parse the `attributes` object of a catalog query feature.
    pub fn from_attributes(attributes: &Value) -> Result<Self> {
        let field = |name: &str| attributes.get(name).filter(|v| !v.is_null());

        let object_id = field("OBJECTID")
            .and_then(Value::as_i64)
            .ok_or_else(|| SourceError::InvalidResponse("scene without OBJECTID".to_string()))?;
        let millis = field("AcquisitionDate").and_then(Value::as_i64).ok_or_else(|| {
            SourceError::InvalidResponse(format!("scene {} has no AcquisitionDate", object_id))
        })?;
        let acquisition_date = AcquisitionTime::from_epoch_millis(millis)
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        Ok(Self {
            object_id,
            name: field("Name").and_then(Value::as_str).unwrap_or_default().to_string(),
            acquisition_date,
            cloud_cover: field("CloudCover").and_then(Value::as_f64).unwrap_or(1.0),
            best: field("Best").and_then(Value::as_f64),
        })
    }
}

/// Searchable imagery catalog.
#[async_trait]
pub trait ImageryCatalog: Send + Sync {
    /// Scenes intersecting `extent` that satisfy `where_clause`.
    async fn query_scenes(&self, extent: &Extent, where_clause: &str) -> Result<Vec<SceneMetadata>>;

    /// Export one scene over `extent`, processed with `rendering_template`.
    async fn export_scene(
        &self,
        object_id: i64,
        extent: &Extent,
        cell_size: f64,
        rendering_template: &str,
    ) -> Result<Raster>;
}

/// ArcGIS ImageServer catalog client.
pub struct ImageServerCatalog {
    client: Client,
    url: String,
    page_size: usize,
    max_image_size: usize,
    no_data: Option<f32>,
}

impl ImageServerCatalog {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.imagery_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            max_image_size: config.max_image_size,
            no_data: Some(TEMPERATURE_NO_DATA),
        })
    }

    pub fn with_no_data(mut self, no_data: Option<f32>) -> Self {
        self.no_data = no_data;
        self
    }

    /// Export parameters for one locked scene.
    pub fn scene_request(&self, object_id: i64, cell_size: f64, rendering_template: &str) -> ExportRequest {
        ExportRequest {
            cell_size,
            mosaic_rule: Some(lock_raster_rule(object_id)),
            rendering_rule: Some(raster_function_rule(rendering_template)),
            no_data: self.no_data,
        }
    }
}

#[async_trait]
impl ImageryCatalog for ImageServerCatalog {
    #[instrument(skip(self, extent), fields(url = %self.url))]
    async fn query_scenes(&self, extent: &Extent, where_clause: &str) -> Result<Vec<SceneMetadata>> {
        let mut params = spatial_query_params(extent);
        params.push(("where", where_clause.to_string()));
        params.push(("outFields", SCENE_FIELDS.to_string()));
        params.push(("returnGeometry", "false".to_string()));

        let url = format!("{}/query", self.url);
        let (features, _) = query_all(&self.client, &url, &params, self.page_size).await?;

        let mut scenes = Vec::with_capacity(features.len());
        for feature in &features {
            let attributes = feature.get("attributes").unwrap_or(&Value::Null);
            match SceneMetadata::from_attributes(attributes) {
                Ok(scene) => scenes.push(scene),
                Err(e) => warn!(error = %e, "Skipping catalog item"),
            }
        }

        info!(count = scenes.len(), "Queried imagery catalog");
        Ok(scenes)
    }

    #[instrument(skip(self, extent), fields(url = %self.url))]
    async fn export_scene(
        &self,
        object_id: i64,
        extent: &Extent,
        cell_size: f64,
        rendering_template: &str,
    ) -> Result<Raster> {
        let request = self.scene_request(object_id, cell_size, rendering_template);
        export_image(&self.client, &self.url, extent, &request, self.max_image_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_server::tile_params;
    use hri_common::BoundingBox;
    use serde_json::json;

    #[test]
    fn test_scene_from_attributes() {
        let attrs = json!({
            "OBJECTID": 3187221,
            "Name": "LC09_L2SP_195025_20230815",
            "AcquisitionDate": 1692057600000i64,
            "CloudCover": 0.02,
            "Best": 1500000.0
        });
        let scene = SceneMetadata::from_attributes(&attrs).unwrap();
        assert_eq!(scene.object_id, 3187221);
        assert_eq!(scene.month(), 8);
        assert_eq!(scene.cloud_cover, 0.02);
        assert_eq!(scene.best, Some(1500000.0));
    }

    #[test]
    fn test_scene_without_date_is_rejected() {
        let attrs = json!({"OBJECTID": 1, "AcquisitionDate": null});
        assert!(matches!(
            SceneMetadata::from_attributes(&attrs),
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_scene_request_declares_fill_value() {
        let catalog = ImageServerCatalog::new(&SourcesConfig::default()).unwrap();
        let request = catalog.scene_request(3187221, 30.0, "Band 10 Surface Temperature in Celsius");
        assert_eq!(request.no_data, Some(TEMPERATURE_NO_DATA));
        let params = tile_params(&request, &BoundingBox::new(0.0, 0.0, 300.0, 300.0), 32632, 10, 10);
        assert!(params.contains(&("noData", "-128".to_string())));
        assert_eq!(request.mosaic_rule.unwrap()["lockRasterIds"][0], 3187221);

        let unmarked = catalog.with_no_data(None).scene_request(1, 30.0, "t");
        assert_eq!(unmarked.no_data, None);
    }

    #[test]
    fn test_missing_cloud_cover_counts_as_cloudy() {
        let attrs = json!({"OBJECTID": 1, "AcquisitionDate": 1692057600000i64});
        let scene = SceneMetadata::from_attributes(&attrs).unwrap();
        assert_eq!(scene.cloud_cover, 1.0);
        assert_eq!(scene.best, None);
        assert_eq!(scene.name, "");
    }
}
