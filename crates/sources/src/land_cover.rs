//! Land-cover raster source.

use async_trait::async_trait;
use geoprocessing::Raster;
use hri_common::Extent;
use reqwest::Client;
use tracing::instrument;

use crate::arcgis::build_client;
use crate::config::SourcesConfig;
use crate::error::Result;
use crate::image_server::{export_image, ExportRequest};

/// ESA WorldCover writes 0 where there is no observation.
pub const WORLD_COVER_NO_DATA: f32 = 0.0;

/// A source of a single categorical raster.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// Raster over `extent` with square cells of `cell_size` units.
    async fn fetch_raster(&self, extent: &Extent, cell_size: f64) -> Result<Raster>;
}

/// Land cover exported from an ArcGIS ImageServer.
pub struct ImageServerRaster {
    client: Client,
    url: String,
    no_data: Option<f32>,
    max_image_size: usize,
}

impl ImageServerRaster {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.land_cover_url.trim_end_matches('/').to_string(),
            no_data: Some(WORLD_COVER_NO_DATA),
            max_image_size: config.max_image_size,
        })
    }

    pub fn with_no_data(mut self, no_data: Option<f32>) -> Self {
        self.no_data = no_data;
        self
    }
}

#[async_trait]
impl RasterSource for ImageServerRaster {
    #[instrument(skip(self, extent), fields(url = %self.url))]
    async fn fetch_raster(&self, extent: &Extent, cell_size: f64) -> Result<Raster> {
        let request = ExportRequest {
            cell_size,
            no_data: self.no_data,
            ..Default::default()
        };
        export_image(&self.client, &self.url, extent, &request, self.max_image_size).await
    }
}
