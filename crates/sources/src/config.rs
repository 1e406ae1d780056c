//! Service endpoints and HTTP settings.

use serde::{Deserialize, Serialize};

pub const LANDSAT_IMAGE_SERVER: &str =
    "https://landsat2.arcgis.com/arcgis/rest/services/Landsat/MS/ImageServer";
pub const WORLD_COVER_IMAGE_SERVER: &str = "https://tiledimageservices.arcgis.com/P3ePLMYs2RVChkJx/arcgis/rest/services/European_Space_Agency_WorldCover_2021_Land_Cover_WGS84_7/ImageServer";
pub const ZENSUS_FEATURE_SERVER: &str =
    "https://services2.arcgis.com/jUpNdisbWqRpMo35/arcgis/rest/services/Zensus2022_grid_final/FeatureServer/0";

/// Endpoints of the three external services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Imagery catalog (ImageServer) with surface temperature.
    pub imagery_url: String,
    /// Land-cover ImageServer.
    pub land_cover_url: String,
    /// Population grid FeatureServer layer.
    pub population_url: String,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Features requested per FeatureServer page.
    pub page_size: usize,
    /// Largest exportImage edge in pixels; bigger rasters are fetched in tiles.
    pub max_image_size: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            imagery_url: LANDSAT_IMAGE_SERVER.to_string(),
            land_cover_url: WORLD_COVER_IMAGE_SERVER.to_string(),
            population_url: ZENSUS_FEATURE_SERVER.to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 15,
            page_size: 2000,
            max_image_size: 4000,
        }
    }
}

impl SourcesConfig {
    /// Override defaults from `HRI_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("HRI_IMAGERY_URL") {
            self.imagery_url = val;
        }
        if let Ok(val) = std::env::var("HRI_LAND_COVER_URL") {
            self.land_cover_url = val;
        }
        if let Ok(val) = std::env::var("HRI_POPULATION_URL") {
            self.population_url = val;
        }
        if let Ok(val) = std::env::var("HRI_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.request_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("HRI_PAGE_SIZE") {
            if let Ok(size) = val.parse() {
                self.page_size = size;
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("imagery_url", &self.imagery_url),
            ("land_cover_url", &self.land_cover_url),
            ("population_url", &self.population_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }
        if self.max_image_size == 0 {
            return Err("max_image_size must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SourcesConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.population_url.ends_with("FeatureServer/0"));
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = SourcesConfig {
            imagery_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
