//! Settings for intermediate raster artifacts.

use serde::{Deserialize, Serialize};

/// How (and whether) extracted and reclassified rasters are persisted in
/// the run workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoprocessingConfig {
    /// Edge length of the square Zarr chunks, in cells.
    pub zarr_chunk_size: usize,

    pub zarr_compression: ZarrCompression,

    /// Blosc level, 1-9.
    pub zarr_compression_level: u8,

    /// Byte shuffle before compression.
    pub zarr_shuffle: bool,

    /// Persist intermediate rasters to the run workspace.
    pub write_raster_artifacts: bool,
}

impl Default for GeoprocessingConfig {
    fn default() -> Self {
        Self {
            zarr_chunk_size: 512,
            zarr_compression: ZarrCompression::BloscZstd,
            zarr_compression_level: 1,
            zarr_shuffle: true,
            write_raster_artifacts: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl GeoprocessingConfig {
    /// Defaults overridden by the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `HRI_ZARR_*` and `HRI_WRITE_RASTER_ARTIFACTS`.
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Some(size) = env_parse("HRI_ZARR_CHUNK_SIZE") {
            self.zarr_chunk_size = size;
        }
        if let Ok(codec) = std::env::var("HRI_ZARR_COMPRESSION") {
            self.zarr_compression = ZarrCompression::from_str(&codec);
        }
        if let Some(level) = env_parse("HRI_ZARR_COMPRESSION_LEVEL") {
            self.zarr_compression_level = level;
        }
        if let Some(shuffle) = env_flag("HRI_ZARR_SHUFFLE") {
            self.zarr_shuffle = shuffle;
        }
        if let Some(write) = env_flag("HRI_WRITE_RASTER_ARTIFACTS") {
            self.write_raster_artifacts = write;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.zarr_chunk_size == 0 {
            return Err("zarr_chunk_size must be > 0".to_string());
        }
        if self.zarr_compression != ZarrCompression::None
            && !(1..=9).contains(&self.zarr_compression_level)
        {
            return Err(format!(
                "zarr_compression_level must be 1-9, got {}",
                self.zarr_compression_level
            ));
        }
        Ok(())
    }
}

/// Codec applied to raster artifact chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZarrCompression {
    None,
    BloscLz4,
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Case-insensitive; unknown names fall back to Blosc Zstd.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "none" | "raw" => Self::None,
            "lz4" | "blosc_lz4" => Self::BloscLz4,
            _ => Self::BloscZstd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifacts_written_by_default() {
        let config = GeoprocessingConfig::default();
        assert!(config.write_raster_artifacts);
        assert_eq!(config.zarr_compression, ZarrCompression::BloscZstd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = GeoprocessingConfig {
            zarr_chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GeoprocessingConfig {
            zarr_compression_level: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // level is irrelevant without a codec
        let config = GeoprocessingConfig {
            zarr_compression: ZarrCompression::None,
            zarr_compression_level: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compression_names() {
        assert_eq!(ZarrCompression::from_str("RAW"), ZarrCompression::None);
        assert_eq!(ZarrCompression::from_str("lz4"), ZarrCompression::BloscLz4);
        assert_eq!(ZarrCompression::from_str("bogus"), ZarrCompression::BloscZstd);
        assert_eq!(ZarrCompression::BloscLz4.to_string(), "blosc_lz4");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GeoprocessingConfig =
            serde_json::from_str(r#"{"write_raster_artifacts": false, "zarr_compression": "blosc_lz4"}"#)
                .unwrap();
        assert!(!config.write_raster_artifacts);
        assert_eq!(config.zarr_compression, ZarrCompression::BloscLz4);
        assert_eq!(config.zarr_chunk_size, 512);
    }
}
