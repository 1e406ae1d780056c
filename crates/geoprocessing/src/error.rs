//! Error types for geoprocessing operations.

use thiserror::Error;

/// Errors that can occur during geoprocessing.
#[derive(Error, Debug)]
pub enum GeoprocessingError {
    /// Tessellation parameters cannot produce a grid.
    #[error("invalid tessellation: {0}")]
    InvalidTessellation(String),

    /// Raster buffer does not match its declared shape.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// The requested region is outside the raster bounds.
    #[error("requested region {requested} is outside raster bounds {raster}")]
    OutOfBounds { requested: String, raster: String },

    /// Remap table could not be parsed.
    #[error("invalid remap table: {0}")]
    InvalidRemap(String),

    /// Table operation received inconsistent input.
    #[error("invalid table: {0}")]
    InvalidTable(String),

    /// A key was inserted twice into a keyed table.
    #[error("duplicate key '{key}' in table '{table}'")]
    DuplicateKey { table: String, key: String },

    /// A field referenced by an operation does not exist.
    #[error("field '{field}' not found in table '{table}'")]
    MissingField { table: String, field: String },

    /// A feature required geometry but had none.
    #[error("feature '{0}' has no geometry")]
    MissingGeometry(String),

    /// Invalid standardization range.
    #[error("invalid standardization range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// An artifact already exists and overwriting is disabled.
    #[error("artifact already exists: {0}")]
    ArtifactExists(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl GeoprocessingError {
    /// Create a MissingField error.
    pub fn missing_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, raster: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            raster: raster.into(),
        }
    }
}

impl From<std::io::Error> for GeoprocessingError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for GeoprocessingError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

/// Result type for geoprocessing operations.
pub type Result<T> = std::result::Result<T, GeoprocessingError>;
