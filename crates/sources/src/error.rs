//! Error types for external data sources.

use thiserror::Error;

/// Errors raised while talking to imagery, land-cover or population services.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Error document returned by an ArcGIS REST service.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("raster decode error: {0}")]
    Decode(String),

    #[error("scene {0} is not available")]
    SceneNotFound(i64),

    #[error("geoprocessing error: {0}")]
    Geoprocessing(#[from] geoprocessing::GeoprocessingError),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<tiff::TiffError> for SourceError {
    fn from(err: tiff::TiffError) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
