//! Error types shared by the heat risk index crates.

use thiserror::Error;

use crate::bbox::BboxParseError;

/// Result type alias using ExtentError.
pub type ExtentResult<T> = Result<T, ExtentError>;

/// Errors raised while resolving an analysis extent.
#[derive(Debug, Error)]
pub enum ExtentError {
    #[error("The extent has no spatial reference!")]
    MissingSpatialReference,

    #[error("The extent has no wkid!")]
    MissingWkid,

    #[error("Invalid spatial reference: {0}")]
    InvalidWkid(String),

    #[error("Invalid extent bounds: {0}")]
    InvalidBounds(String),

    #[error("Missing extent field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Parse(#[from] BboxParseError),

    #[error("Invalid envelope JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ExtentError {
    fn from(err: serde_json::Error) -> Self {
        ExtentError::Json(err.to_string())
    }
}
