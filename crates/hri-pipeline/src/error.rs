//! Error types for the heat risk index pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// The eight pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ExtentResolution,
    Tessellation,
    PopulationJoin,
    ImageSelection,
    RasterExtraction,
    Reclassification,
    ZonalAggregation,
    IndexComposition,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::ExtentResolution,
        Stage::Tessellation,
        Stage::PopulationJoin,
        Stage::ImageSelection,
        Stage::RasterExtraction,
        Stage::Reclassification,
        Stage::ZonalAggregation,
        Stage::IndexComposition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtentResolution => "extent_resolution",
            Self::Tessellation => "tessellation",
            Self::PopulationJoin => "population_join",
            Self::ImageSelection => "image_selection",
            Self::RasterExtraction => "raster_extraction",
            Self::Reclassification => "reclassification",
            Self::ZonalAggregation => "zonal_aggregation",
            Self::IndexComposition => "index_composition",
        }
    }

    /// 1-based position in the run.
    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a collaborator the pipeline depends on.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error(transparent)]
    Source(#[from] sources::SourceError),

    #[error(transparent)]
    Geoprocessing(#[from] geoprocessing::GeoprocessingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid extent, spatial reference or parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No imagery candidate survived the catalog filter.
    #[error("no data found: {0}")]
    NoDataFound(String),

    /// A catalog, raster, feature or geoprocessing call failed.
    #[error("{stage} failed: {source}")]
    UpstreamService {
        stage: Stage,
        #[source]
        source: UpstreamError,
    },
}

impl PipelineError {
    pub fn upstream(stage: Stage, source: impl Into<UpstreamError>) -> Self {
        Self::UpstreamService {
            stage,
            source: source.into(),
        }
    }

    /// Stage that failed, for upstream errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::UpstreamService { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<hri_common::ExtentError> for PipelineError {
    fn from(err: hri_common::ExtentError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Tag a collaborator result with the stage it belongs to.
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<UpstreamError>,
{
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| PipelineError::upstream(stage, e))
    }
}

/// A failed run together with the workspace it was using.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct PipelineFailure {
    /// Workspace directory of the run, if one had been acquired.
    pub workspace: Option<PathBuf>,
    #[source]
    pub error: PipelineError,
}

impl PipelineFailure {
    pub fn new(workspace: Option<PathBuf>, error: PipelineError) -> Self {
        Self { workspace, error }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ExtentResolution.number(), 1);
        assert_eq!(Stage::IndexComposition.number(), 8);
        assert_eq!(Stage::ZonalAggregation.to_string(), "zonal_aggregation");
    }

    #[test]
    fn test_upstream_keeps_source() {
        let source = sources::SourceError::SceneNotFound(4);
        let err: Result<()> = Err::<(), _>(source).stage(Stage::RasterExtraction);
        let err = err.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::RasterExtraction));
        assert_eq!(err.to_string(), "raster_extraction failed: scene 4 is not available");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_extent_errors_are_configuration() {
        let err: PipelineError = hri_common::ExtentError::MissingSpatialReference.into();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
