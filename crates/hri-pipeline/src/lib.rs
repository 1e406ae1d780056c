//! Urban heat risk index pipeline.
//!
//! Runs eight stages strictly in sequence:
//!
//! 1. Extent resolution (bounding box + spatial reference)
//! 2. Hexagon tessellation of the extent
//! 3. Largest-overlap join of the population grid
//! 4. Selection of the newest cloud-free summer scene
//! 5. Extraction of surface temperature and land cover
//! 6. Tree-canopy and built-up reclassification
//! 7. Zonal statistics per hexagon
//! 8. Index composition (`HRI`)
//!
//! Any stage failure aborts the run. The error carries the failing stage
//! and the underlying cause, and the caller also receives the workspace
//! path of the run.

pub mod composer;
pub mod config;
pub mod environment;
pub mod error;
pub mod extractor;
pub mod output;
pub mod pipeline;
pub mod selector;

// Re-exports
pub use composer::{IndexComposer, IndexInputs, ZonalTables, HRI_FIELD};
pub use config::PipelineConfig;
pub use environment::{new_run_id, EngineEnvironment};
pub use error::{PipelineError, PipelineFailure, Result, Stage, UpstreamError};
pub use extractor::{extract_rasters, ExtractedRasters, ExtractionSettings};
pub use output::{PipelineOutput, RiskBin, RiskGroup, RunSummary};
pub use pipeline::{HeatRiskPipeline, BINS_TABLE, OUTPUT_FILE};
pub use selector::{select_latest, select_scene, SceneFilter};
