//! Remote data sources for heat risk index runs.
//!
//! Provides clients for:
//! - The Landsat imagery catalog (scene queries, single-scene exports)
//! - Land-cover rasters exported from an ImageServer
//! - Population grid polygons from a FeatureServer
//!
//! Each source sits behind a trait so runs can swap in the in-memory
//! implementations from [`memory`].

pub mod arcgis;
pub mod config;
pub mod error;
pub mod image_server;
pub mod imagery;
pub mod land_cover;
pub mod memory;
pub mod population;

pub use config::SourcesConfig;
pub use error::{Result, SourceError};
pub use image_server::{export_image, ExportRequest};
pub use imagery::{ImageServerCatalog, ImageryCatalog, SceneMetadata, TEMPERATURE_NO_DATA};
pub use land_cover::{ImageServerRaster, RasterSource, WORLD_COVER_NO_DATA};
pub use memory::{StaticCatalog, StaticPopulation, StaticRaster};
pub use population::{FeatureServerPopulation, PopulationSource};
