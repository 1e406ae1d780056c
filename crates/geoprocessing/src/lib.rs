//! Geoprocessing operations for hexagon-bin composite indices.
//!
//! This crate implements the handful of GIS engine operations a heat risk
//! index run needs, each as an explicit function over in-memory data:
//!
//! - **Tessellation**: regular hexagon grid of a fixed cell area
//! - **Spatial join**: largest-overlap attribute transfer between polygons
//! - **Reclassification**: remap raster class codes to new values
//! - **Zonal statistics**: per-zone MAX / SUM / ... over data cells
//! - **Feature tables**: attribute join, field calculation, standardization
//!
//! # Architecture
//!
//! ```text
//! Extent ──► generate_tessellation ──► FeatureTable (GRID_ID + hexagon)
//!                    │                        │
//!                    │              largest_overlap_join(population)
//!                    ▼                        │
//!               HexTessellation               ▼
//!           (ZoneLocator for rasters)   joined FeatureTable ◄── join_field
//!                    │                                              ▲
//! Raster ──► reclassify ──► zonal_statistics_as_table ─────────────┘
//! ```
//!
//! Intermediate rasters are persisted as Zarr arrays and the final table as
//! GeoJSON inside a scoped [`RunWorkspace`].

pub mod clip;
pub mod config;
pub mod error;
pub mod reclassify;
pub mod spatial_join;
pub mod standardize;
pub mod table;
pub mod tessellation;
pub mod types;
pub mod workspace;
pub mod writer;
pub mod zonal;

// Re-export commonly used types at crate root
pub use config::{GeoprocessingConfig, ZarrCompression};
pub use error::{GeoprocessingError, Result};
pub use reclassify::{reclassify, reclassify_pair, RemapEntry, RemapTable, Unmatched};
pub use spatial_join::{largest_overlap_join, SpatialIndex, JOIN_COUNT_FIELD};
pub use standardize::{standardize_values, Standardization};
pub use table::{FeatureTable, RowView};
pub use tessellation::{generate_tessellation, HexBin, HexGrid, HexTessellation, GRID_ID_FIELD};
pub use types::{PixelType, Raster};
pub use workspace::{CleanupPolicy, RunWorkspace};
pub use writer::{table_to_geojson, write_geojson, RasterArtifact, ZarrRasterWriter};
pub use zonal::{zonal_statistics_as_table, ZonalStatistic, ZoneLocator};
