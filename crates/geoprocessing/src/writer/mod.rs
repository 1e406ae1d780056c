//! Artifact writers for the run workspace.
//!
//! Intermediate rasters go to Zarr V3 arrays, the final feature table to
//! GeoJSON.

mod geojson_writer;
mod zarr_writer;

pub use geojson_writer::{table_to_geojson, write_geojson};
pub use zarr_writer::{RasterArtifact, ZarrRasterWriter};
