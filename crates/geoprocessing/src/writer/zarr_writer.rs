//! Zarr V3 writer for intermediate raster artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hri_common::BoundingBox;
use serde_json::{json, Value};
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::{ReadableStorageTraits, WritableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use crate::config::{GeoprocessingConfig, ZarrCompression};
use crate::error::{GeoprocessingError, Result};
use crate::types::{PixelType, Raster};

/// A raster written to the run workspace.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RasterArtifact {
    /// Artifact name, e.g. `landsat_surf_temp`.
    pub name: String,
    /// Directory of the Zarr array.
    pub path: PathBuf,
    /// Raster dimensions (width, height).
    pub shape: (usize, usize),
    /// Chunk dimensions.
    pub chunk_shape: (usize, usize),
    pub bbox: BoundingBox,
    pub pixel_type: PixelType,
    pub nodata: Option<f32>,
    /// Compression codec used.
    pub compression: String,
    /// Uncompressed bytes written.
    pub bytes_written: u64,
}

/// Writer for Zarr V3 raster artifacts.
pub struct ZarrRasterWriter {
    config: GeoprocessingConfig,
}

impl ZarrRasterWriter {
    /// Create a new writer with the given configuration.
    pub fn new(config: GeoprocessingConfig) -> Self {
        Self { config }
    }

    /// Write `raster` as a Zarr array in directory `path`.
    pub fn write(&self, raster: &Raster, path: &Path, name: &str) -> Result<RasterArtifact> {
        std::fs::create_dir_all(path)?;
        let store = FilesystemStore::new(path)
            .map_err(|e| GeoprocessingError::StorageError(e.to_string()))?;

        let chunk_size = self.config.zarr_chunk_size;
        let array = self.build_array(Arc::new(store), "/", raster, name, chunk_size)?;

        array
            .store_metadata()
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;

        // Zarr uses [row, col] indexing
        let subset = ArraySubset::new_with_start_shape(
            vec![0, 0],
            vec![raster.height as u64, raster.width as u64],
        )
        .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;

        array
            .store_array_subset_elements(&subset, &raster.data)
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;

        Ok(RasterArtifact {
            name: name.to_string(),
            path: path.to_path_buf(),
            shape: (raster.width, raster.height),
            chunk_shape: (chunk_size, chunk_size),
            bbox: raster.bbox,
            pixel_type: raster.pixel_type,
            nodata: raster.nodata,
            compression: self.config.zarr_compression.as_str().to_string(),
            bytes_written: (raster.data.len() * std::mem::size_of::<f32>()) as u64,
        })
    }

    /// Read a raster artifact back from directory `path`.
    pub fn read(path: &Path) -> Result<Raster> {
        let store = FilesystemStore::new(path)
            .map_err(|e| GeoprocessingError::StorageError(e.to_string()))?;
        let array = Array::open(Arc::new(store), "/")
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;

        let shape = array.shape().to_vec();
        if shape.len() != 2 {
            return Err(GeoprocessingError::ZarrError(format!(
                "expected 2 dimensions, found {}",
                shape.len()
            )));
        }
        let (height, width) = (shape[0] as usize, shape[1] as usize);

        let attrs = array.attributes();
        let bbox = attrs
            .get("bbox")
            .and_then(Value::as_array)
            .and_then(|v| {
                let n: Vec<f64> = v.iter().filter_map(Value::as_f64).collect();
                (n.len() == 4).then(|| BoundingBox::new(n[0], n[1], n[2], n[3]))
            })
            .ok_or_else(|| GeoprocessingError::ZarrError("missing bbox attribute".to_string()))?;
        let pixel_type = attrs
            .get("pixel_type")
            .and_then(Value::as_str)
            .and_then(PixelType::from_str)
            .unwrap_or(PixelType::F32);
        let nodata = attrs.get("nodata").and_then(Value::as_f64).map(|v| v as f32);

        let subset = ArraySubset::new_with_start_shape(vec![0, 0], shape)
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;
        let data: Vec<f32> = array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))?;

        let mut raster = Raster::new(width, height, bbox, data)?.with_nodata(nodata);
        raster.pixel_type = pixel_type;
        Ok(raster)
    }

    /// Build a Zarr array with the configured settings.
    fn build_array<S: ReadableStorageTraits + WritableStorageTraits + 'static>(
        &self,
        storage: Arc<S>,
        path: &str,
        raster: &Raster,
        name: &str,
        chunk_size: usize,
    ) -> Result<Array<S>> {
        let mut attrs = serde_json::Map::new();
        attrs.insert("name".to_string(), json!(name));
        attrs.insert("pixel_type".to_string(), json!(raster.pixel_type.as_str()));
        attrs.insert("nodata".to_string(), json!(raster.nodata));
        attrs.insert(
            "bbox".to_string(),
            json!([raster.bbox.min_x, raster.bbox.min_y, raster.bbox.max_x, raster.bbox.max_y]),
        );

        let chunk_grid: zarrs::array::ChunkGrid = vec![chunk_size as u64, chunk_size as u64]
            .try_into()
            .map_err(|e| GeoprocessingError::ConfigError(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            vec![raster.height as u64, raster.width as u64],
            DataType::Float32,
            chunk_grid,
            FillValue::from(f32::NAN),
        );
        let mut builder = binding.attributes(attrs);

        if self.config.zarr_compression != ZarrCompression::None {
            let codec = self.create_compression_codec()?;
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        builder
            .build(storage, path)
            .map_err(|e| GeoprocessingError::ZarrError(e.to_string()))
    }

    /// Create the compression codec based on configuration.
    fn create_compression_codec(
        &self,
    ) -> Result<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>> {
        let level = BloscCompressionLevel::try_from(self.config.zarr_compression_level)
            .map_err(|_| GeoprocessingError::ConfigError("Invalid compression level".to_string()))?;

        let shuffle = if self.config.zarr_shuffle {
            BloscShuffleMode::Shuffle
        } else {
            BloscShuffleMode::NoShuffle
        };

        // typesize is required when shuffle is enabled
        let typesize = self.config.zarr_shuffle.then_some(std::mem::size_of::<f32>());

        let compressor = match self.config.zarr_compression {
            ZarrCompression::None => {
                return Err(GeoprocessingError::ConfigError(
                    "No compression configured".to_string(),
                ))
            }
            ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
            ZarrCompression::BloscZstd => BloscCompressor::Zstd,
        };

        let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
            .map_err(|e| GeoprocessingError::ConfigError(e.to_string()))?;

        Ok(Arc::new(codec))
    }
}
