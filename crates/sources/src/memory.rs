//! In-memory sources for offline runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use geoprocessing::clip::polygon_bounds;
use geoprocessing::{FeatureTable, Raster};
use hri_common::Extent;

use crate::error::{Result, SourceError};
use crate::imagery::{ImageryCatalog, SceneMetadata};
use crate::land_cover::RasterSource;
use crate::population::PopulationSource;

/// Catalog serving a fixed list of scenes and their temperature rasters.
///
/// Every query returns all scenes; the where clause is only recorded.
#[derive(Default)]
pub struct StaticCatalog {
    scenes: Vec<SceneMetadata>,
    rasters: HashMap<i64, Raster>,
    queries: Mutex<Vec<String>>,
    exports: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(scenes: Vec<SceneMetadata>) -> Self {
        Self {
            scenes,
            ..Default::default()
        }
    }

    /// Raster returned when `object_id` is exported.
    pub fn with_raster(mut self, object_id: i64, raster: Raster) -> Self {
        self.rasters.insert(object_id, raster);
        self
    }

    /// Where clauses received so far.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Number of export calls so far.
    pub fn export_count(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageryCatalog for StaticCatalog {
    async fn query_scenes(&self, _extent: &Extent, where_clause: &str) -> Result<Vec<SceneMetadata>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(where_clause.to_string());
        }
        Ok(self.scenes.clone())
    }

    async fn export_scene(
        &self,
        object_id: i64,
        extent: &Extent,
        _cell_size: f64,
        _rendering_template: &str,
    ) -> Result<Raster> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        let raster = self
            .rasters
            .get(&object_id)
            .ok_or(SourceError::SceneNotFound(object_id))?;
        Ok(raster.clip(&extent.bbox)?)
    }
}

/// Raster source returning (a clip of) one fixed raster.
pub struct StaticRaster {
    raster: Raster,
    fetches: AtomicUsize,
}

impl StaticRaster {
    pub fn new(raster: Raster) -> Self {
        Self {
            raster,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RasterSource for StaticRaster {
    async fn fetch_raster(&self, extent: &Extent, _cell_size: f64) -> Result<Raster> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.raster.clip(&extent.bbox)?)
    }
}

/// Population source returning the features of a fixed table that
/// intersect the requested extent.
pub struct StaticPopulation {
    table: FeatureTable,
}

impl StaticPopulation {
    pub fn new(table: FeatureTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl PopulationSource for StaticPopulation {
    async fn fetch_population(&self, extent: &Extent) -> Result<FeatureTable> {
        let fields: Vec<&str> = self.table.field_names().collect();
        let mut out = FeatureTable::new(self.table.name(), self.table.key_field());
        for field in &fields {
            out.add_field(field);
        }

        for row in self.table.rows() {
            let Some(polygon) = row.geometry() else {
                continue;
            };
            let intersects = polygon_bounds(polygon).map_or(false, |b| b.intersects(&extent.bbox));
            if !intersects {
                continue;
            }
            let idx = out.insert(row.key(), Some(polygon.clone()))?;
            for field in &fields {
                out.set_value(idx, field, row.get(field))?;
            }
        }

        Ok(out)
    }
}
