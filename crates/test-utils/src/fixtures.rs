//! Common fixtures for heat risk index tests.
//!
//! The scenario extent is a UTM 32N (EPSG:32632) box around a mid-sized
//! German city, the size of a real run.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use hri_common::{BoundingBox, Extent, SpatialReference};
use sources::{SceneMetadata, StaticCatalog, StaticPopulation, StaticRaster};

use crate::generators::{land_cover_raster, population_grid, temperature_raster};

/// Extent bounds as `(xmin, ymin, xmax, ymax)`.
pub mod bounds {
    /// Full city scenario, roughly 21 x 25 km.
    pub const SCENARIO: (f64, f64, f64, f64) = (781745.29, 6556576.22, 802689.20, 6581479.05);

    /// About 1 km² inside the scenario.
    pub const SMALL: (f64, f64, f64, f64) = (790000.0, 6565000.0, 791000.0, 6566000.0);

    /// Degenerate box (xmin > xmax).
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// UTM zone 32N.
pub const SCENARIO_WKID: u32 = 32632;

/// Object id of the scene used by [`scenario_scene`].
pub const SCENARIO_SCENE_ID: i64 = 3187221;

pub fn bbox_of(bounds: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(bounds.0, bounds.1, bounds.2, bounds.3)
}

fn extent_of(bounds: (f64, f64, f64, f64)) -> Extent {
    Extent {
        bbox: bbox_of(bounds),
        srs: SpatialReference { wkid: SCENARIO_WKID },
    }
}

pub fn scenario_extent() -> Extent {
    extent_of(bounds::SCENARIO)
}

pub fn small_extent() -> Extent {
    extent_of(bounds::SMALL)
}

/// Scene acquired at midnight UTC on the given day.
pub fn scene(object_id: i64, year: i32, month: u32, day: u32, cloud_cover: f64) -> SceneMetadata {
    SceneMetadata {
        object_id,
        name: format!("LC09_L2SP_195026_{year:04}{month:02}{day:02}"),
        acquisition_date: Utc
            .with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .expect("valid scene date"),
        cloud_cover,
        best: Some(1_500_000.0),
    }
}

/// Clear August scene.
pub fn scenario_scene() -> SceneMetadata {
    scene(SCENARIO_SCENE_ID, 2023, 8, 15, 0.02)
}

/// In-memory sources covering an extent.
pub struct StaticSources {
    pub catalog: Arc<StaticCatalog>,
    pub land_cover: Arc<StaticRaster>,
    pub population: Arc<StaticPopulation>,
}

impl StaticSources {
    /// One clear scene, temperature and land cover at `cell_size`, and
    /// 100 m population squares with the given field.
    pub fn for_extent(extent: &Extent, cell_size: f64, population_field: &str) -> Self {
        Self::with_scenes(extent, cell_size, population_field, vec![scenario_scene()])
    }

    /// Like [`StaticSources::for_extent`] with a custom scene list. Every
    /// scene exports the same temperature raster.
    pub fn with_scenes(
        extent: &Extent,
        cell_size: f64,
        population_field: &str,
        scenes: Vec<SceneMetadata>,
    ) -> Self {
        let temperature = temperature_raster(&extent.bbox, cell_size);
        let ids: Vec<i64> = scenes.iter().map(|s| s.object_id).collect();
        let catalog = ids
            .into_iter()
            .fold(StaticCatalog::new(scenes), |catalog, id| {
                catalog.with_raster(id, temperature.clone())
            });

        Self {
            catalog: Arc::new(catalog),
            land_cover: Arc::new(StaticRaster::new(land_cover_raster(&extent.bbox, cell_size))),
            population: Arc::new(StaticPopulation::new(population_grid(
                &extent.bbox,
                100.0,
                population_field,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sources::{ImageryCatalog, PopulationSource};

    #[test]
    fn test_scenario_extent_is_projected() {
        let extent = scenario_extent();
        assert!(extent.require_projected().is_ok());
        assert!(extent.width() > 20_000.0);
    }

    #[test]
    fn test_scene_month() {
        assert_eq!(scenario_scene().month(), 8);
        assert_eq!(scene(1, 2022, 7, 3, 0.0).month(), 7);
    }

    #[tokio::test]
    async fn test_static_sources() {
        let extent = small_extent();
        let sources = StaticSources::for_extent(&extent, 20.0, "Einwohner");

        let scenes = sources.catalog.query_scenes(&extent, "1=1").await.unwrap();
        assert_eq!(scenes.len(), 1);

        let population = sources.population.fetch_population(&extent).await.unwrap();
        assert_eq!(population.len(), 100);
    }
}
