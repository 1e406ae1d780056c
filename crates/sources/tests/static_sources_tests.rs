//! Behaviour of the in-memory sources used for offline runs.

use chrono::{TimeZone, Utc};
use geo::{LineString, Polygon};
use geoprocessing::{FeatureTable, Raster};
use hri_common::{BoundingBox, Extent};
use sources::{
    ImageryCatalog, PopulationSource, SceneMetadata, SourceError, StaticCatalog, StaticPopulation,
};

fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (x, y),
            (x + size, y),
            (x + size, y + size),
            (x, y + size),
            (x, y),
        ]),
        vec![],
    )
}

fn scene(object_id: i64, day: u32) -> SceneMetadata {
    SceneMetadata {
        object_id,
        name: format!("LC09_{}", object_id),
        acquisition_date: Utc.with_ymd_and_hms(2023, 8, day, 10, 30, 0).unwrap(),
        cloud_cover: 0.01,
        best: Some(1_000_000.0),
    }
}

#[tokio::test]
async fn test_catalog_exports_clipped_scene() {
    let temperature = Raster::filled(10, 10, BoundingBox::new(0.0, 0.0, 300.0, 300.0), 31.5).unwrap();
    let catalog = StaticCatalog::new(vec![scene(1, 15), scene(2, 20)]).with_raster(2, temperature);
    let extent = Extent::from_bounds(60.0, 60.0, 180.0, 150.0, Some(32632)).unwrap();

    let scenes = catalog.query_scenes(&extent, "1=1").await.unwrap();
    assert_eq!(scenes.len(), 2);

    let raster = catalog
        .export_scene(2, &extent, 30.0, "Band 10 Surface Temperature in Celsius")
        .await
        .unwrap();
    assert_eq!((raster.width, raster.height), (4, 3));
    assert!(raster.data.iter().all(|v| *v == 31.5));

    let missing = catalog.export_scene(1, &extent, 30.0, "").await;
    assert!(matches!(missing, Err(SourceError::SceneNotFound(1))));
    assert_eq!(catalog.export_count(), 2);
}

#[tokio::test]
async fn test_population_filters_by_extent() {
    let mut table = FeatureTable::new("population", "OBJECTID");
    table.add_field("Einwohner");
    for (i, x) in [0.0, 100.0, 1000.0].iter().enumerate() {
        let row = table.insert((i + 1).to_string(), Some(square(*x, 0.0, 100.0))).unwrap();
        table.set_value(row, "Einwohner", Some(10.0 * (i + 1) as f64)).unwrap();
    }
    table.insert("4", None).unwrap();

    let source = StaticPopulation::new(table);
    let extent = Extent::from_bounds(50.0, 10.0, 250.0, 90.0, Some(32632)).unwrap();
    let result = source.fetch_population(&extent).await.unwrap();

    assert_eq!(result.keys(), &["1".to_string(), "2".to_string()]);
    assert_eq!(result.value("2", "Einwohner"), Some(20.0));
    assert_eq!(result.key_field(), "OBJECTID");
}
