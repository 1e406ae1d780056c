//! Tessellation, reclassification and zonal statistics working together.

use geoprocessing::{
    generate_tessellation, largest_overlap_join, reclassify_pair, zonal_statistics_as_table,
    FeatureTable, Raster, RemapTable, Standardization, ZarrRasterWriter, ZonalStatistic,
    GeoprocessingConfig, JOIN_COUNT_FIELD,
};
use geo::{LineString, Polygon};
use hri_common::Extent;

const CLASSES: [i32; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 100];

fn scenario_extent() -> Extent {
    Extent::from_bounds(781745.29, 6556576.22, 782745.29, 6557376.22, Some(32632)).unwrap()
}

/// Left half tree canopy (10), right half built-up (50), 10 m cells.
fn land_cover(extent: &Extent) -> Raster {
    let width = (extent.width() / 10.0).round() as usize;
    let height = (extent.height() / 10.0).round() as usize;
    let data = (0..width * height)
        .map(|i| if i % width < width / 2 { 10.0 } else { 50.0 })
        .collect();
    Raster::new(width, height, extent.bbox, data).unwrap()
}

#[test]
fn test_mask_sums_partition_counts() {
    let extent = scenario_extent();
    let tess = generate_tessellation(&extent, 1500.0).unwrap();
    let lc = land_cover(&extent);

    let (tree, built) = reclassify_pair(
        &lc,
        &RemapTable::binary_mask(10, &CLASSES),
        &RemapTable::binary_mask(50, &CLASSES),
    );

    let tree_table = zonal_statistics_as_table(&tess, &tree, ZonalStatistic::Sum, "tree_canopy_count").unwrap();
    let built_table = zonal_statistics_as_table(&tess, &built, ZonalStatistic::Sum, "built_up_area_count").unwrap();

    assert_eq!(tree_table.len(), built_table.len());
    let total: f64 = tree_table.column("COUNT").unwrap().iter().flatten().sum();
    assert_eq!(total as usize, lc.data_count());

    for key in tree_table.keys() {
        let count = tree_table.value(key, "COUNT").unwrap();
        let trees = tree_table.value(key, "SUM").unwrap();
        let builtup = built_table.value(key, "SUM").unwrap();
        assert!(trees >= 0.0 && trees <= count);
        assert_eq!(trees + builtup, count);
    }
}

#[test]
fn test_join_stats_and_standardize() {
    let extent = scenario_extent();
    let tess = generate_tessellation(&extent, 1500.0).unwrap();
    let mut bins = tess.to_table("HRI_Hexagone").unwrap();

    // population: one square per 100 m cell, value increasing eastwards
    let mut population = FeatureTable::new("zensus", "ID");
    population.add_field("Einwohner");
    let b = extent.bbox;
    for i in 0..10 {
        for j in 0..8 {
            let x0 = b.min_x + i as f64 * 100.0;
            let y0 = b.min_y + j as f64 * 100.0;
            let square = Polygon::new(
                LineString::from(vec![(x0, y0), (x0 + 100.0, y0), (x0 + 100.0, y0 + 100.0), (x0, y0 + 100.0), (x0, y0)]),
                vec![],
            );
            let row = population.insert(format!("{}-{}", i, j), Some(square)).unwrap();
            population.set_value(row, "Einwohner", Some(i as f64 * 10.0)).unwrap();
        }
    }

    bins = largest_overlap_join(&bins, &population, "HRI_Spatial_Bins").unwrap();
    assert!(bins.column(JOIN_COUNT_FIELD).unwrap().iter().all(|c| *c == Some(1.0)));

    bins.standardize_fields(&[("Einwohner", "Einwohner_MIN_MAX")], &Standardization::default())
        .unwrap();
    let scaled: Vec<f64> = bins.column("Einwohner_MIN_MAX").unwrap().iter().flatten().copied().collect();
    assert_eq!(scaled.len(), bins.len());
    assert!(scaled.iter().all(|v| (1.0..=5.0).contains(v)));
    assert!(scaled.iter().any(|v| *v == 1.0));
    assert!(scaled.iter().any(|v| *v == 5.0));
}

#[test]
fn test_raster_artifact_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let extent = scenario_extent();
    let lc = land_cover(&extent);

    let writer = ZarrRasterWriter::new(GeoprocessingConfig::default());
    let artifact = writer.write(&lc, &dir.path().join("land_cover"), "land_cover").unwrap();
    assert_eq!(artifact.shape, (lc.width, lc.height));

    let restored = ZarrRasterWriter::read(&artifact.path).unwrap();
    assert_eq!(restored.data, lc.data);
    assert_eq!(restored.bbox, lc.bbox);
}
