//! Coverage and overlap properties of the hexagon tessellation.

use geo::{Area, Contains, Point};
use geoprocessing::{generate_tessellation, ZoneLocator};
use hri_common::Extent;

fn extent(x0: f64, y0: f64, w: f64, h: f64) -> Extent {
    Extent::from_bounds(x0, y0, x0 + w, y0 + h, Some(32632)).unwrap()
}

/// Sample points strictly inside the extent on a regular lattice.
fn sample_points(extent: &Extent, nx: usize, ny: usize) -> Vec<(f64, f64)> {
    let b = extent.bbox;
    let mut points = Vec::with_capacity(nx * ny);
    for i in 0..nx {
        for j in 0..ny {
            let x = b.min_x + (i as f64 + 0.37) / nx as f64 * b.width();
            let y = b.min_y + (j as f64 + 0.61) / ny as f64 * b.height();
            points.push((x, y));
        }
    }
    points
}

#[test]
fn test_tessellation_covers_extent() {
    for ext in [
        extent(781745.29, 6556576.22, 1000.0, 800.0),
        extent(0.0, 0.0, 333.0, 1250.0),
        extent(500000.0, 5000000.0, 95.0, 60.0),
    ] {
        let tess = generate_tessellation(&ext, 1500.0).unwrap();
        assert!(!tess.is_empty());

        for (x, y) in sample_points(&ext, 40, 30) {
            let point = Point::new(x, y);
            let containing = tess
                .bins()
                .iter()
                .filter(|b| b.polygon.contains(&point))
                .count();
            assert!(containing <= 1, "hexagons overlap at ({x}, {y})");

            let zone = tess.locate_zone(x, y).expect("point not covered");
            let bin = &tess.bins()[zone];
            if containing == 1 {
                assert!(bin.polygon.contains(&point));
            }
        }
    }
}

#[test]
fn test_bins_have_requested_area_and_touch_extent() {
    let ext = extent(781745.29, 6556576.22, 2000.0, 1500.0);
    let tess = generate_tessellation(&ext, 1500.0).unwrap();

    let total: f64 = tess.bins().iter().map(|b| b.polygon.unsigned_area()).sum();
    assert!(total >= ext.bbox.area());

    for bin in tess.bins() {
        assert!((bin.polygon.unsigned_area() - 1500.0).abs() < 1e-6);
        let (cx, cy) = tess.grid().center(bin.col, bin.row);
        let reach = tess.grid().side;
        assert!(cx + reach > ext.bbox.min_x && cx - reach < ext.bbox.max_x);
        assert!(cy + reach > ext.bbox.min_y && cy - reach < ext.bbox.max_y);
    }
}

#[test]
fn test_tessellation_is_deterministic() {
    let ext = extent(1000.0, 2000.0, 700.0, 700.0);
    let a = generate_tessellation(&ext, 1500.0).unwrap();
    let b = generate_tessellation(&ext, 1500.0).unwrap();
    let ids_a: Vec<&str> = a.bins().iter().map(|b| b.grid_id.as_str()).collect();
    let ids_b: Vec<&str> = b.bins().iter().map(|b| b.grid_id.as_str()).collect();
    assert_eq!(ids_a, ids_b);

    let table = a.to_table("HRI_Hexagone").unwrap();
    assert_eq!(table.len(), a.len());
    assert_eq!(table.key_field(), "GRID_ID");
    assert!(table.geometry(0).is_some());
}

#[test]
fn test_scenario_extent_bin_count() {
    let ext = Extent::from_bounds(781745.29, 6556576.22, 802689.20, 6581479.05, Some(32632)).unwrap();
    let tess = generate_tessellation(&ext, 1500.0).unwrap();
    let interior = ext.bbox.area() / 1500.0;
    // whole boundary hexagons add a thin ring on top of the interior count
    assert!(tess.len() as f64 >= interior);
    assert!((tess.len() as f64) < interior * 1.02);
}
