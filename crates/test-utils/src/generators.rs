//! Test data generators for synthetic land cover, temperature and
//! population inputs.
//!
//! Patterns are deterministic so tests can reason about expected
//! percentages and extremes.

use geo::{LineString, Polygon};
use geoprocessing::{FeatureTable, Raster};
use hri_common::BoundingBox;

/// ESA WorldCover class codes in legend order.
pub const WORLD_COVER_CLASSES: [i32; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 100];

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, row-major with row 0 first.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a land-cover grid cycling through the WorldCover classes in
/// 3x3 cell blocks.
pub fn create_land_cover_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let block = (row / 3) * 7 + col / 3;
            data.push(WORLD_COVER_CLASSES[block % WORLD_COVER_CLASSES.len()] as f32);
        }
    }
    data
}

/// Creates surface temperatures in degrees Celsius: 20 °C along the
/// north-west corner rising to 45 °C in the south-east.
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(20.0 + x_factor * 12.5 + y_factor * 12.5);
        }
    }
    data
}

/// Creates a grid with NaN at the given `(col, row)` positions and `fill`
/// elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    fill: f32,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![fill; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

fn grid_shape(bbox: &BoundingBox, cell_size: f64) -> (usize, usize) {
    (
        (bbox.width() / cell_size).ceil().max(1.0) as usize,
        (bbox.height() / cell_size).ceil().max(1.0) as usize,
    )
}

fn snapped(bbox: &BoundingBox, cell_size: f64) -> (BoundingBox, usize, usize) {
    let (width, height) = grid_shape(bbox, cell_size);
    let bounds = BoundingBox::new(
        bbox.min_x,
        bbox.max_y - height as f64 * cell_size,
        bbox.min_x + width as f64 * cell_size,
        bbox.max_y,
    );
    (bounds, width, height)
}

/// Raster covering `bbox` with square cells whose values come from `f(row, col)`.
pub fn raster_from_fn<F>(bbox: &BoundingBox, cell_size: f64, f: F) -> Raster
where
    F: Fn(usize, usize) -> f32,
{
    let (bounds, width, height) = snapped(bbox, cell_size);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(f(row, col));
        }
    }
    Raster::new(width, height, bounds, data).expect("valid synthetic raster")
}

/// WorldCover-like raster over `bbox`; 0 is no-data.
pub fn land_cover_raster(bbox: &BoundingBox, cell_size: f64) -> Raster {
    let (bounds, width, height) = snapped(bbox, cell_size);
    Raster::new(width, height, bounds, create_land_cover_grid(width, height))
        .expect("valid land cover raster")
        .with_nodata(Some(0.0))
}

/// Temperature raster over `bbox` in degrees Celsius.
pub fn temperature_raster(bbox: &BoundingBox, cell_size: f64) -> Raster {
    let (bounds, width, height) = snapped(bbox, cell_size);
    Raster::new(width, height, bounds, create_temperature_grid(width, height))
        .expect("valid temperature raster")
}

/// Axis-aligned square polygon with its lower-left corner at `(x, y)`.
pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
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

/// Square population cells of `cell_size` covering `bbox`, keyed
/// `OBJECTID` 1.., with `field = (col * 7 + row * 3) % 50`.
pub fn population_grid(bbox: &BoundingBox, cell_size: f64, field: &str) -> FeatureTable {
    let (width, height) = grid_shape(bbox, cell_size);
    let mut table = FeatureTable::new("population", "OBJECTID");
    table.add_field(field);

    for row in 0..height {
        for col in 0..width {
            let x = bbox.min_x + col as f64 * cell_size;
            let y = bbox.min_y + row as f64 * cell_size;
            let key = (row * width + col + 1).to_string();
            let idx = table
                .insert(key, Some(square(x, y, cell_size)))
                .expect("unique population key");
            table
                .set_value(idx, field, Some(((col * 7 + row * 3) % 50) as f64))
                .expect("population field exists");
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[11], 1001.0);
    }

    #[test]
    fn test_land_cover_uses_known_classes() {
        let grid = create_land_cover_grid(30, 30);
        assert!(grid.iter().all(|v| WORLD_COVER_CLASSES.contains(&(*v as i32))));
        assert!(grid.contains(&10.0));
        assert!(grid.contains(&50.0));
    }

    #[test]
    fn test_temperature_range() {
        let grid = create_temperature_grid(100, 100);
        let min = grid.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = grid.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(min >= 20.0);
        assert!(max <= 45.0);
    }

    #[test]
    fn test_rasters_cover_bbox() {
        let bbox = BoundingBox::new(0.0, 0.0, 95.0, 50.0);
        let raster = land_cover_raster(&bbox, 10.0);
        assert_eq!((raster.width, raster.height), (10, 5));
        assert_eq!(raster.bbox.max_y, 50.0);
        assert!(raster.bbox.max_x >= 95.0);
        assert_eq!(raster.nodata, Some(0.0));
    }

    #[test]
    fn test_population_grid() {
        let bbox = BoundingBox::new(0.0, 0.0, 300.0, 200.0);
        let table = population_grid(&bbox, 100.0, "Einwohner");
        assert_eq!(table.len(), 6);
        assert_eq!(table.value("1", "Einwohner"), Some(0.0));
        assert_eq!(table.value("5", "Einwohner"), Some(10.0));
    }
}
