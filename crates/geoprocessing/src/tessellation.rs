//! Regular hexagon tessellation of an extent.
//!
//! Hexagons are flat-topped. For a cell area `A` the side length is
//! `s = sqrt(2A / (3 * sqrt(3)))`; columns are `1.5 s` apart, rows
//! `sqrt(3) s` apart, and odd columns are shifted up by half a row. The
//! lattice is anchored with the centre of cell (0, 0) on the extent's
//! lower-left corner.
//!
//! Boundary hexagons are kept whole: every hexagon whose polygon overlaps
//! the extent with positive area is part of the tessellation, so the union
//! of the bins covers the extent and may spill past its edges.

use std::collections::HashMap;

use geo::{Coord, LineString, Polygon};
use hri_common::{BoundingBox, Extent};
use tracing::info;

use crate::clip::overlap_area;
use crate::error::{GeoprocessingError, Result};
use crate::table::FeatureTable;
use crate::zonal::ZoneLocator;

/// Key field of tessellation tables.
pub const GRID_ID_FIELD: &str = "GRID_ID";

/// Upper bound on generated cells; a larger grid means the cell size and
/// the extent units disagree.
const MAX_CELLS: f64 = 50_000_000.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Flat-topped hexagon lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub side: f64,
}

impl HexGrid {
    /// Lattice of hexagons with the given area anchored at `origin`.
    pub fn with_cell_area(origin_x: f64, origin_y: f64, cell_area: f64) -> Result<Self> {
        if !cell_area.is_finite() || cell_area <= 0.0 {
            return Err(GeoprocessingError::InvalidTessellation(format!(
                "cell area must be positive, got {}",
                cell_area
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            side: (2.0 * cell_area / (3.0 * SQRT_3)).sqrt(),
        })
    }

    pub fn cell_area(&self) -> f64 {
        1.5 * SQRT_3 * self.side * self.side
    }

    pub fn column_spacing(&self) -> f64 {
        1.5 * self.side
    }

    pub fn row_spacing(&self) -> f64 {
        SQRT_3 * self.side
    }

    /// Centre of cell (col, row).
    pub fn center(&self, col: i64, row: i64) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.column_spacing();
        let shift = if col.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
        let y = self.origin_y + (row as f64 + shift) * self.row_spacing();
        (x, y)
    }

    /// Counter-clockwise closed polygon of cell (col, row).
    pub fn hexagon(&self, col: i64, row: i64) -> Polygon<f64> {
        let (cx, cy) = self.center(col, row);
        let half_h = 0.5 * SQRT_3 * self.side;
        let half_s = 0.5 * self.side;
        let ring = vec![
            Coord { x: cx + self.side, y: cy },
            Coord { x: cx + half_s, y: cy + half_h },
            Coord { x: cx - half_s, y: cy + half_h },
            Coord { x: cx - self.side, y: cy },
            Coord { x: cx - half_s, y: cy - half_h },
            Coord { x: cx + half_s, y: cy - half_h },
            Coord { x: cx + self.side, y: cy },
        ];
        Polygon::new(LineString::new(ring), vec![])
    }

    /// Bounding box of cell (col, row).
    pub fn cell_bounds(&self, col: i64, row: i64) -> BoundingBox {
        let (cx, cy) = self.center(col, row);
        let half_h = 0.5 * SQRT_3 * self.side;
        BoundingBox::new(cx - self.side, cy - half_h, cx + self.side, cy + half_h)
    }

    /// Cell containing a point: the one with the nearest centre.
    ///
    /// Points on a shared edge resolve to the lower column, then lower row.
    pub fn locate(&self, x: f64, y: f64) -> (i64, i64) {
        let approx_col = ((x - self.origin_x) / self.column_spacing()).round() as i64;

        let mut best = (approx_col, 0);
        let mut best_dist = f64::INFINITY;
        for col in approx_col - 1..=approx_col + 1 {
            let shift = if col.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
            let approx_row = ((y - self.origin_y) / self.row_spacing() - shift).round() as i64;
            for row in approx_row - 1..=approx_row + 1 {
                let (cx, cy) = self.center(col, row);
                let dist = (x - cx).powi(2) + (y - cy).powi(2);
                if dist < best_dist {
                    best_dist = dist;
                    best = (col, row);
                }
            }
        }
        best
    }
}

/// One hexagon bin.
#[derive(Debug, Clone)]
pub struct HexBin {
    pub grid_id: String,
    pub col: i64,
    pub row: i64,
    pub polygon: Polygon<f64>,
}

/// Hexagon bins covering an extent.
#[derive(Debug, Clone)]
pub struct HexTessellation {
    grid: HexGrid,
    extent: Extent,
    bins: Vec<HexBin>,
    lookup: HashMap<(i64, i64), usize>,
}

impl HexTessellation {
    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn bins(&self) -> &[HexBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Index of the bin containing a point, if that cell is part of the tessellation.
    pub fn bin_at(&self, x: f64, y: f64) -> Option<usize> {
        self.lookup.get(&self.grid.locate(x, y)).copied()
    }

    /// Feature table with one row per bin, keyed by `GRID_ID`.
    pub fn to_table(&self, name: &str) -> Result<FeatureTable> {
        let mut table = FeatureTable::new(name, GRID_ID_FIELD);
        for bin in &self.bins {
            table.insert(bin.grid_id.clone(), Some(bin.polygon.clone()))?;
        }
        Ok(table)
    }
}

impl ZoneLocator for HexTessellation {
    fn zone_count(&self) -> usize {
        self.bins.len()
    }

    fn zone_key(&self, zone: usize) -> &str {
        &self.bins[zone].grid_id
    }

    fn key_field(&self) -> &str {
        GRID_ID_FIELD
    }

    fn locate_zone(&self, x: f64, y: f64) -> Option<usize> {
        self.bin_at(x, y)
    }
}

/// Spreadsheet-style column letters: 1 -> A, 26 -> Z, 27 -> AA.
pub fn column_label(mut n: u64) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// `GRID_ID` of a 1-based column / row pair, e.g. `AB-12`.
pub fn grid_id(col: u64, row: u64) -> String {
    format!("{}-{}", column_label(col), row)
}

/// Partition `extent` into hexagons of `cell_area` square units.
pub fn generate_tessellation(extent: &Extent, cell_area: f64) -> Result<HexTessellation> {
    extent
        .require_projected()
        .map_err(|e| GeoprocessingError::InvalidTessellation(e.to_string()))?;

    let bbox = extent.bbox;
    let grid = HexGrid::with_cell_area(bbox.min_x, bbox.min_y, cell_area)?;

    let estimated = bbox.area() / cell_area;
    if estimated > MAX_CELLS {
        return Err(GeoprocessingError::InvalidTessellation(format!(
            "{:.0} cells of {} m² would be needed for this extent",
            estimated, cell_area
        )));
    }

    let max_col = (bbox.width() / grid.column_spacing()).ceil() as i64 + 1;
    let max_row = (bbox.height() / grid.row_spacing()).ceil() as i64 + 1;
    let min_overlap = cell_area * 1e-9;
    let extent_polygon = Polygon::new(
        LineString::from(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
            (bbox.min_x, bbox.min_y),
        ]),
        vec![],
    );

    let mut cells = Vec::new();
    for col in -1..=max_col {
        for row in -1..=max_row {
            let bounds = grid.cell_bounds(col, row);
            if !bounds.intersects(&bbox) {
                continue;
            }
            let inside = bounds.min_x >= bbox.min_x
                && bounds.max_x <= bbox.max_x
                && bounds.min_y >= bbox.min_y
                && bounds.max_y <= bbox.max_y;
            if inside || overlap_area(&extent_polygon, &grid.hexagon(col, row)) > min_overlap {
                cells.push((col, row));
            }
        }
    }

    let first_col = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let first_row = cells.iter().map(|c| c.1).min().unwrap_or(0);

    let mut bins = Vec::with_capacity(cells.len());
    let mut lookup = HashMap::with_capacity(cells.len());
    for (col, row) in cells {
        lookup.insert((col, row), bins.len());
        bins.push(HexBin {
            grid_id: grid_id((col - first_col + 1) as u64, (row - first_row + 1) as u64),
            col,
            row,
            polygon: grid.hexagon(col, row),
        });
    }

    info!(
        bins = bins.len(),
        side = grid.side,
        cell_area = cell_area,
        "Generated hexagon tessellation"
    );

    Ok(HexTessellation {
        grid,
        extent: *extent,
        bins,
        lookup,
    })
}
