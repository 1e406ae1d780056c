//! Largest-overlap spatial join.
//!
//! Each target polygon receives the attributes of the single join polygon
//! it shares the largest intersection area with. Ties keep the candidate
//! that comes first in the join table.

use hri_common::BoundingBox;
use tracing::{info, warn};

use crate::clip::{overlap_area, polygon_bounds};
use crate::error::{GeoprocessingError, Result};
use crate::table::FeatureTable;

/// Number of join features matched to each target (0 or 1).
pub const JOIN_COUNT_FIELD: &str = "Join_Count";

/// Largest bucket grid dimension.
const MAX_BUCKETS_PER_AXIS: usize = 2048;

/// Uniform grid of buckets over feature bounding boxes.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    bounds: Vec<Option<BoundingBox>>,
    extent: BoundingBox,
    cols: usize,
    rows: usize,
    bucket_w: f64,
    bucket_h: f64,
    buckets: Vec<Vec<usize>>,
}

impl SpatialIndex {
    /// Index every feature of `table` that has geometry.
    pub fn build(table: &FeatureTable) -> Self {
        let bounds: Vec<Option<BoundingBox>> = (0..table.len())
            .map(|row| table.geometry(row).and_then(polygon_bounds))
            .collect();

        let present: Vec<&BoundingBox> = bounds.iter().flatten().collect();
        let extent = present
            .iter()
            .fold(None::<BoundingBox>, |acc, b| {
                Some(match acc {
                    None => **b,
                    Some(a) => BoundingBox::new(
                        a.min_x.min(b.min_x),
                        a.min_y.min(b.min_y),
                        a.max_x.max(b.max_x),
                        a.max_y.max(b.max_y),
                    ),
                })
            })
            .unwrap_or(BoundingBox::new(0.0, 0.0, 1.0, 1.0));

        // Bucket edge roughly matches the mean feature size.
        let mean_size = if present.is_empty() {
            1.0
        } else {
            present.iter().map(|b| b.width().max(b.height())).sum::<f64>() / present.len() as f64
        };
        let axis = |span: f64| -> usize {
            if span <= 0.0 || mean_size <= 0.0 {
                1
            } else {
                ((span / mean_size).ceil() as usize).clamp(1, MAX_BUCKETS_PER_AXIS)
            }
        };
        let cols = axis(extent.width());
        let rows = axis(extent.height());
        let bucket_w = (extent.width() / cols as f64).max(f64::MIN_POSITIVE);
        let bucket_h = (extent.height() / rows as f64).max(f64::MIN_POSITIVE);

        let mut index = Self {
            bounds,
            extent,
            cols,
            rows,
            bucket_w,
            bucket_h,
            buckets: vec![Vec::new(); cols * rows],
        };

        for feature in 0..index.bounds.len() {
            if let Some(b) = index.bounds[feature] {
                let (c0, r0, c1, r1) = index.bucket_range(&b);
                for r in r0..=r1 {
                    for c in c0..=c1 {
                        index.buckets[r * cols + c].push(feature);
                    }
                }
            }
        }

        index
    }

    fn bucket_range(&self, b: &BoundingBox) -> (usize, usize, usize, usize) {
        let col = |x: f64| -> usize {
            (((x - self.extent.min_x) / self.bucket_w).floor().max(0.0) as usize).min(self.cols - 1)
        };
        let row = |y: f64| -> usize {
            (((y - self.extent.min_y) / self.bucket_h).floor().max(0.0) as usize).min(self.rows - 1)
        };
        (col(b.min_x), row(b.min_y), col(b.max_x), row(b.max_y))
    }

    pub fn len(&self) -> usize {
        self.bounds.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Features whose bounding box intersects `query`, in ascending row order.
    pub fn candidates(&self, query: &BoundingBox) -> Vec<usize> {
        if !self.extent.expand(f64::EPSILON).intersects(query) {
            return Vec::new();
        }

        let (c0, r0, c1, r1) = self.bucket_range(query);
        let mut found = Vec::new();
        for r in r0..=r1 {
            for c in c0..=c1 {
                found.extend_from_slice(&self.buckets[r * self.cols + c]);
            }
        }
        found.sort_unstable();
        found.dedup();
        found.retain(|&i| self.bounds[i].map_or(false, |b| b.intersects(query)));
        found
    }
}

/// Relative difference below which two overlap areas count as equal.
const TIE_TOLERANCE: f64 = 1e-9;

/// Spatially join `join` onto `target` with the largest-overlap rule.
///
/// The output keeps every target row, its geometry and fields, adds
/// [`JOIN_COUNT_FIELD`] and every field of `join`. Clashing names are
/// suffixed the way [`FeatureTable::join_field`] does.
pub fn largest_overlap_join(
    target: &FeatureTable,
    join: &FeatureTable,
    out_name: &str,
) -> Result<FeatureTable> {
    let index = SpatialIndex::build(join);
    let join_fields: Vec<&str> = join.field_names().collect();

    let mut output = target.clone();
    output.set_name(out_name);

    let mut matches: Vec<Option<usize>> = Vec::with_capacity(target.len());
    for row in target.rows() {
        let polygon = row
            .geometry()
            .ok_or_else(|| GeoprocessingError::MissingGeometry(row.key().to_string()))?;

        let mut best: Option<(usize, f64)> = None;
        if let Some(bounds) = polygon_bounds(polygon) {
            for candidate in index.candidates(&bounds) {
                let Some(candidate_polygon) = join.geometry(candidate) else {
                    continue;
                };
                let area = overlap_area(candidate_polygon, polygon);
                // overlaps equal within TIE_TOLERANCE keep the first candidate
                if area > 0.0 && best.map_or(true, |(_, a)| area > a * (1.0 + TIE_TOLERANCE)) {
                    best = Some((candidate, area));
                }
            }
        }
        matches.push(best.map(|(i, _)| i));
    }

    let join_count = matches
        .iter()
        .map(|m| Some(if m.is_some() { 1.0 } else { 0.0 }))
        .collect();
    let count_name = output.unique_field_name(JOIN_COUNT_FIELD);
    output.set_column(&count_name, join_count)?;

    for field in &join_fields {
        let source = join.column(field)?;
        let values = matches.iter().map(|m| m.and_then(|i| source[i])).collect();
        let name = output.unique_field_name(field);
        output.set_column(&name, values)?;
    }

    let matched = matches.iter().filter(|m| m.is_some()).count();
    let unmatched = matches.len() - matched;
    if unmatched > 0 {
        warn!(unmatched, "Target features without overlapping join feature");
    }
    info!(
        table = out_name,
        targets = matches.len(),
        join_features = index.len(),
        matched,
        "Largest-overlap spatial join complete"
    );

    Ok(output)
}
