//! Raster reclassification by remap table.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GeoprocessingError, Result};
use crate::types::Raster;

/// One remap rule. A `to` of `None` writes no-data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RemapEntry {
    /// Exact value match.
    Value { from: f32, to: Option<f32> },
    /// Inclusive range match.
    Range { min: f32, max: f32, to: Option<f32> },
}

impl RemapEntry {
    fn apply(&self, value: f32) -> Option<Option<f32>> {
        match *self {
            Self::Value { from, to } if value == from => Some(to),
            Self::Range { min, max, to } if value >= min && value <= max => Some(to),
            _ => None,
        }
    }
}

/// What happens to data cells no entry matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Unmatched {
    /// Keep the original value.
    Keep,
    /// Write no-data.
    NoData,
    /// Write a constant.
    Constant(f32),
}

/// Ordered list of remap rules; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemapTable {
    pub entries: Vec<RemapEntry>,
    pub unmatched: Unmatched,
}

impl RemapTable {
    /// Parse the remap string form, e.g. `"10 1;20 0;30 0"`.
    ///
    /// Two tokens map a single value, three tokens map an inclusive range
    /// (`"0 5 1"`). `NODATA` as the new value writes no-data. Unmatched
    /// values are kept.
    pub fn parse(s: &str) -> Result<Self> {
        let number = |token: &str| -> Result<f32> {
            token
                .parse::<f32>()
                .map_err(|_| GeoprocessingError::InvalidRemap(format!("bad number '{}' in '{}'", token, s)))
        };
        let target = |token: &str| -> Result<Option<f32>> {
            if token.eq_ignore_ascii_case("NODATA") {
                Ok(None)
            } else {
                number(token).map(Some)
            }
        };

        let mut entries = Vec::new();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let tokens: Vec<&str> = entry.split_whitespace().collect();
            let parsed = match tokens.as_slice() {
                [from, to] => RemapEntry::Value {
                    from: number(from)?,
                    to: target(to)?,
                },
                [min, max, to] => RemapEntry::Range {
                    min: number(min)?,
                    max: number(max)?,
                    to: target(to)?,
                },
                _ => {
                    return Err(GeoprocessingError::InvalidRemap(format!(
                        "entry '{}' needs 2 or 3 values",
                        entry
                    )))
                }
            };
            entries.push(parsed);
        }

        if entries.is_empty() {
            return Err(GeoprocessingError::InvalidRemap("empty remap table".to_string()));
        }

        Ok(Self {
            entries,
            unmatched: Unmatched::Keep,
        })
    }

    /// 1 for `target_class`, 0 for every other listed class and for
    /// anything unlisted.
    pub fn binary_mask(target_class: i32, classes: &[i32]) -> Self {
        let entries = classes
            .iter()
            .map(|&class| RemapEntry::Value {
                from: class as f32,
                to: Some(if class == target_class { 1.0 } else { 0.0 }),
            })
            .collect();

        Self {
            entries,
            unmatched: Unmatched::Constant(0.0),
        }
    }

    pub fn with_unmatched(mut self, unmatched: Unmatched) -> Self {
        self.unmatched = unmatched;
        self
    }

    /// Remap string form of the table.
    pub fn to_remap_string(&self) -> String {
        let fmt_to = |to: Option<f32>| to.map_or_else(|| "NODATA".to_string(), |v| v.to_string());
        self.entries
            .iter()
            .map(|e| match *e {
                RemapEntry::Value { from, to } => format!("{} {}", from, fmt_to(to)),
                RemapEntry::Range { min, max, to } => format!("{} {} {}", min, max, fmt_to(to)),
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    /// New value for one data cell, `None` meaning no-data, plus whether a rule matched.
    fn lookup(&self, value: f32) -> (Option<f32>, bool) {
        match self.entries.iter().find_map(|e| e.apply(value)) {
            Some(to) => (to, true),
            None => match self.unmatched {
                Unmatched::Keep => (Some(value), false),
                Unmatched::NoData => (None, false),
                Unmatched::Constant(c) => (Some(c), false),
            },
        }
    }
}

/// Apply `table` to every data cell. No-data cells stay no-data.
pub fn reclassify(raster: &Raster, table: &RemapTable) -> Raster {
    let mut unmatched = 0usize;
    let data: Vec<f32> = raster
        .data
        .iter()
        .map(|&v| {
            if !raster.is_data(v) {
                return f32::NAN;
            }
            let (out, matched) = table.lookup(v);
            if !matched {
                unmatched += 1;
            }
            out.unwrap_or(f32::NAN)
        })
        .collect();

    if unmatched > 0 {
        warn!(
            unmatched,
            policy = ?table.unmatched,
            "Cells with no remap entry"
        );
    }
    debug!(cells = data.len(), rules = table.entries.len(), "Reclassified raster");

    Raster {
        width: raster.width,
        height: raster.height,
        bbox: raster.bbox,
        nodata: None,
        pixel_type: raster.pixel_type,
        data,
    }
}

/// Apply two remap tables to the same raster concurrently.
pub fn reclassify_pair(raster: &Raster, first: &RemapTable, second: &RemapTable) -> (Raster, Raster) {
    rayon::join(|| reclassify(raster, first), || reclassify(raster, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hri_common::BoundingBox;

    const WORLD_COVER: [i32; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 100];

    fn land_cover(data: Vec<f32>) -> Raster {
        let width = data.len();
        Raster::new(width, 1, BoundingBox::new(0.0, 0.0, width as f64 * 10.0, 10.0), data)
            .unwrap()
            .with_nodata(Some(0.0))
    }

    #[test]
    fn test_parse_remap_string() {
        let table = RemapTable::parse("10 1;20 0;30 0;40 0;50 0;60 0;70 0;80 0;90 0;95 0;100 0").unwrap();
        assert_eq!(table.entries.len(), 11);
        assert_eq!(table.entries[0], RemapEntry::Value { from: 10.0, to: Some(1.0) });
        assert_eq!(table.unmatched, Unmatched::Keep);
    }

    #[test]
    fn test_parse_ranges_and_nodata() {
        let table = RemapTable::parse("0 5 1; 5 10 2 ;11 NODATA").unwrap();
        assert_eq!(table.entries[0], RemapEntry::Range { min: 0.0, max: 5.0, to: Some(1.0) });
        assert_eq!(table.entries[2], RemapEntry::Value { from: 11.0, to: None });
        assert_eq!(table.to_remap_string(), "0 5 1;5 10 2;11 NODATA");
    }

    #[test]
    fn test_parse_errors() {
        assert!(RemapTable::parse("").is_err());
        assert!(RemapTable::parse("10").is_err());
        assert!(RemapTable::parse("10 x").is_err());
        assert!(RemapTable::parse("1 2 3 4").is_err());
    }

    #[test]
    fn test_binary_mask_matches_remap_string() {
        let parsed = RemapTable::parse("10 1;20 0;30 0;40 0;50 0;60 0;70 0;80 0;90 0;95 0;100 0")
            .unwrap()
            .with_unmatched(Unmatched::Constant(0.0));
        assert_eq!(RemapTable::binary_mask(10, &WORLD_COVER), parsed);
    }

    #[test]
    fn test_reclassify_mask() {
        let lc = land_cover(vec![10.0, 50.0, 0.0, 80.0, 10.0, 7.0]);
        let tree = reclassify(&lc, &RemapTable::binary_mask(10, &WORLD_COVER));
        assert_eq!(tree.data[0], 1.0);
        assert_eq!(tree.data[1], 0.0);
        assert!(tree.data[2].is_nan());
        assert_eq!(tree.data[3], 0.0);
        assert_eq!(tree.data[4], 1.0);
        // unlisted class falls back to 0
        assert_eq!(tree.data[5], 0.0);
        assert_eq!(tree.data_count(), 5);
    }

    #[test]
    fn test_reclassify_pair_shares_input() {
        let lc = land_cover(vec![10.0, 50.0, 50.0, 60.0]);
        let (tree, built) = reclassify_pair(
            &lc,
            &RemapTable::binary_mask(10, &WORLD_COVER),
            &RemapTable::binary_mask(50, &WORLD_COVER),
        );
        assert_eq!(tree.data, vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(built.data, vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(lc.data, vec![10.0, 50.0, 50.0, 60.0]);
    }

    #[test]
    fn test_unmatched_keep_and_nodata() {
        let lc = land_cover(vec![10.0, 42.0]);
        let keep = reclassify(&lc, &RemapTable::parse("10 1").unwrap());
        assert_eq!(keep.data, vec![1.0, 42.0]);

        let drop = reclassify(&lc, &RemapTable::parse("10 1").unwrap().with_unmatched(Unmatched::NoData));
        assert_eq!(drop.data[0], 1.0);
        assert!(drop.data[1].is_nan());
    }
}
