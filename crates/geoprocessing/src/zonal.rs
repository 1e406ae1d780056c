//! Zonal statistics as table.
//!
//! A raster cell belongs to the zone containing its centre. Only data
//! cells are aggregated; NaN and no-data cells are skipped, and zones that
//! end up without a single data cell get no output row.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::table::FeatureTable;
use crate::types::Raster;

/// Pixel count column.
pub const COUNT_FIELD: &str = "COUNT";
/// Zone area column (data cells times cell area).
pub const AREA_FIELD: &str = "AREA";

/// Maps points to zones.
pub trait ZoneLocator {
    /// Number of zones.
    fn zone_count(&self) -> usize;

    /// Unique key of a zone.
    fn zone_key(&self, zone: usize) -> &str;

    /// Name of the key field in the output table.
    fn key_field(&self) -> &str;

    /// Zone containing a point.
    fn locate_zone(&self, x: f64, y: f64) -> Option<usize>;
}

/// Statistic computed per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZonalStatistic {
    Maximum,
    Minimum,
    Sum,
    Mean,
}

impl ZonalStatistic {
    /// Output column name.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Maximum => "MAX",
            Self::Minimum => "MIN",
            Self::Sum => "SUM",
            Self::Mean => "MEAN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MAXIMUM" | "MAX" => Some(Self::Maximum),
            "MINIMUM" | "MIN" => Some(Self::Minimum),
            "SUM" => Some(Self::Sum),
            "MEAN" => Some(Self::Mean),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn value(&self, statistic: ZonalStatistic) -> f64 {
        match statistic {
            ZonalStatistic::Maximum => self.max,
            ZonalStatistic::Minimum => self.min,
            ZonalStatistic::Sum => self.sum,
            ZonalStatistic::Mean => self.sum / self.count as f64,
        }
    }
}

/// Summarize `raster` within each zone.
///
/// The output table is keyed like the zones and carries `COUNT`, `AREA`
/// and the statistic column (`MAX`, `MIN`, `SUM` or `MEAN`).
pub fn zonal_statistics_as_table<Z>(
    zones: &Z,
    raster: &Raster,
    statistic: ZonalStatistic,
    out_name: &str,
) -> Result<FeatureTable>
where
    Z: ZoneLocator + ?Sized,
{
    let mut acc = vec![Accumulator::default(); zones.zone_count()];
    let mut outside = 0usize;

    for row in 0..raster.height {
        for col in 0..raster.width {
            let value = raster.data[row * raster.width + col];
            if !raster.is_data(value) {
                continue;
            }
            let (x, y) = raster.cell_center(row, col);
            match zones.locate_zone(x, y) {
                Some(zone) => acc[zone].add(value as f64),
                None => outside += 1,
            }
        }
    }

    let cell_area = raster.cell_area();
    let stat_field = statistic.field_name();
    let mut table = FeatureTable::new(out_name, zones.key_field());
    table.add_field(COUNT_FIELD);
    table.add_field(AREA_FIELD);
    table.add_field(stat_field);

    for (zone, a) in acc.iter().enumerate() {
        if a.count == 0 {
            continue;
        }
        let row = table.insert(zones.zone_key(zone), None)?;
        table.set_value(row, COUNT_FIELD, Some(a.count as f64))?;
        table.set_value(row, AREA_FIELD, Some(a.count as f64 * cell_area))?;
        table.set_value(row, stat_field, Some(a.value(statistic)))?;
    }

    debug!(
        table = out_name,
        statistic = stat_field,
        zones = table.len(),
        cells_outside_zones = outside,
        "Zonal statistics complete"
    );

    Ok(table)
}
