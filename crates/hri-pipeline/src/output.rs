//! Pipeline result and queries over the scored bins.

use std::path::PathBuf;
use std::time::Duration;

use geoprocessing::FeatureTable;
use hri_common::SpatialReference;
use serde::Serialize;
use sources::SceneMetadata;

use crate::composer::HRI_FIELD;
use crate::error::Stage;

/// One bin and its index value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBin {
    pub grid_id: String,
    pub hri: f64,
}

/// Bins sharing one rounded index value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskGroup {
    /// `GRID_ID` of the first bin in the group.
    pub name: String,
    /// Rounded index value shared by the group.
    pub hri: f64,
    pub bins: Vec<RiskBin>,
}

/// Compact description of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub output: PathBuf,
    pub scene_id: i64,
    pub scene_name: String,
    pub acquired: String,
    pub bins: usize,
    pub scored_bins: usize,
    pub hri_min: Option<f64>,
    pub hri_max: Option<f64>,
    pub stage_ms: Vec<(Stage, u128)>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub run_id: String,
    /// Location of the final bin table (GeoJSON).
    pub path: PathBuf,
    pub workspace: PathBuf,
    /// Scene the temperature was taken from.
    pub scene: SceneMetadata,
    /// Final bin table with the `HRI` field.
    pub table: FeatureTable,
    pub srs: SpatialReference,
    pub timings: Vec<(Stage, Duration)>,
}

impl PipelineOutput {
    fn scored(&self) -> Vec<RiskBin> {
        let Ok(values) = self.table.column(HRI_FIELD) else {
            return Vec::new();
        };
        self.table
            .keys()
            .iter()
            .zip(values)
            .filter_map(|(key, value)| {
                value.map(|hri| RiskBin {
                    grid_id: key.clone(),
                    hri,
                })
            })
            .collect()
    }

    /// Bins with `HRI > threshold`, highest first. Ties keep table order.
    pub fn high_risk_bins(&self, threshold: f64) -> Vec<RiskBin> {
        let mut bins: Vec<RiskBin> = self.scored().into_iter().filter(|b| b.hri > threshold).collect();
        bins.sort_by(|a, b| b.hri.total_cmp(&a.hri));
        bins
    }

    /// Scored bins grouped by `HRI` rounded to `precision` decimals, groups
    /// ordered from the highest value down.
    pub fn group_by_risk(&self, precision: u32) -> Vec<RiskGroup> {
        group_bins(self.high_risk_bins(f64::NEG_INFINITY), precision)
    }

    pub fn summary(&self) -> RunSummary {
        let scored = self.scored();
        let hri_min = scored.iter().map(|b| b.hri).reduce(f64::min);
        let hri_max = scored.iter().map(|b| b.hri).reduce(f64::max);

        RunSummary {
            run_id: self.run_id.clone(),
            output: self.path.clone(),
            scene_id: self.scene.object_id,
            scene_name: self.scene.name.clone(),
            acquired: self.scene.acquisition_date.to_rfc3339(),
            bins: self.table.len(),
            scored_bins: scored.len(),
            hri_min,
            hri_max,
            stage_ms: self
                .timings
                .iter()
                .map(|(stage, elapsed)| (*stage, elapsed.as_millis()))
                .collect(),
        }
    }
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Group bins already sorted by descending `HRI`.
pub fn group_bins(sorted: Vec<RiskBin>, precision: u32) -> Vec<RiskGroup> {
    let mut groups: Vec<RiskGroup> = Vec::new();

    for bin in sorted {
        let value = round_to(bin.hri, precision);
        match groups.last_mut() {
            Some(group) if group.hri == value => group.bins.push(bin),
            _ => groups.push(RiskGroup {
                name: bin.grid_id.clone(),
                hri: value,
                bins: vec![bin],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn output(values: &[Option<f64>]) -> PipelineOutput {
        let mut table = FeatureTable::new("HRI_Spatial_Bins", "GRID_ID");
        for i in 0..values.len() {
            table.insert(format!("A-{}", i + 1), None).unwrap();
        }
        table.set_column(HRI_FIELD, values.to_vec()).unwrap();

        PipelineOutput {
            run_id: "test".to_string(),
            path: PathBuf::from("/tmp/hri_test/HRI_Spatial_Bins.geojson"),
            workspace: PathBuf::from("/tmp/hri_test"),
            scene: SceneMetadata {
                object_id: 1,
                name: "LC09".to_string(),
                acquisition_date: Utc.with_ymd_and_hms(2023, 8, 15, 0, 0, 0).unwrap(),
                cloud_cover: 0.02,
                best: None,
            },
            table,
            srs: SpatialReference { wkid: 32632 },
            timings: vec![(Stage::Tessellation, Duration::from_millis(12))],
        }
    }

    #[test]
    fn test_high_risk_bins() {
        let out = output(&[Some(9.5), Some(12.0), None, Some(4.0), Some(12.0)]);
        let bins = out.high_risk_bins(9.0);
        let ids: Vec<&str> = bins.iter().map(|b| b.grid_id.as_str()).collect();
        assert_eq!(ids, vec!["A-2", "A-5", "A-1"]);
    }

    #[test]
    fn test_group_by_risk() {
        let out = output(&[Some(9.6), Some(12.2), Some(10.4), Some(11.8), Some(3.0)]);
        let groups = out.group_by_risk(0);

        let summary: Vec<(String, f64, usize)> = groups
            .iter()
            .map(|g| (g.name.clone(), g.hri, g.bins.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("A-2".to_string(), 12.0, 2),
                ("A-3".to_string(), 10.0, 2),
                ("A-5".to_string(), 3.0, 1),
            ]
        );
    }

    #[test]
    fn test_summary() {
        let out = output(&[Some(3.0), None, Some(15.0)]);
        let summary = out.summary();
        assert_eq!(summary.bins, 3);
        assert_eq!(summary.scored_bins, 2);
        assert_eq!(summary.hri_min, Some(3.0));
        assert_eq!(summary.hri_max, Some(15.0));
        assert_eq!(summary.stage_ms, vec![(Stage::Tessellation, 12)]);
    }
}
