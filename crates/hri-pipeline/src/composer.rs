//! Index composition: percentages, min-max scores and the HRI sum.
//!
//! `HRI` is the unweighted sum of three standardized indicators:
//! population, maximum surface temperature and the share of the bin
//! lacking tree cover. It is not a weighted heat formula.

use geoprocessing::zonal::COUNT_FIELD;
use geoprocessing::{FeatureTable, Standardization, ZonalStatistic};
use tracing::{info, warn};

use crate::error::{PipelineError, Result, Stage, StageContext};

pub const PCT_TREE_COVER: &str = "PCT_Tree_Cover";
pub const PCT_LACKING: &str = "PCT_Lacking";
pub const PCT_BUILT_UP_AREA: &str = "PCT_built_up_area";
pub const TEMP_MAX_MIN_MAX: &str = "TEMP_MAX_MIN_MAX";
pub const PCT_LACKING_MIN_MAX: &str = "PCT_Lacking_MIN_MAX";
pub const HRI_FIELD: &str = "HRI";

/// Per-bin zonal statistics feeding the index.
#[derive(Debug, Clone)]
pub struct ZonalTables {
    /// `MAX` of surface temperature.
    pub temperature: FeatureTable,
    /// `SUM` of the tree-canopy mask.
    pub tree_canopy: FeatureTable,
    /// `SUM` of the built-up mask.
    pub built_up: FeatureTable,
}

/// Names of the three raw indicators on the bin table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInputs {
    pub population: String,
    pub temperature: String,
    pub lacking: String,
}

pub struct IndexComposer {
    population_field: String,
    normalization: Standardization,
}

impl IndexComposer {
    pub fn new(population_field: impl Into<String>, normalization: Standardization) -> Self {
        Self {
            population_field: population_field.into(),
            normalization,
        }
    }

    /// Name of the standardized population field, e.g. `Einwohner_MIN_MAX`.
    pub fn population_score_field(&self) -> String {
        format!("{}_MIN_MAX", self.population_field)
    }

    /// Join the zonal results onto `bins` and derive the percentage fields,
    /// then score the bins.
    pub fn compose(&self, bins: &mut FeatureTable, zonal: ZonalTables) -> Result<IndexInputs> {
        let sum = ZonalStatistic::Sum.field_name();
        let max = ZonalStatistic::Maximum.field_name();
        let ZonalTables {
            temperature,
            mut tree_canopy,
            mut built_up,
        } = zonal;

        let stage = Stage::IndexComposition;

        tree_canopy
            .calculate_field(PCT_TREE_COVER, |row| {
                Some(row.get(sum)? / row.get(COUNT_FIELD)? * 100.0)
            })
            .stage(stage)?;
        tree_canopy
            .calculate_field(PCT_LACKING, |row| Some(100.0 - row.get(PCT_TREE_COVER)?))
            .stage(stage)?;

        bins.join_field(&tree_canopy, &[sum]).stage(stage)?;
        let temperature_field = first(bins.join_field(&temperature, &[max]).stage(stage)?, max);
        let pct = bins
            .join_field(&tree_canopy, &[PCT_TREE_COVER, PCT_LACKING])
            .stage(stage)?;
        let lacking_field = pct.get(1).cloned().unwrap_or_else(|| PCT_LACKING.to_string());

        built_up
            .calculate_field(PCT_BUILT_UP_AREA, |row| {
                Some(row.get(sum)? / row.get(COUNT_FIELD)? * 100.0)
            })
            .stage(stage)?;
        bins.join_field(&built_up, &[sum]).stage(stage)?;
        bins.join_field(&built_up, &[PCT_BUILT_UP_AREA]).stage(stage)?;

        let inputs = IndexInputs {
            population: self.population_field.clone(),
            temperature: temperature_field,
            lacking: lacking_field,
        };
        self.score(bins, &inputs)?;
        Ok(inputs)
    }

    /// Standardize the three indicators and write `HRI`.
    ///
    /// Re-running on an unchanged table reproduces the same scores.
    pub fn score(&self, bins: &mut FeatureTable, inputs: &IndexInputs) -> Result<()> {
        for field in [&inputs.population, &inputs.temperature, &inputs.lacking] {
            if !bins.has_field(field) {
                return Err(PipelineError::Configuration(format!(
                    "field '{}' is missing from {}",
                    field,
                    bins.name()
                )));
            }
        }

        let population_score = self.population_score_field();
        bins.standardize_fields(
            &[
                (inputs.population.as_str(), population_score.as_str()),
                (inputs.temperature.as_str(), TEMP_MAX_MIN_MAX),
                (inputs.lacking.as_str(), PCT_LACKING_MIN_MAX),
            ],
            &self.normalization,
        )
        .stage(Stage::IndexComposition)?;

        bins.calculate_field(HRI_FIELD, |row| {
            Some(row.get(TEMP_MAX_MIN_MAX)? + row.get(PCT_LACKING_MIN_MAX)? + row.get(&population_score)?)
        })
        .stage(Stage::IndexComposition)?;

        let scored = bins
            .column(HRI_FIELD)
            .stage(Stage::IndexComposition)?
            .iter()
            .filter(|v| v.is_some())
            .count();
        if scored < bins.len() {
            warn!(
                unscored = bins.len() - scored,
                "Bins without a complete set of indicators have a null HRI"
            );
        }
        info!(bins = bins.len(), scored, "Composed heat risk index");
        Ok(())
    }
}

fn first(names: Vec<String>, fallback: &str) -> String {
    names.into_iter().next().unwrap_or_else(|| fallback.to_string())
}
