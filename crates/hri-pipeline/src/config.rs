//! Pipeline configuration.
//!
//! Values come from the built-in defaults, then an optional YAML file, then
//! `HRI_*` environment variables.

use std::path::{Path, PathBuf};

use geoprocessing::{CleanupPolicy, GeoprocessingConfig, PixelType, Standardization};
use hri_common::MonthSet;
use serde::{Deserialize, Serialize};
use sources::SourcesConfig;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Default hexagon area in square meters.
pub const DEFAULT_CELL_AREA: f64 = 1500.0;

/// Catalog predicate preferring well-ranked scenes and overview items.
pub const DEFAULT_SCENE_PREDICATE: &str = "(Best < 2000000) OR (Name LIKE 'Ov%')";

/// Server-side template producing surface temperature in degrees Celsius.
pub const DEFAULT_TEMPERATURE_TEMPLATE: &str = "Band 10 Surface Temperature in Celsius";

/// ESA WorldCover class codes.
pub const WORLD_COVER_CLASSES: [i32; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 100];

/// WorldCover "Tree cover".
pub const TREE_COVER_CLASS: i32 = 10;

/// WorldCover "Built-up".
pub const BUILT_UP_CLASS: i32 = 50;

/// Population attribute of the Zensus 2022 grid.
pub const DEFAULT_POPULATION_FIELD: &str = "Einwohner";

/// Everything a run needs besides the extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hexagon area in square units of the extent's reference.
    pub cell_area: f64,

    /// Scenes must have a cloud cover fraction strictly below this.
    pub max_cloud_cover: f64,

    /// Acceptable acquisition months.
    pub months: MonthSet,

    /// Additional catalog where clause, ANDed with the cloud and month terms.
    pub scene_predicate: Option<String>,

    /// Rendering template applied when exporting the selected scene.
    pub temperature_template: String,

    /// Storage format of the extracted temperature raster.
    pub temperature_pixel_type: PixelType,

    /// Cell size of the temperature export.
    pub temperature_cell_size: f64,

    /// Cell size of the land-cover export.
    pub land_cover_cell_size: f64,

    /// Population attribute carried over from the population grid.
    pub population_field: String,

    /// Output range of the min-max standardization.
    pub normalization: Standardization,

    /// Land-cover class counted as tree canopy.
    pub tree_class: i32,

    /// Land-cover class counted as built-up area.
    pub built_up_class: i32,

    /// Every class the land-cover raster may contain.
    pub land_cover_classes: Vec<i32>,

    /// Parent directory of run workspaces; the system temp dir when unset.
    pub workspace_dir: Option<PathBuf>,

    /// Replace existing artifacts instead of failing.
    pub overwrite: bool,

    /// What to keep when a run ends.
    pub cleanup: CleanupPolicy,

    pub sources: SourcesConfig,

    pub geoprocessing: GeoprocessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cell_area: DEFAULT_CELL_AREA,
            max_cloud_cover: 0.05,
            months: MonthSet::summer(),
            scene_predicate: Some(DEFAULT_SCENE_PREDICATE.to_string()),
            temperature_template: DEFAULT_TEMPERATURE_TEMPLATE.to_string(),
            temperature_pixel_type: PixelType::S8,
            temperature_cell_size: 30.0,
            land_cover_cell_size: 10.0,
            population_field: DEFAULT_POPULATION_FIELD.to_string(),
            normalization: Standardization::default(),
            tree_class: TREE_COVER_CLASS,
            built_up_class: BUILT_UP_CLASS,
            land_cover_classes: WORLD_COVER_CLASSES.to_vec(),
            workspace_dir: None,
            overwrite: true,
            cleanup: CleanupPolicy::default(),
            sources: SourcesConfig::default(),
            geoprocessing: GeoprocessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `path` (if any) and then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&contents)?;
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| PipelineError::Configuration(format!("invalid config: {}", e)))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `HRI_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("HRI_CELL_AREA") {
            if let Ok(area) = val.parse() {
                self.cell_area = area;
            }
        }

        if let Ok(val) = std::env::var("HRI_MAX_CLOUD_COVER") {
            if let Ok(cover) = val.parse() {
                self.max_cloud_cover = cover;
            }
        }

        if let Ok(val) = std::env::var("HRI_MONTHS") {
            match MonthSet::parse(&val) {
                Ok(months) => self.months = months,
                Err(e) => debug!(error = %e, "Ignoring HRI_MONTHS"),
            }
        }

        if let Ok(val) = std::env::var("HRI_SCENE_PREDICATE") {
            self.scene_predicate = if val.trim().is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var("HRI_TEMPERATURE_PIXEL_TYPE") {
            if let Some(pixel_type) = PixelType::from_str(&val) {
                self.temperature_pixel_type = pixel_type;
            }
        }

        if let Ok(val) = std::env::var("HRI_POPULATION_FIELD") {
            self.population_field = val;
        }

        if let Ok(val) = std::env::var("HRI_NORMALIZATION_MIN") {
            if let Ok(min) = val.parse() {
                self.normalization.min_value = min;
            }
        }

        if let Ok(val) = std::env::var("HRI_NORMALIZATION_MAX") {
            if let Ok(max) = val.parse() {
                self.normalization.max_value = max;
            }
        }

        if let Ok(val) = std::env::var("HRI_WORKSPACE_DIR") {
            self.workspace_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("HRI_CLEANUP") {
            self.cleanup = CleanupPolicy::from_str(&val);
        }

        self.sources.apply_env();
        self.geoprocessing.apply_env();
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::Configuration(msg));

        if !(self.cell_area.is_finite() && self.cell_area > 0.0) {
            return invalid(format!("cell_area must be positive, got {}", self.cell_area));
        }
        if !(0.0..=1.0).contains(&self.max_cloud_cover) {
            return invalid(format!(
                "max_cloud_cover must be within [0, 1], got {}",
                self.max_cloud_cover
            ));
        }
        for (name, size) in [
            ("temperature_cell_size", self.temperature_cell_size),
            ("land_cover_cell_size", self.land_cover_cell_size),
        ] {
            if !(size.is_finite() && size > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, size));
            }
        }
        if self.population_field.trim().is_empty() {
            return invalid("population_field must not be empty".to_string());
        }
        if self.temperature_template.trim().is_empty() {
            return invalid("temperature_template must not be empty".to_string());
        }
        if let Err(e) = self.normalization.validate() {
            return invalid(e.to_string());
        }
        for class in [self.tree_class, self.built_up_class] {
            if !self.land_cover_classes.contains(&class) {
                return invalid(format!("class {} is not in land_cover_classes", class));
            }
        }
        if self.tree_class == self.built_up_class {
            return invalid("tree_class and built_up_class must differ".to_string());
        }

        self.sources.validate().map_err(PipelineError::Configuration)?;
        self.geoprocessing.validate().map_err(PipelineError::Configuration)?;
        Ok(())
    }
}
