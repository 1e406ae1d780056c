//! The eight-stage heat risk index run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use geoprocessing::{
    generate_tessellation, largest_overlap_join, reclassify_pair, write_geojson,
    zonal_statistics_as_table, RemapTable, RunWorkspace, ZarrRasterWriter, ZonalStatistic,
    JOIN_COUNT_FIELD,
};
use hri_common::{BoundingBox, Extent, SpatialReference};
use sources::{
    FeatureServerPopulation, ImageServerCatalog, ImageServerRaster, ImageryCatalog,
    PopulationSource, RasterSource,
};
use tracing::{error, info, warn};

use crate::composer::{IndexComposer, ZonalTables};
use crate::config::PipelineConfig;
use crate::environment::{new_run_id, EngineEnvironment};
use crate::error::{PipelineError, PipelineFailure, Result, Stage, StageContext, UpstreamError};
use crate::extractor::{extract_rasters, persist_raster, ExtractionSettings};
use crate::output::PipelineOutput;
use crate::selector::{select_scene, SceneFilter};

/// Name of the raw hexagon table.
pub const TESSELLATION_TABLE: &str = "HRI_Hexagone";

/// Name of the bin table that accumulates every indicator.
pub const BINS_TABLE: &str = "HRI_Spatial_Bins";

/// File the final bin table is written to inside the run workspace.
pub const OUTPUT_FILE: &str = "HRI_Spatial_Bins.geojson";

pub const TREE_MASK_ARTIFACT: &str = "reclass_tree_canopy";
pub const BUILT_UP_MASK_ARTIFACT: &str = "reclass_built_up_area";

/// Records how long each stage took.
struct StageClock {
    mark: Instant,
    timings: Vec<(Stage, Duration)>,
}

impl StageClock {
    fn start() -> Self {
        Self {
            mark: Instant::now(),
            timings: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    fn finish(&mut self, stage: Stage) -> u128 {
        let elapsed = self.mark.elapsed();
        self.timings.push((stage, elapsed));
        self.mark = Instant::now();
        elapsed.as_millis()
    }
}

/// Run CPU-bound work off the async executor.
async fn blocking<T, F>(stage: Stage, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PipelineError::upstream(stage, UpstreamError::Task(e.to_string())))?
}

/// Heat risk index pipeline over injected data sources.
pub struct HeatRiskPipeline {
    config: PipelineConfig,
    environment: EngineEnvironment,
    catalog: Arc<dyn ImageryCatalog>,
    land_cover: Arc<dyn RasterSource>,
    population: Arc<dyn PopulationSource>,
}

impl HeatRiskPipeline {
    /// Build a pipeline; the configuration is validated up front.
    pub fn new(
        config: PipelineConfig,
        catalog: Arc<dyn ImageryCatalog>,
        land_cover: Arc<dyn RasterSource>,
        population: Arc<dyn PopulationSource>,
    ) -> Result<Self> {
        config.validate()?;
        let environment = EngineEnvironment::from_config(&config);
        Ok(Self {
            config,
            environment,
            catalog,
            land_cover,
            population,
        })
    }

    /// Pipeline backed by the ArcGIS services named in `config.sources`.
    pub fn with_http_sources(config: PipelineConfig) -> Result<Self> {
        let to_config = |e: sources::SourceError| PipelineError::Configuration(e.to_string());
        let catalog = ImageServerCatalog::new(&config.sources).map_err(to_config)?;
        let land_cover = ImageServerRaster::new(&config.sources).map_err(to_config)?;
        let population = FeatureServerPopulation::new(&config.sources).map_err(to_config)?;
        Self::new(config, Arc::new(catalog), Arc::new(land_cover), Arc::new(population))
    }

    pub fn with_environment(mut self, environment: EngineEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn environment(&self) -> &EngineEnvironment {
        &self.environment
    }

    /// Resolve the raw box and reference, then run every stage.
    pub async fn run(
        &self,
        bbox: BoundingBox,
        srs: Option<SpatialReference>,
    ) -> std::result::Result<PipelineOutput, PipelineFailure> {
        let clock = StageClock::start();
        let extent = Extent::resolve(bbox, srs)
            .map_err(|e| PipelineFailure::new(None, e.into()))?;
        self.run_with_clock(&extent, clock).await
    }

    /// Run every stage for an already resolved extent.
    pub async fn run_extent(
        &self,
        extent: &Extent,
    ) -> std::result::Result<PipelineOutput, PipelineFailure> {
        self.run_with_clock(extent, StageClock::start()).await
    }

    async fn run_with_clock(
        &self,
        extent: &Extent,
        mut clock: StageClock,
    ) -> std::result::Result<PipelineOutput, PipelineFailure> {
        extent
            .require_projected()
            .map_err(|e| PipelineFailure::new(None, e.into()))?;
        let elapsed_ms = clock.finish(Stage::ExtentResolution);
        info!(
            stage = %Stage::ExtentResolution,
            bbox = %extent.bbox.to_rest_string(),
            wkid = extent.srs.wkid,
            elapsed_ms,
            "Resolved extent"
        );

        let run_id = new_run_id();
        let mut workspace = self
            .environment
            .acquire(&run_id)
            .map_err(|e| PipelineFailure::new(None, e))?;
        let workspace_path = workspace.path().to_path_buf();

        match self.execute(extent, &mut workspace, &mut clock).await {
            Ok((table, scene, path)) => Ok(PipelineOutput {
                run_id,
                path,
                workspace: workspace_path,
                scene,
                table,
                srs: extent.srs,
                timings: clock.timings,
            }),
            Err(err) => {
                error!(
                    run_id = %run_id,
                    stage = ?err.stage(),
                    error = %err,
                    workspace = %workspace_path.display(),
                    "Pipeline run failed"
                );
                Err(PipelineFailure::new(Some(workspace_path), err))
            }
        }
    }

    async fn execute(
        &self,
        extent: &Extent,
        workspace: &mut RunWorkspace,
        clock: &mut StageClock,
    ) -> Result<(geoprocessing::FeatureTable, sources::SceneMetadata, std::path::PathBuf)> {
        let config = &self.config;

        // 2. tessellation
        let owned_extent = *extent;
        let cell_area = config.cell_area;
        let tessellation = blocking(Stage::Tessellation, move || {
            generate_tessellation(&owned_extent, cell_area).stage(Stage::Tessellation)
        })
        .await?;
        let tessellation = Arc::new(tessellation);
        let hexagons = tessellation
            .to_table(TESSELLATION_TABLE)
            .stage(Stage::Tessellation)?;
        let elapsed_ms = clock.finish(Stage::Tessellation);
        info!(stage = %Stage::Tessellation, bins = hexagons.len(), cell_area, elapsed_ms, "Generated tessellation");

        // 3. population join
        let population = self
            .population
            .fetch_population(extent)
            .await
            .stage(Stage::PopulationJoin)?;
        if !population.has_field(&config.population_field) {
            warn!(
                field = %config.population_field,
                features = population.len(),
                "Population source lacks the population field"
            );
        }
        let features = population.len();
        let bins = blocking(Stage::PopulationJoin, move || {
            largest_overlap_join(&hexagons, &population, BINS_TABLE).stage(Stage::PopulationJoin)
        })
        .await?;
        let matched = bins
            .column(JOIN_COUNT_FIELD)
            .stage(Stage::PopulationJoin)?
            .iter()
            .filter(|v| **v == Some(1.0))
            .count();
        if matched < bins.len() {
            warn!(unmatched = bins.len() - matched, "Bins without population overlap");
        }
        let elapsed_ms = clock.finish(Stage::PopulationJoin);
        info!(stage = %Stage::PopulationJoin, features, matched, elapsed_ms, "Joined population");

        // 4. image selection
        let filter = SceneFilter::from_config(config);
        let scene = select_scene(self.catalog.as_ref(), extent, &filter).await?;
        let elapsed_ms = clock.finish(Stage::ImageSelection);
        info!(stage = %Stage::ImageSelection, scene_id = scene.object_id, elapsed_ms, "Selected imagery");

        // 5. raster extraction
        let writer = config
            .geoprocessing
            .write_raster_artifacts
            .then(|| ZarrRasterWriter::new(config.geoprocessing.clone()));
        let settings = ExtractionSettings {
            temperature_template: config.temperature_template.clone(),
            temperature_cell_size: config.temperature_cell_size,
            temperature_pixel_type: config.temperature_pixel_type,
            land_cover_cell_size: config.land_cover_cell_size,
        };
        let extracted = extract_rasters(
            self.catalog.as_ref(),
            self.land_cover.as_ref(),
            &scene,
            extent,
            &settings,
            writer.as_ref().map(|w| (w, &*workspace)),
        )
        .await?;
        let elapsed_ms = clock.finish(Stage::RasterExtraction);
        info!(
            stage = %Stage::RasterExtraction,
            pixels = extracted.temperature.data.len() + extracted.land_cover.data.len(),
            artifacts = extracted.artifacts.len(),
            elapsed_ms,
            "Extracted rasters"
        );

        // 6. reclassification
        let tree_remap = RemapTable::binary_mask(config.tree_class, &config.land_cover_classes);
        let built_remap = RemapTable::binary_mask(config.built_up_class, &config.land_cover_classes);
        let land_cover = extracted.land_cover;
        let (tree_mask, built_mask) = blocking(Stage::Reclassification, move || {
            Ok(reclassify_pair(&land_cover, &tree_remap, &built_remap))
        })
        .await?;
        if let Some(writer) = &writer {
            persist_raster(writer, workspace, &tree_mask, TREE_MASK_ARTIFACT, Stage::Reclassification)?;
            persist_raster(writer, workspace, &built_mask, BUILT_UP_MASK_ARTIFACT, Stage::Reclassification)?;
        }
        let elapsed_ms = clock.finish(Stage::Reclassification);
        info!(
            stage = %Stage::Reclassification,
            tree_class = config.tree_class,
            built_up_class = config.built_up_class,
            pixels = tree_mask.data_count(),
            elapsed_ms,
            "Reclassified land cover"
        );

        // 7. zonal aggregation
        let temperature = extracted.temperature;
        let zones = Arc::clone(&tessellation);
        let zonal = blocking(Stage::ZonalAggregation, move || {
            let stage = Stage::ZonalAggregation;
            Ok(ZonalTables {
                temperature: zonal_statistics_as_table(
                    zones.as_ref(),
                    &temperature,
                    ZonalStatistic::Maximum,
                    "surf_temp_max",
                )
                .stage(stage)?,
                tree_canopy: zonal_statistics_as_table(
                    zones.as_ref(),
                    &tree_mask,
                    ZonalStatistic::Sum,
                    "tree_canopy_count",
                )
                .stage(stage)?,
                built_up: zonal_statistics_as_table(
                    zones.as_ref(),
                    &built_mask,
                    ZonalStatistic::Sum,
                    "built_up_area_count",
                )
                .stage(stage)?,
            })
        })
        .await?;
        let elapsed_ms = clock.finish(Stage::ZonalAggregation);
        info!(
            stage = %Stage::ZonalAggregation,
            temperature_zones = zonal.temperature.len(),
            land_cover_zones = zonal.tree_canopy.len(),
            elapsed_ms,
            "Aggregated zonal statistics"
        );

        // 8. index composition
        let mut bins = bins;
        let composer = IndexComposer::new(config.population_field.clone(), config.normalization);
        composer.compose(&mut bins, zonal)?;

        let path = workspace
            .artifact_path(OUTPUT_FILE)
            .stage(Stage::IndexComposition)?;
        write_geojson(&bins, &extent.srs, &path).stage(Stage::IndexComposition)?;
        workspace.retain(path.clone());
        let elapsed_ms = clock.finish(Stage::IndexComposition);
        info!(
            stage = %Stage::IndexComposition,
            bins = bins.len(),
            output = %path.display(),
            elapsed_ms,
            "Wrote heat risk index"
        );

        Ok((bins, scene, path))
    }
}
