//! Raster extraction: pull the selected scene and the land cover for an
//! extent and store them as run artifacts.

use geoprocessing::{PixelType, Raster, RasterArtifact, RunWorkspace, ZarrRasterWriter};
use hri_common::Extent;
use sources::{ImageryCatalog, RasterSource, SceneMetadata};
use tracing::{debug, info, instrument};

use crate::error::{Result, Stage, StageContext};

/// Artifact name of the extracted surface temperature.
pub const TEMPERATURE_ARTIFACT: &str = "landsat_surf_temp";

/// Artifact name of the extracted land cover.
pub const LAND_COVER_ARTIFACT: &str = "land_cover";

/// Extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub temperature_template: String,
    pub temperature_cell_size: f64,
    pub temperature_pixel_type: PixelType,
    pub land_cover_cell_size: f64,
}

/// Rasters clipped to the run extent.
#[derive(Debug, Clone)]
pub struct ExtractedRasters {
    pub temperature: Raster,
    pub land_cover: Raster,
    /// Artifacts written to the workspace; empty when artifact writing is off.
    pub artifacts: Vec<RasterArtifact>,
}

/// Store `raster` as a named Zarr artifact in the run workspace.
pub fn persist_raster(
    writer: &ZarrRasterWriter,
    workspace: &RunWorkspace,
    raster: &Raster,
    name: &str,
    stage: Stage,
) -> Result<RasterArtifact> {
    let path = workspace.artifact_path(name).stage(stage)?;
    let artifact = writer.write(raster, &path, name).stage(stage)?;
    debug!(
        name = %name,
        path = %artifact.path.display(),
        bytes = artifact.bytes_written,
        "Wrote raster artifact"
    );
    Ok(artifact)
}

/// Export the selected scene and the land cover over `extent`.
///
/// The temperature raster is converted to the configured pixel type; land
/// cover is stored as 8-bit unsigned class codes.
#[instrument(skip_all, fields(scene_id = scene.object_id))]
pub async fn extract_rasters(
    catalog: &dyn ImageryCatalog,
    land_cover: &dyn RasterSource,
    scene: &SceneMetadata,
    extent: &Extent,
    settings: &ExtractionSettings,
    writer: Option<(&ZarrRasterWriter, &RunWorkspace)>,
) -> Result<ExtractedRasters> {
    let temperature = catalog
        .export_scene(
            scene.object_id,
            extent,
            settings.temperature_cell_size,
            &settings.temperature_template,
        )
        .await
        .stage(Stage::RasterExtraction)?
        .convert_to(settings.temperature_pixel_type);

    let land_cover = land_cover
        .fetch_raster(extent, settings.land_cover_cell_size)
        .await
        .stage(Stage::RasterExtraction)?
        .convert_to(PixelType::U8);

    info!(
        temperature_cells = temperature.data_count(),
        land_cover_cells = land_cover.data_count(),
        pixel_type = settings.temperature_pixel_type.as_str(),
        "Extracted rasters"
    );

    let mut artifacts = Vec::new();
    if let Some((writer, workspace)) = writer {
        artifacts.push(persist_raster(
            writer,
            workspace,
            &temperature,
            TEMPERATURE_ARTIFACT,
            Stage::RasterExtraction,
        )?);
        artifacts.push(persist_raster(
            writer,
            workspace,
            &land_cover,
            LAND_COVER_ARTIFACT,
            Stage::RasterExtraction,
        )?);
    }

    Ok(ExtractedRasters {
        temperature,
        land_cover,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geoprocessing::{
        generate_tessellation, zonal_statistics_as_table, CleanupPolicy, GeoprocessingConfig,
        ZonalStatistic,
    };
    use hri_common::BoundingBox;
    use sources::{StaticCatalog, StaticRaster, TEMPERATURE_NO_DATA};

    fn settings() -> ExtractionSettings {
        ExtractionSettings {
            temperature_template: "Band 10 Surface Temperature in Celsius".to_string(),
            temperature_cell_size: 30.0,
            temperature_pixel_type: PixelType::S8,
            land_cover_cell_size: 10.0,
        }
    }

    fn scene() -> SceneMetadata {
        SceneMetadata {
            object_id: 11,
            name: "LC09".to_string(),
            acquisition_date: Utc.with_ymd_and_hms(2023, 8, 15, 10, 0, 0).unwrap(),
            cloud_cover: 0.02,
            best: None,
        }
    }

    #[tokio::test]
    async fn test_extract_quantizes_and_writes_artifacts() {
        let bbox = BoundingBox::new(0.0, 0.0, 300.0, 300.0);
        let catalog = StaticCatalog::new(vec![scene()])
            .with_raster(11, Raster::filled(10, 10, bbox, 31.6).unwrap());
        let land_cover = StaticRaster::new(Raster::filled(30, 30, bbox, 50.0).unwrap().with_nodata(Some(0.0)));
        let extent = Extent::from_bounds(0.0, 0.0, 300.0, 300.0, Some(32632)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let workspace = RunWorkspace::create(dir.path(), "extract", CleanupPolicy::RetainAll, false).unwrap();
        let writer = ZarrRasterWriter::new(GeoprocessingConfig::default());

        let extracted = extract_rasters(
            &catalog,
            &land_cover,
            &scene(),
            &extent,
            &settings(),
            Some((&writer, &workspace)),
        )
        .await
        .unwrap();

        assert_eq!(extracted.temperature.pixel_type, PixelType::S8);
        assert!(extracted.temperature.data.iter().all(|v| *v == 32.0));
        assert_eq!(extracted.land_cover.pixel_type, PixelType::U8);
        assert_eq!(extracted.artifacts.len(), 2);
        assert!(workspace.path().join(TEMPERATURE_ARTIFACT).exists());

        let reread = ZarrRasterWriter::read(&workspace.path().join(LAND_COVER_ARTIFACT)).unwrap();
        assert_eq!(reread.nodata, Some(0.0));
    }

    #[tokio::test]
    async fn test_scene_fill_stays_out_of_zonal_statistics() {
        let bbox = BoundingBox::new(0.0, 0.0, 300.0, 300.0);
        // the scene footprint ends halfway; the service fills the east
        let export = Raster::new(
            10,
            10,
            bbox,
            (0..100)
                .map(|i| if i % 10 < 5 { 30.2 + (i % 10) as f32 } else { TEMPERATURE_NO_DATA })
                .collect(),
        )
        .unwrap()
        .with_nodata(Some(TEMPERATURE_NO_DATA));
        let catalog = StaticCatalog::new(vec![scene()]).with_raster(11, export);
        let land_cover = StaticRaster::new(Raster::filled(30, 30, bbox, 50.0).unwrap());
        let extent = Extent::from_bounds(0.0, 0.0, 300.0, 300.0, Some(32632)).unwrap();

        let extracted = extract_rasters(&catalog, &land_cover, &scene(), &extent, &settings(), None)
            .await
            .unwrap();
        assert_eq!(extracted.temperature.nodata, Some(TEMPERATURE_NO_DATA));
        assert_eq!(extracted.temperature.data_count(), 50);

        let zones = generate_tessellation(&extent, 10_000.0).unwrap();
        let table = zonal_statistics_as_table(
            &zones,
            &extracted.temperature,
            ZonalStatistic::Maximum,
            "surf_temp_max",
        )
        .unwrap();

        let counted: f64 = table.column("COUNT").unwrap().iter().flatten().sum();
        assert_eq!(counted, 50.0);
        for max in table.column("MAX").unwrap().iter().flatten() {
            assert!((30.0..=34.0).contains(max), "MAX {} includes fill", max);
        }
    }

    #[tokio::test]
    async fn test_missing_scene_is_upstream_error() {
        let catalog = StaticCatalog::new(vec![scene()]);
        let land_cover = StaticRaster::new(
            Raster::filled(3, 3, BoundingBox::new(0.0, 0.0, 30.0, 30.0), 10.0).unwrap(),
        );
        let extent = Extent::from_bounds(0.0, 0.0, 30.0, 30.0, Some(32632)).unwrap();

        let err = extract_rasters(&catalog, &land_cover, &scene(), &extent, &settings(), None)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::RasterExtraction));
    }
}
