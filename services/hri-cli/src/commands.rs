//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use geoprocessing::CleanupPolicy;
use hri_common::{BoundingBox, ClassBreaksRenderer, Extent, SpatialReference};
use hri_pipeline::{HeatRiskPipeline, PipelineConfig};
use tracing::{error, info};

use crate::{RendererArgs, RunArgs};

/// Decimal places used when grouping high-risk bins.
const GROUP_PRECISION: u32 = 0;

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("failed to load configuration")
}

fn read_extent(args: &RunArgs) -> Result<Extent> {
    if let Some(path) = &args.envelope {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read envelope {}", path.display()))?;
        return Extent::from_envelope_str(&json)
            .with_context(|| format!("invalid envelope {}", path.display()));
    }

    let raw = args.bbox.as_deref().context("either --bbox or --envelope is required")?;
    let bbox = BoundingBox::parse(raw).with_context(|| format!("invalid --bbox '{}'", raw))?;
    let srs = args.wkid.map(SpatialReference::new).transpose()?;
    Extent::resolve(bbox, srs).context("invalid extent")
}

pub async fn run(config_path: Option<&Path>, args: RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.workspace {
        config.workspace_dir = Some(dir.clone());
    }
    if args.retain_workspace {
        config.cleanup = CleanupPolicy::RetainAll;
    }

    let extent = read_extent(&args)?;
    info!(
        bbox = %extent.bbox.to_rest_string(),
        wkid = extent.srs.wkid,
        cell_area = config.cell_area,
        "Starting heat risk index run"
    );

    let pipeline = HeatRiskPipeline::with_http_sources(config)?;
    let output = match pipeline.run_extent(&extent).await {
        Ok(output) => output,
        Err(failure) => {
            if let Some(workspace) = &failure.workspace {
                error!(workspace = %workspace.display(), "Run workspace of the failed run");
            }
            return Err(failure.into());
        }
    };

    if let Some(threshold) = args.high_risk {
        for group in output
            .group_by_risk(GROUP_PRECISION)
            .into_iter()
            .filter(|g| g.hri > threshold)
        {
            info!(name = %group.name, hri = group.hri, bins = group.bins.len(), "High risk group");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output.summary())?);
    } else {
        println!("{}", output.path.display());
    }
    Ok(())
}

pub fn renderer(config_path: Option<&Path>, args: RendererArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let renderer = ClassBreaksRenderer::for_hri_ramp(
        config.normalization.min_value,
        config.normalization.max_value,
        args.classes,
        args.low_color,
        args.high_color,
    );
    println!("{}", serde_json::to_string_pretty(&renderer.to_esri_json())?);
    Ok(())
}
