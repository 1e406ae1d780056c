//! ImageServer `exportImage` requests.

use futures::stream::{self, StreamExt, TryStreamExt};
use geoprocessing::Raster;
use hri_common::{BoundingBox, Extent};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::arcgis::{decode_tiff, export_grid, get_bytes, tile_layout};
use crate::error::{Result, SourceError};

/// Parallel tile requests per export.
const TILE_CONCURRENCY: usize = 4;

/// Parameters of one raster export.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    /// Ground size of one square output cell in extent units.
    pub cell_size: f64,
    /// Mosaic rule JSON, e.g. a lock on one raster id.
    pub mosaic_rule: Option<Value>,
    /// Rendering rule JSON, e.g. a server-side processing template.
    pub rendering_rule: Option<Value>,
    /// Value the service writes into cells without data.
    pub no_data: Option<f32>,
}

/// Mosaic rule restricting an export to a single catalog item.
pub fn lock_raster_rule(object_id: i64) -> Value {
    serde_json::json!({
        "mosaicMethod": "esriMosaicLockRaster",
        "lockRasterIds": [object_id],
        "ascending": true,
        "mosaicOperation": "MT_FIRST",
    })
}

/// Rendering rule applying a named raster function template.
pub fn raster_function_rule(template: &str) -> Value {
    serde_json::json!({ "rasterFunction": template })
}

pub(crate) fn tile_params(
    request: &ExportRequest,
    bbox: &BoundingBox,
    wkid: u32,
    width: usize,
    height: usize,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("bbox", bbox.to_rest_string()),
        ("bboxSR", wkid.to_string()),
        ("imageSR", wkid.to_string()),
        ("size", format!("{},{}", width, height)),
        ("format", "tiff".to_string()),
        ("pixelType", "F32".to_string()),
        ("interpolation", "RSP_NearestNeighbor".to_string()),
        ("f", "image".to_string()),
    ];
    if let Some(no_data) = request.no_data {
        params.push(("noData", no_data.to_string()));
    }
    if let Some(rule) = &request.mosaic_rule {
        params.push(("mosaicRule", rule.to_string()));
    }
    if let Some(rule) = &request.rendering_rule {
        params.push(("renderingRule", rule.to_string()));
    }
    params
}

/// Export `extent` from the ImageServer at `base_url` as one raster.
///
/// Grids wider or taller than `max_image_size` are requested tile by tile
/// and mosaicked locally.
#[instrument(skip(client, request), fields(cell_size = request.cell_size))]
pub async fn export_image(
    client: &Client,
    base_url: &str,
    extent: &Extent,
    request: &ExportRequest,
    max_image_size: usize,
) -> Result<Raster> {
    let (width, height, bbox) = export_grid(extent, request.cell_size)?;
    let url = format!("{}/exportImage", base_url.trim_end_matches('/'));
    let wkid = extent.srs.wkid;
    let cs = request.cell_size;

    let tiles = tile_layout(width, height, max_image_size);
    debug!(width, height, tiles = tiles.len(), url = %url, "Exporting image");

    let decoded: Vec<((usize, usize, usize, usize), Raster)> = stream::iter(tiles)
        .map(|tile| {
            let url = url.clone();
            async move {
                let (col, row, tw, th) = tile;
                let tile_bbox = BoundingBox::new(
                    bbox.min_x + col as f64 * cs,
                    bbox.max_y - (row + th) as f64 * cs,
                    bbox.min_x + (col + tw) as f64 * cs,
                    bbox.max_y - row as f64 * cs,
                );
                let params = tile_params(request, &tile_bbox, wkid, tw, th);
                let bytes = get_bytes(client, &url, &params).await?;
                let raster = decode_tiff(&bytes, tile_bbox)?;
                if raster.width != tw || raster.height != th {
                    return Err(SourceError::InvalidResponse(format!(
                        "requested {}x{} tile, got {}x{}",
                        tw, th, raster.width, raster.height
                    )));
                }
                Ok::<_, SourceError>((tile, raster))
            }
        })
        .buffered(TILE_CONCURRENCY)
        .try_collect()
        .await?;

    let mut data = vec![f32::NAN; width * height];
    for ((col, row, tw, th), tile) in decoded {
        for r in 0..th {
            let dst = (row + r) * width + col;
            data[dst..dst + tw].copy_from_slice(&tile.data[r * tw..(r + 1) * tw]);
        }
    }

    let raster = Raster::new(width, height, bbox, data)?.with_nodata(request.no_data);
    info!(width, height, url = %url, "Exported image");
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_raster_rule() {
        let rule = lock_raster_rule(4711);
        assert_eq!(rule["mosaicMethod"], "esriMosaicLockRaster");
        assert_eq!(rule["lockRasterIds"][0], 4711);
    }

    #[test]
    fn test_tile_params() {
        let request = ExportRequest {
            cell_size: 30.0,
            mosaic_rule: Some(lock_raster_rule(1)),
            rendering_rule: Some(raster_function_rule("Band 10 Surface Temperature in Celsius")),
            no_data: Some(-128.0),
        };
        let params = tile_params(&request, &BoundingBox::new(0.0, 0.0, 300.0, 150.0), 32632, 10, 5);
        let get = |k: &str| params.iter().find(|(key, _)| *key == k).map(|(_, v)| v.clone());

        assert_eq!(get("size").as_deref(), Some("10,5"));
        assert_eq!(get("bbox").as_deref(), Some("0,0,300,150"));
        assert_eq!(get("noData").as_deref(), Some("-128"));
        assert!(get("renderingRule").unwrap().contains("Band 10 Surface Temperature in Celsius"));
        assert!(get("mosaicRule").unwrap().contains("esriMosaicLockRaster"));
    }
}
