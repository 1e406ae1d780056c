//! Shared plumbing for ArcGIS REST services.

use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use hri_common::{BoundingBox, Extent};
use geoprocessing::Raster;
use reqwest::Client;
use serde_json::{json, Value};
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};

/// HTTP client with the configured timeouts.
pub fn build_client(config: &SourcesConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .map_err(|e| SourceError::Config(e.to_string()))
}

/// Fail on an ArcGIS `{"error": {"code": .., "message": ..}}` document.
pub fn check_service_error(body: &Value) -> Result<()> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return Err(SourceError::Service { code, message });
    }
    Ok(())
}

/// GET a JSON resource, mapping HTTP and service errors.
pub async fn get_json(client: &Client, url: &str, params: &[(&str, String)]) -> Result<Value> {
    debug!(url = %url, "Requesting JSON");

    let response = client.get(url).query(params).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body: Value = response.json().await?;
    check_service_error(&body)?;
    Ok(body)
}

/// GET a binary resource.
pub async fn get_bytes(client: &Client, url: &str, params: &[(&str, String)]) -> Result<Bytes> {
    debug!(url = %url, "Requesting binary");

    let response = client.get(url).query(params).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.contains("json"));
    let bytes = response.bytes().await?;

    // exportImage answers errors with a JSON document and a 200
    if is_json {
        let body: Value = serde_json::from_slice(&bytes)?;
        check_service_error(&body)?;
        return Err(SourceError::InvalidResponse(
            "expected image, got JSON".to_string(),
        ));
    }

    Ok(bytes)
}

/// Esri JSON envelope for `geometry` parameters.
pub fn envelope_param(bbox: &BoundingBox, wkid: u32) -> String {
    json!({
        "xmin": bbox.min_x,
        "ymin": bbox.min_y,
        "xmax": bbox.max_x,
        "ymax": bbox.max_y,
        "spatialReference": { "wkid": wkid },
    })
    .to_string()
}

/// Common spatial-filter parameters for `query` operations.
pub fn spatial_query_params(extent: &Extent) -> Vec<(&'static str, String)> {
    vec![
        ("geometry", envelope_param(&extent.bbox, extent.srs.wkid)),
        ("geometryType", "esriGeometryEnvelope".to_string()),
        ("inSR", extent.srs.wkid.to_string()),
        ("spatialRel", "esriSpatialRelIntersects".to_string()),
        ("f", "json".to_string()),
    ]
}

/// Page through a `query` operation until the service stops reporting
/// `exceededTransferLimit`. Returns every feature object in service order
/// and the layer's object id field name.
pub async fn query_all(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
    page_size: usize,
) -> Result<(Vec<Value>, Option<String>)> {
    let mut features = Vec::new();
    let mut object_id_field = None;
    let mut offset = 0usize;

    loop {
        let mut page_params = params.to_vec();
        page_params.push(("resultOffset", offset.to_string()));
        page_params.push(("resultRecordCount", page_size.to_string()));

        let body = get_json(client, url, &page_params).await?;
        if object_id_field.is_none() {
            object_id_field = body
                .get("objectIdFieldName")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        let (page, next) = query_page(&body, offset)?;
        features.extend(page.iter().cloned());
        let Some(next) = next else {
            break;
        };
        offset = next;
        debug!(offset, "Fetching next page");
    }

    Ok((features, object_id_field))
}

/// Features of one query page and the offset of the next page, if the
/// service reports more. An empty page ends paging even when the limit
/// flag is set.
fn query_page(body: &Value, offset: usize) -> Result<(&[Value], Option<usize>)> {
    let page = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::InvalidResponse("missing 'features' array".to_string()))?;
    let exceeded = body
        .get("exceededTransferLimit")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let next = (exceeded && !page.is_empty()).then(|| offset + page.len());
    Ok((page.as_slice(), next))
}

/// Decode a single-band TIFF into a raster covering `bbox`.
pub fn decode_tiff(bytes: &[u8], bbox: BoundingBox) -> Result<Raster> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;

    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(SourceError::Decode(
                "unsupported 64-bit integer samples".to_string(),
            ))
        }
    };

    let (width, height) = (width as usize, height as usize);
    if data.len() != width * height {
        return Err(SourceError::Decode(format!(
            "expected a single band {}x{} image, got {} samples",
            width,
            height,
            data.len()
        )));
    }

    Ok(Raster::new(width, height, bbox, data)?)
}

/// Pixel grid of an export: square cells of `cell_size` anchored at the
/// extent's upper-left corner, grown outward to whole cells.
pub fn export_grid(extent: &Extent, cell_size: f64) -> Result<(usize, usize, BoundingBox)> {
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(SourceError::Config(format!("invalid cell size {}", cell_size)));
    }
    let b = extent.bbox;
    let width = (b.width() / cell_size).ceil().max(1.0) as usize;
    let height = (b.height() / cell_size).ceil().max(1.0) as usize;
    let bbox = BoundingBox::new(
        b.min_x,
        b.max_y - height as f64 * cell_size,
        b.min_x + width as f64 * cell_size,
        b.max_y,
    );
    Ok((width, height, bbox))
}

/// Split a `width` x `height` grid into tiles no larger than `max` on a side.
///
/// Returns `(col_offset, row_offset, tile_width, tile_height)` tuples in
/// row-major order.
pub fn tile_layout(width: usize, height: usize, max: usize) -> Vec<(usize, usize, usize, usize)> {
    let max = max.max(1);
    let mut tiles = Vec::new();
    let mut row = 0;
    while row < height {
        let th = max.min(height - row);
        let mut col = 0;
        while col < width {
            let tw = max.min(width - col);
            tiles.push((col, row, tw, th));
            col += tw;
        }
        row += th;
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error() {
        let body = json!({"error": {"code": 498, "message": "Invalid token."}});
        match check_service_error(&body) {
            Err(SourceError::Service { code, message }) => {
                assert_eq!(code, 498);
                assert_eq!(message, "Invalid token.");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_service_error(&json!({"features": []})).is_ok());
    }

    #[test]
    fn test_export_grid_snaps_outward() {
        let extent = Extent::from_bounds(0.0, 0.0, 95.0, 41.0, Some(32632)).unwrap();
        let (w, h, bbox) = export_grid(&extent, 10.0).unwrap();
        assert_eq!((w, h), (10, 5));
        assert_eq!(bbox, BoundingBox::new(0.0, -9.0, 100.0, 41.0));
        assert!(export_grid(&extent, 0.0).is_err());
    }

    #[test]
    fn test_tile_layout_covers_grid() {
        let tiles = tile_layout(2500, 900, 1000);
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0], (0, 0, 1000, 900));
        assert_eq!(tiles[2], (2000, 0, 500, 900));
        let cells: usize = tiles.iter().map(|t| t.2 * t.3).sum();
        assert_eq!(cells, 2500 * 900);
    }

    #[test]
    fn test_envelope_param() {
        let value: Value =
            serde_json::from_str(&envelope_param(&BoundingBox::new(1.0, 2.0, 3.0, 4.0), 32632)).unwrap();
        assert_eq!(value["spatialReference"]["wkid"], 32632);
        assert_eq!(value["xmax"], 3.0);
    }

    #[test]
    fn test_decode_tiff_rejects_garbage() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(decode_tiff(b"not a tiff", bbox), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_query_page_continues_while_limit_exceeded() {
        let body = json!({
            "features": [{"attributes": {"OBJECTID": 11}}, {"attributes": {"OBJECTID": 12}}],
            "exceededTransferLimit": true
        });
        let (page, next) = query_page(&body, 10).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["attributes"]["OBJECTID"], 11);
        assert_eq!(next, Some(12));
    }

    #[test]
    fn test_query_page_stops() {
        // last page: flag false or absent
        let body = json!({"features": [{"attributes": {}}], "exceededTransferLimit": false});
        assert_eq!(query_page(&body, 0).unwrap().1, None);
        let body = json!({"features": [{"attributes": {}}]});
        assert_eq!(query_page(&body, 0).unwrap().1, None);

        // a limit flag on an empty page must not loop forever
        let body = json!({"features": [], "exceededTransferLimit": true});
        let (page, next) = query_page(&body, 2000).unwrap();
        assert!(page.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn test_query_page_requires_features() {
        let body = json!({"objectIdFieldName": "OBJECTID"});
        assert!(matches!(query_page(&body, 0), Err(SourceError::InvalidResponse(_))));
    }
}
