//! Analysis extent: a bounding box bound to a spatial reference.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bbox::BoundingBox;
use crate::error::{ExtentError, ExtentResult};
use crate::srs::SpatialReference;

/// A validated analysis extent.
///
/// Invariant: `bbox.is_valid()` holds and `srs` is a known authority code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub bbox: BoundingBox,
    pub srs: SpatialReference,
}

impl Extent {
    /// Normalize a raw bounding box and an optional spatial reference.
    ///
    /// Fails fast when the reference is absent or the bounds are degenerate.
    pub fn resolve(bbox: BoundingBox, srs: Option<SpatialReference>) -> ExtentResult<Self> {
        let srs = srs.ok_or(ExtentError::MissingSpatialReference)?;
        // the wkid field is public, so a hand-built reference is re-checked
        let srs = SpatialReference::new(srs.wkid)?;

        if !bbox.is_valid() {
            return Err(ExtentError::InvalidBounds(format!(
                "xmin={} ymin={} xmax={} ymax={}",
                bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
            )));
        }

        Ok(Self { bbox, srs })
    }

    /// Build an extent from raw corner values and a wkid.
    pub fn from_bounds(
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
        wkid: Option<u32>,
    ) -> ExtentResult<Self> {
        let srs = wkid.map(SpatialReference::new).transpose()?;
        Self::resolve(BoundingBox::new(x_min, y_min, x_max, y_max), srs)
    }

    /// Parse an Esri JSON envelope:
    /// `{"xmin":..,"ymin":..,"xmax":..,"ymax":..,"spatialReference":{"wkid":..}}`.
    pub fn from_envelope_json(envelope: &Value) -> ExtentResult<Self> {
        let srs_value = envelope
            .get("spatialReference")
            .ok_or(ExtentError::MissingSpatialReference)?;

        // Prefer latestWkid, the id ArcGIS keeps current for deprecated codes.
        let wkid = srs_value
            .get("latestWkid")
            .or_else(|| srs_value.get("wkid"))
            .ok_or(ExtentError::MissingWkid)?
            .as_u64()
            .ok_or_else(|| ExtentError::InvalidWkid(srs_value.to_string()))?;
        let wkid =
            u32::try_from(wkid).map_err(|_| ExtentError::InvalidWkid(wkid.to_string()))?;

        let coord = |key: &'static str| -> ExtentResult<f64> {
            envelope
                .get(key)
                .and_then(Value::as_f64)
                .ok_or(ExtentError::MissingField(key))
        };

        Self::from_bounds(
            coord("xmin")?,
            coord("ymin")?,
            coord("xmax")?,
            coord("ymax")?,
            Some(wkid),
        )
    }

    /// Parse an Esri JSON envelope from text.
    pub fn from_envelope_str(json: &str) -> ExtentResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_envelope_json(&value)
    }

    /// Serialize back to an Esri JSON envelope.
    pub fn to_envelope_json(&self) -> Value {
        serde_json::json!({
            "xmin": self.bbox.min_x,
            "ymin": self.bbox.min_y,
            "xmax": self.bbox.max_x,
            "ymax": self.bbox.max_y,
            "spatialReference": { "wkid": self.srs.wkid },
        })
    }

    /// Area-based operations need linear units.
    pub fn require_projected(&self) -> ExtentResult<()> {
        SpatialReference::new(self.srs.wkid)?;
        if self.srs.is_geographic() {
            return Err(ExtentError::InvalidWkid(format!(
                "{} is geographic; area-based cell sizes need a projected reference",
                self.srs
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    pub fn height(&self) -> f64 {
        self.bbox.height()
    }
}
