//! Core raster types.

use hri_common::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::error::{GeoprocessingError, Result};

/// Storage pixel format of a raster artifact.
///
/// Values are always held as `f32` in memory; the pixel type decides how
/// they are rounded and clamped when a raster is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelType {
    /// 8-bit signed integer, [-128, 127].
    #[default]
    S8,
    /// 8-bit unsigned integer, [0, 255].
    U8,
    /// 16-bit signed integer.
    S16,
    /// 32-bit float, stored unchanged.
    F32,
}

impl PixelType {
    /// Parse from string; accepts both short names and Esri pixel type names.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "S8" | "8_BIT_SIGNED" => Some(Self::S8),
            "U8" | "8_BIT_UNSIGNED" => Some(Self::U8),
            "S16" | "16_BIT_SIGNED" => Some(Self::S16),
            "F32" | "32_BIT_FLOAT" => Some(Self::F32),
            _ => None,
        }
    }

    /// Esri pixel type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S8 => "8_BIT_SIGNED",
            Self::U8 => "8_BIT_UNSIGNED",
            Self::S16 => "16_BIT_SIGNED",
            Self::F32 => "32_BIT_FLOAT",
        }
    }

    /// Representable value range, `None` for floating point.
    pub fn range(&self) -> Option<(f32, f32)> {
        match self {
            Self::S8 => Some((i8::MIN as f32, i8::MAX as f32)),
            Self::U8 => Some((u8::MIN as f32, u8::MAX as f32)),
            Self::S16 => Some((i16::MIN as f32, i16::MAX as f32)),
            Self::F32 => None,
        }
    }

    /// Quantize one value. NaN passes through untouched.
    pub fn quantize(&self, value: f32) -> f32 {
        match self.range() {
            Some((lo, hi)) if value.is_finite() => value.round().clamp(lo, hi),
            Some((lo, hi)) if value.is_infinite() => value.clamp(lo, hi),
            _ => value,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single-band north-up raster.
///
/// Data is row-major with row 0 at the top (`bbox.max_y`). Cells equal to
/// `nodata`, or NaN, are no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub bbox: BoundingBox,
    pub nodata: Option<f32>,
    pub pixel_type: PixelType,
    pub data: Vec<f32>,
}

impl Raster {
    /// Create a float raster, checking the buffer against the shape.
    pub fn new(width: usize, height: usize, bbox: BoundingBox, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GeoprocessingError::InvalidRaster(format!(
                "empty shape {}x{}",
                width, height
            )));
        }
        if data.len() != width * height {
            return Err(GeoprocessingError::InvalidRaster(format!(
                "buffer has {} cells, shape {}x{} needs {}",
                data.len(),
                width,
                height,
                width * height
            )));
        }
        if !bbox.is_valid() {
            return Err(GeoprocessingError::InvalidRaster(format!(
                "invalid bounds {:?}",
                bbox
            )));
        }

        Ok(Self {
            width,
            height,
            bbox,
            nodata: None,
            pixel_type: PixelType::F32,
            data,
        })
    }

    /// Raster of a constant value.
    pub fn filled(width: usize, height: usize, bbox: BoundingBox, value: f32) -> Result<Self> {
        Self::new(width, height, bbox, vec![value; width * height])
    }

    pub fn with_nodata(mut self, nodata: Option<f32>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn cell_width(&self) -> f64 {
        self.bbox.width() / self.width as f64
    }

    pub fn cell_height(&self) -> f64 {
        self.bbox.height() / self.height as f64
    }

    /// Ground area of one cell in squared map units.
    pub fn cell_area(&self) -> f64 {
        self.cell_width() * self.cell_height()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.height && col < self.width {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }

    /// Whether a cell value carries data.
    pub fn is_data(&self, value: f32) -> bool {
        !value.is_nan() && self.nodata != Some(value)
    }

    /// Map coordinates of the centre of a cell.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.bbox.min_x + (col as f64 + 0.5) * self.cell_width();
        let y = self.bbox.max_y - (row as f64 + 0.5) * self.cell_height();
        (x, y)
    }

    /// Number of data cells.
    pub fn data_count(&self) -> usize {
        self.data.iter().filter(|v| self.is_data(**v)).count()
    }

    /// Apply a function to every data cell, keeping no-data cells as they are.
    pub fn map_data<F>(&self, f: F) -> Raster
    where
        F: Fn(f32) -> f32,
    {
        let data = self
            .data
            .iter()
            .map(|&v| if self.is_data(v) { f(v) } else { v })
            .collect();

        Raster {
            width: self.width,
            height: self.height,
            bbox: self.bbox,
            nodata: self.nodata,
            pixel_type: self.pixel_type,
            data,
        }
    }

    /// Copy the raster into another pixel format, rounding and clamping
    /// integer targets.
    pub fn convert_to(&self, pixel_type: PixelType) -> Raster {
        let mut out = self.map_data(|v| pixel_type.quantize(v));
        out.pixel_type = pixel_type;
        out
    }

    /// Cut out the cells intersecting `region`, snapped outward to the
    /// pixel grid.
    pub fn clip(&self, region: &BoundingBox) -> Result<Raster> {
        let overlap = self.bbox.intersection(region).ok_or_else(|| {
            GeoprocessingError::out_of_bounds(format!("{:?}", region), format!("{:?}", self.bbox))
        })?;

        let cw = self.cell_width();
        let ch = self.cell_height();

        let col0 = ((overlap.min_x - self.bbox.min_x) / cw).floor().max(0.0) as usize;
        let col1 = (((overlap.max_x - self.bbox.min_x) / cw).ceil() as usize).min(self.width);
        let row0 = ((self.bbox.max_y - overlap.max_y) / ch).floor().max(0.0) as usize;
        let row1 = (((self.bbox.max_y - overlap.min_y) / ch).ceil() as usize).min(self.height);

        if col1 <= col0 || row1 <= row0 {
            return Err(GeoprocessingError::out_of_bounds(
                format!("{:?}", region),
                format!("{:?}", self.bbox),
            ));
        }

        let width = col1 - col0;
        let height = row1 - row0;
        let mut data = Vec::with_capacity(width * height);
        for row in row0..row1 {
            let start = row * self.width;
            data.extend_from_slice(&self.data[start + col0..start + col1]);
        }

        let bbox = BoundingBox::new(
            self.bbox.min_x + col0 as f64 * cw,
            self.bbox.max_y - row1 as f64 * ch,
            self.bbox.min_x + col1 as f64 * cw,
            self.bbox.max_y - row0 as f64 * ch,
        );

        Ok(Raster {
            width,
            height,
            bbox,
            nodata: self.nodata,
            pixel_type: self.pixel_type,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Raster {
        let data = (0..width * height).map(|i| i as f32).collect();
        Raster::new(
            width,
            height,
            BoundingBox::new(0.0, 0.0, width as f64 * 10.0, height as f64 * 10.0),
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_buffer() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(Raster::new(2, 2, bbox, vec![0.0; 3]).is_err());
        assert!(Raster::new(0, 2, bbox, Vec::new()).is_err());
    }

    #[test]
    fn test_cell_geometry() {
        let r = ramp(4, 2);
        assert_eq!(r.cell_width(), 10.0);
        assert_eq!(r.cell_area(), 100.0);
        assert_eq!(r.cell_center(0, 0), (5.0, 15.0));
        assert_eq!(r.cell_center(1, 3), (35.0, 5.0));
        assert_eq!(r.get(1, 3), Some(7.0));
        assert_eq!(r.get(2, 0), None);
    }

    #[test]
    fn test_pixel_type_quantize() {
        assert_eq!(PixelType::S8.quantize(31.6), 32.0);
        assert_eq!(PixelType::S8.quantize(200.0), 127.0);
        assert_eq!(PixelType::S8.quantize(-300.0), -128.0);
        assert_eq!(PixelType::U8.quantize(-3.0), 0.0);
        assert_eq!(PixelType::F32.quantize(31.6), 31.6);
        assert!(PixelType::S8.quantize(f32::NAN).is_nan());
        assert_eq!(PixelType::from_str("8_bit_signed"), Some(PixelType::S8));
        assert_eq!(PixelType::from_str("bogus"), None);
    }

    #[test]
    fn test_convert_keeps_nodata() {
        let bbox = BoundingBox::new(0.0, 0.0, 20.0, 10.0);
        let r = Raster::new(2, 1, bbox, vec![25.4, -9999.0])
            .unwrap()
            .with_nodata(Some(-9999.0));
        let s8 = r.convert_to(PixelType::S8);
        assert_eq!(s8.data, vec![25.0, -9999.0]);
        assert_eq!(s8.pixel_type, PixelType::S8);
        assert_eq!(s8.data_count(), 1);
    }

    #[test]
    fn test_clip_snaps_to_grid() {
        let r = ramp(4, 4);
        let clipped = r.clip(&BoundingBox::new(12.0, 12.0, 28.0, 25.0)).unwrap();
        assert_eq!((clipped.width, clipped.height), (2, 2));
        assert_eq!(clipped.bbox, BoundingBox::new(10.0, 10.0, 30.0, 30.0));
        // rows 1..3, cols 1..3 of the 4x4 ramp
        assert_eq!(clipped.data, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_clip_outside_fails() {
        let r = ramp(2, 2);
        assert!(matches!(
            r.clip(&BoundingBox::new(100.0, 100.0, 200.0, 200.0)),
            Err(GeoprocessingError::OutOfBounds { .. })
        ));
    }
}
