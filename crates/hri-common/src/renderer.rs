//! Class-breaks renderer for the heat risk index field.
//!
//! Produces the drawing information clients use to symbolize the output
//! hexagon table, either as our own serde model or as an ArcGIS
//! `classBreaks` renderer JSON document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An RGBA fill color, written as `#RRGGBB` or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Light yellow at the low end of the risk ramp.
    pub const LOW_RISK: Color = Color::rgb(0xFF, 0xFF, 0xB2);
    /// Dark red at the high end.
    pub const HIGH_RISK: Color = Color::rgb(0xBD, 0x00, 0x26);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Linear interpolation towards `other`; `t` is clamped to [0, 1].
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Option<Vec<u8>> = s
            .trim()
            .trim_start_matches('#')
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect();
        let channels: Vec<u8> = match digits {
            Some(d) if d.len() == 6 || d.len() == 8 => {
                d.chunks(2).map(|pair| pair[0] * 16 + pair[1]).collect()
            }
            _ => return Err(format!("invalid color {:?}, expected #RRGGBB or #RRGGBBAA", s)),
        };

        Ok(Color {
            r: channels[0],
            g: channels[1],
            b: channels[2],
            a: channels.get(3).copied().unwrap_or(255),
        })
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02X}", self.a)?;
        }
        Ok(())
    }
}

/// A classification break/range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassBreak {
    /// Minimum value (inclusive)
    pub min: f64,

    /// Maximum value (inclusive for the last class, exclusive otherwise)
    pub max: f64,

    /// Fill color for this class
    pub color: Color,

    /// Legend label
    pub label: String,
}

/// Equal-interval class breaks over one numeric field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassBreaksRenderer {
    pub field: String,
    pub classes: Vec<ClassBreak>,
}

impl ClassBreaksRenderer {
    /// Renderer for the `HRI` field.
    ///
    /// HRI sums three indicators each standardized into `[lo, hi]`, so its
    /// theoretical range is `[3 * lo, 3 * hi]`.
    pub fn for_hri(lo: f64, hi: f64, class_count: usize) -> Self {
        Self::for_hri_ramp(lo, hi, class_count, Color::LOW_RISK, Color::HIGH_RISK)
    }

    pub fn for_hri_ramp(lo: f64, hi: f64, class_count: usize, low: Color, high: Color) -> Self {
        Self::equal_interval_ramp("HRI", 3.0 * lo, 3.0 * hi, class_count, low, high)
    }

    /// Split `[min, max]` into `class_count` equal classes, yellow to dark red.
    pub fn equal_interval(field: &str, min: f64, max: f64, class_count: usize) -> Self {
        Self::equal_interval_ramp(field, min, max, class_count, Color::LOW_RISK, Color::HIGH_RISK)
    }

    /// Equal classes colored along the ramp from `low` to `high`.
    pub fn equal_interval_ramp(
        field: &str,
        min: f64,
        max: f64,
        class_count: usize,
        low: Color,
        high: Color,
    ) -> Self {
        let class_count = class_count.max(1);
        let step = (max - min) / class_count as f64;

        let classes = (0..class_count)
            .map(|i| {
                let class_min = min + step * i as f64;
                let class_max = if i + 1 == class_count {
                    max
                } else {
                    min + step * (i + 1) as f64
                };
                let t = if class_count == 1 {
                    1.0
                } else {
                    i as f64 / (class_count - 1) as f64
                };
                ClassBreak {
                    min: class_min,
                    max: class_max,
                    color: low.lerp(&high, t),
                    label: format!("{:.1} - {:.1}", class_min, class_max),
                }
            })
            .collect();

        Self {
            field: field.to_string(),
            classes,
        }
    }

    /// Index of the class a value falls into, if any.
    pub fn classify(&self, value: f64) -> Option<usize> {
        let last = self.classes.len().checked_sub(1)?;
        self.classes.iter().position(|c| value >= c.min && value < c.max).or_else(|| {
            let top = &self.classes[last];
            (value >= top.min && value <= top.max).then_some(last)
        })
    }

    /// ArcGIS REST `classBreaks` renderer document.
    pub fn to_esri_json(&self) -> Value {
        let infos: Vec<Value> = self
            .classes
            .iter()
            .map(|c| {
                json!({
                    "classMaxValue": c.max,
                    "label": c.label,
                    "symbol": {
                        "type": "esriSFS",
                        "style": "esriSFSSolid",
                        "color": c.color.to_rgba(),
                        "outline": {
                            "type": "esriSLS",
                            "style": "esriSLSSolid",
                            "color": [110, 110, 110, 64],
                            "width": 0.4
                        }
                    }
                })
            })
            .collect();

        json!({
            "type": "classBreaks",
            "field": self.field,
            "classificationMethod": "esriClassifyEqualInterval",
            "minValue": self.classes.first().map(|c| c.min).unwrap_or(0.0),
            "classBreakInfos": infos,
        })
    }
}
