//! Spatial reference identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::ExtentError;

/// Projected EPSG codes allocated inside the geographic 4000-4999 block.
const PROJECTED_IN_GEOGRAPHIC_BLOCK: &[RangeInclusive<u32>] = &[
    4026..=4026,
    4037..=4038,
    4048..=4051,
    4056..=4063,
    4071..=4071,
    4082..=4083,
    4087..=4088,
    4093..=4096,
    4217..=4217,
    4390..=4398,
    4399..=4463,
    4484..=4489,
    4491..=4554,
    4559..=4559,
    4568..=4589,
    4647..=4647,
    4652..=4656,
    4766..=4800,
    4812..=4812,
    4822..=4822,
    4826..=4826,
    4839..=4839,
    4855..=4880,
];

/// Geographic EPSG codes outside the 4000-4999 block.
const GEOGRAPHIC_OUTSIDE_BLOCK: &[u32] = &[6318, 6322, 6325, 6668, 6706, 6783, 7844, 8086];

/// A spatial reference identified by its well-known id (EPSG or Esri authority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

impl SpatialReference {
    /// Create a validated spatial reference.
    pub fn new(wkid: u32) -> Result<Self, ExtentError> {
        if !Self::is_known_authority_range(wkid) {
            return Err(ExtentError::InvalidWkid(wkid.to_string()));
        }
        Ok(Self { wkid })
    }

    /// Parse `"32632"`, `"EPSG:32632"` or `"epsg:32632"`.
    pub fn parse(s: &str) -> Result<Self, ExtentError> {
        let trimmed = s.trim();
        let code = trimmed
            .split_once(':')
            .map(|(authority, code)| {
                if authority.eq_ignore_ascii_case("EPSG") || authority.eq_ignore_ascii_case("ESRI") {
                    Ok(code)
                } else {
                    Err(ExtentError::InvalidWkid(trimmed.to_string()))
                }
            })
            .unwrap_or(Ok(trimmed))?;

        let wkid: u32 = code
            .parse()
            .map_err(|_| ExtentError::InvalidWkid(trimmed.to_string()))?;
        Self::new(wkid)
    }

    /// EPSG codes live in 1024..=32767, Esri codes in 37001..=104999.
    fn is_known_authority_range(wkid: u32) -> bool {
        (1024..=32767).contains(&wkid) || (37001..=104999).contains(&wkid)
    }

    /// Check if this is a geographic (lat/lon in degrees) reference.
    ///
    /// EPSG reserves 4000-4999 for geographic and geocentric systems, Esri
    /// uses 37001-37999 and 104000-104999 for its GCS codes.
    pub fn is_geographic(&self) -> bool {
        match self.wkid {
            4000..=4999 => !PROJECTED_IN_GEOGRAPHIC_BLOCK
                .iter()
                .any(|range| range.contains(&self.wkid)),
            37001..=37999 | 104000..=104999 => true,
            wkid => GEOGRAPHIC_OUTSIDE_BLOCK.contains(&wkid),
        }
    }

    /// Projected references have linear units, so square-meter cell sizes apply.
    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    /// UTM zone number for WGS84 / ETRS89 UTM codes (326xx, 327xx, 258xx).
    pub fn utm_zone(&self) -> Option<u32> {
        match self.wkid {
            32601..=32660 => Some(self.wkid - 32600),
            32701..=32760 => Some(self.wkid - 32700),
            25828..=25838 => Some(self.wkid - 25800),
            _ => None,
        }
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wkid > 32767 {
            write!(f, "ESRI:{}", self.wkid)
        } else {
            write!(f, "EPSG:{}", self.wkid)
        }
    }
}
