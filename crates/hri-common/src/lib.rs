//! Common types and utilities shared across the heat risk index crates.

pub mod bbox;
pub mod error;
pub mod extent;
pub mod renderer;
pub mod srs;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{ExtentError, ExtentResult};
pub use extent::Extent;
pub use renderer::{ClassBreak, ClassBreaksRenderer, Color};
pub use srs::SpatialReference;
pub use time::{AcquisitionTime, MonthSet};
