//! Basic utilities: errors and math types.

pub mod error;
pub mod math;

pub use error::{Error, Result};
pub use math::{AxisMask, MirrorMode, MirrorPlane, Space};
