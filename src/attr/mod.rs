//! Attribute type system: type tags, native values and declarative specs.

pub mod declare;
pub mod spec;
pub mod types;
pub mod value;

pub use spec::AttrSpec;
pub use types::{AttrCategory, AttrType};
pub use value::{Angle, Distance, Time, Value};
