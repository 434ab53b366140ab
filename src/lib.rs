//! # scenekit
//!
//! Retained scene-graph engine with a typed attribute/plug marshalling layer.
//!
//! Nodes carry attributes described by a closed set of type tags; every
//! addressable value slot is a plug (root attribute, compound child or array
//! element). Plugs connect through directed single-writer edges, transforms
//! accumulate through the DAG, and everything round-trips through
//! JSON-shaped records.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (errors, math, spaces)
//! - [`attr`] - Attribute type tags, native values and declarative specs
//! - [`scene`] - The graph: nodes, plugs, connections, transforms, records
//!
//! ## Example
//!
//! ```
//! use scenekit::prelude::*;
//!
//! let mut graph = SceneGraph::new();
//! let ctrl = graph.create_dag_node("ctrl", "transform", None)?;
//! let plug = graph.add_attribute(
//!     ctrl,
//!     &AttrSpec::new("stretch", AttrType::Double).min(0.0).keyable(true),
//! )?;
//! graph.set_plug_value(&plug, Value::Double(1.5))?;
//!
//! let record = graph.serialize_node(ctrl, &[], true, &[])?;
//! println!("{}", serde_json::to_string_pretty(&record).unwrap());
//! # Ok::<(), scenekit::Error>(())
//! ```

pub mod attr;
pub mod scene;
pub mod util;

// Re-export commonly used types
pub use attr::{AttrSpec, AttrType, Value};
pub use scene::{NodeId, Plug, PlugValue, SceneGraph};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attr::{Angle, AttrSpec, AttrType, Distance, Time, Value};
    pub use crate::scene::{
        AttributeRecord, ConnectionRecord, EditBatch, NodeId, NodeRecord, NodeTypeDef, Plug,
        PlugValue, SceneGraph, TypeRegistry,
    };
    pub use crate::util::math::{DMat4, DQuat, DVec3};
    pub use crate::util::{AxisMask, Error, MirrorMode, MirrorPlane, Result, Space};
}
