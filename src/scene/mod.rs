//! Scene graph: nodes, plugs, connections, transforms and records.

pub mod connect;
pub mod graph;
pub mod node;
pub mod plug;
pub mod registry;
pub mod serialize;
pub mod transform;

pub use connect::{EditBatch, GraphEdit};
pub use graph::{AncestorIter, SceneGraph};
pub use node::{AttrDef, Attribute, NodeId, PlugState, SceneNode};
pub use plug::{Plug, PlugPath, PlugSeg, PlugValue};
pub use registry::{NodeTypeDef, TypeRegistry};
pub use serialize::{AttributeRecord, ConnectionRecord, NodeRecord};
