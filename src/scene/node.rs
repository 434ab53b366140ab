//! Node storage: attribute definitions, plug state trees and the node struct.

use std::collections::BTreeMap;

use crate::attr::{AttrSpec, AttrType, Value};
use crate::scene::plug::Plug;

/// Opaque node handle.
///
/// Ids are allocated by the owning [`crate::scene::SceneGraph`] and never
/// reused, so a handle to a deleted node stays invalid forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Hierarchy payload carried only by DAG nodes.
#[derive(Clone, Debug, Default)]
pub struct DagData {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Static definition of an attribute: type, naming, defaults and flags.
///
/// Shared by every plug the attribute spawns (compound children have their
/// own nested defs; array elements share the root def).
#[derive(Clone, Debug)]
pub struct AttrDef {
    pub long_name: String,
    pub short_name: String,
    pub ty: AttrType,
    pub is_array: bool,
    /// Created at runtime rather than by the node type.
    pub is_dynamic: bool,
    pub default: Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub soft_min: Option<f64>,
    pub soft_max: Option<f64>,
    pub keyable: bool,
    pub channel_box: bool,
    pub locked: bool,
    pub storable: bool,
    pub writable: bool,
    pub connectable: bool,
    /// Connections made through this attribute mirror a driving plug.
    pub proxy: bool,
    pub enum_fields: Vec<String>,
    pub children: Vec<AttrDef>,
}

impl AttrDef {
    /// Build a definition from a declarative spec.
    ///
    /// Numeric tuple types spawn one scalar child per component, so
    /// `translate` is addressable as `translateX`/`translateY`/`translateZ`.
    pub fn from_spec(spec: &AttrSpec, dynamic: bool) -> Self {
        let mut def = Self {
            long_name: spec.long_name.clone(),
            short_name: spec.short_name.clone(),
            ty: spec.ty,
            is_array: spec.is_array,
            is_dynamic: dynamic,
            default: spec
                .default
                .clone()
                .unwrap_or_else(|| spec.ty.default_value()),
            min: spec.min,
            max: spec.max,
            soft_min: spec.soft_min,
            soft_max: spec.soft_max,
            keyable: spec.keyable,
            channel_box: spec.channel_box,
            locked: spec.locked,
            storable: spec.storable,
            writable: spec.writable,
            connectable: spec.connectable,
            proxy: false,
            enum_fields: spec.enum_fields.clone(),
            children: spec
                .children
                .iter()
                .map(|c| AttrDef::from_spec(c, dynamic))
                .collect(),
        };
        if def.children.is_empty() {
            def.synthesize_tuple_children();
        }
        def
    }

    /// One scalar child per tuple component. Children inherit the parent's
    /// flags and bounds; their defaults are the components of the parent
    /// default. The spec's lock applies to the root plug only.
    fn synthesize_tuple_children(&mut self) {
        let Some(scalar) = self.ty.component_type() else {
            return;
        };
        let Some(parts) = self.default.components() else {
            return;
        };
        const SUFFIXES: [&str; 4] = ["X", "Y", "Z", "W"];
        self.children = parts
            .into_iter()
            .zip(SUFFIXES)
            .map(|(part, suffix)| AttrDef {
                long_name: format!("{}{suffix}", self.long_name),
                short_name: format!("{}{}", self.short_name, suffix.to_lowercase()),
                ty: scalar,
                is_array: false,
                is_dynamic: self.is_dynamic,
                default: part,
                min: self.min,
                max: self.max,
                soft_min: self.soft_min,
                soft_max: self.soft_max,
                keyable: self.keyable,
                channel_box: self.channel_box,
                locked: false,
                storable: self.storable,
                writable: self.writable,
                connectable: self.connectable,
                proxy: false,
                enum_fields: Vec::new(),
                children: Vec::new(),
            })
            .collect();
    }
}

/// Mutable state of a single plug.
///
/// Mirrors the shape of its [`AttrDef`]: compound plugs carry one child
/// state per child def, array plugs carry a sparse element map keyed by
/// logical index.
#[derive(Clone, Debug)]
pub struct PlugState {
    pub value: Value,
    pub locked: bool,
    pub keyable: bool,
    pub channel_box: bool,
    /// Incoming connection (single writer).
    pub source: Option<Plug>,
    /// Outgoing connections (unbounded fan-out).
    pub destinations: Vec<Plug>,
    pub children: Vec<PlugState>,
    pub elements: BTreeMap<u32, PlugState>,
}

impl PlugState {
    /// Fresh state for a definition: default value, children recursed,
    /// elements empty. Array roots start with no elements regardless of the
    /// element shape.
    pub fn from_def(def: &AttrDef) -> Self {
        Self {
            value: def.default.clone(),
            locked: def.locked,
            keyable: def.keyable,
            channel_box: def.channel_box,
            source: None,
            destinations: Vec::new(),
            children: def.children.iter().map(PlugState::from_def).collect(),
            elements: BTreeMap::new(),
        }
    }
}

/// An attribute instance on a node: definition plus its plug-state tree.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub def: AttrDef,
    pub state: PlugState,
}

impl Attribute {
    pub fn new(def: AttrDef) -> Self {
        let state = PlugState::from_def(&def);
        Self { def, state }
    }
}

/// A scene node: name, type, optional DAG payload and its attributes.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    pub type_name: String,
    /// Plugin that registered the node type, if any.
    pub plugin: Option<String>,
    pub locked: bool,
    /// `Some` for DAG nodes, `None` for plain dependency nodes.
    pub dag: Option<DagData>,
    pub attrs: Vec<Attribute>,
}

impl SceneNode {
    pub fn is_dag(&self) -> bool {
        self.dag.is_some()
    }

    /// Look up a root attribute by long or short name.
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs
            .iter()
            .find(|a| a.def.long_name == name || a.def.short_name == name)
    }

    pub fn attr_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs
            .iter_mut()
            .find(|a| a.def.long_name == name || a.def.short_name == name)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mirrors_def_shape() {
        let spec = AttrSpec::new("limits", AttrType::Compound)
            .child(AttrSpec::new("lo", AttrType::Double))
            .child(AttrSpec::new("hi", AttrType::Double).default(Value::Double(1.0)));
        let def = AttrDef::from_spec(&spec, true);
        let state = PlugState::from_def(&def);
        assert_eq!(state.children.len(), 2);
        assert_eq!(state.children[1].value, Value::Double(1.0));
        assert!(state.elements.is_empty());
    }

    #[test]
    fn test_tuple_defs_expose_component_children() {
        use crate::util::math::DVec3;
        let spec = AttrSpec::new("translate", AttrType::Double3)
            .short_name("t")
            .default(Value::Double3(DVec3::new(1.0, 2.0, 3.0)))
            .keyable(true);
        let def = AttrDef::from_spec(&spec, false);
        assert_eq!(def.children.len(), 3);
        assert_eq!(def.children[0].long_name, "translateX");
        assert_eq!(def.children[0].short_name, "tx");
        assert_eq!(def.children[2].ty, AttrType::Double);
        assert_eq!(def.children[1].default, Value::Double(2.0));
        assert!(def.children[0].keyable);

        let state = PlugState::from_def(&def);
        assert_eq!(state.children.len(), 3);
        assert_eq!(state.children[2].value, Value::Double(3.0));
    }

    #[test]
    fn test_array_root_starts_empty() {
        let spec = AttrSpec::new("weights", AttrType::Double).array(true);
        let def = AttrDef::from_spec(&spec, true);
        let state = PlugState::from_def(&def);
        assert!(state.elements.is_empty());
        assert!(def.is_array);
    }
}
