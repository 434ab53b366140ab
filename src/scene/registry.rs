//! Node type registry and plugin gating.
//!
//! Node types are registered up front, either as built-ins or under a plugin
//! name. A plugin's types only become creatable once the plugin is loaded;
//! serialized records carry the plugin name as a requirement so loading can
//! happen on demand during deserialization.

use std::collections::{HashMap, HashSet};

use crate::attr::{AttrSpec, AttrType, Value};
use crate::util::math::DVec3;
use crate::util::{Error, Result};

/// Definition of a creatable node type.
#[derive(Clone, Debug)]
pub struct NodeTypeDef {
    pub name: String,
    pub is_dag: bool,
    /// Plugin that owns the type; `None` for built-ins.
    pub plugin: Option<String>,
    /// Static attributes every node of this type starts with.
    pub attrs: Vec<AttrSpec>,
}

impl NodeTypeDef {
    pub fn new(name: impl Into<String>, is_dag: bool) -> Self {
        Self {
            name: name.into(),
            is_dag,
            plugin: None,
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, spec: AttrSpec) -> Self {
        self.attrs.push(spec);
        self
    }
}

/// Registry of node types, with plugin load state.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, NodeTypeDef>,
    /// Types registered by plugins that are not loaded yet.
    available: HashMap<String, Vec<NodeTypeDef>>,
    loaded_plugins: HashSet<String>,
}

fn transform_type() -> NodeTypeDef {
    let v3 = |name: &str, default: DVec3| {
        AttrSpec::new(name, AttrType::Double3)
            .default(Value::Double3(default))
            .keyable(true)
    };
    NodeTypeDef::new("transform", true)
        .attr(v3("translate", DVec3::ZERO))
        .attr(v3("rotate", DVec3::ZERO))
        .attr(v3("scale", DVec3::ONE))
        .attr(AttrSpec::new("rotatePivot", AttrType::Double3))
        .attr(AttrSpec::new("scalePivot", AttrType::Double3))
        .attr(
            AttrSpec::new("visibility", AttrType::Bool)
                .default(Value::Bool(true))
                .keyable(true),
        )
}

impl TypeRegistry {
    /// Registry with the built-in `transform` (DAG) and `network` (DG) types.
    pub fn with_builtins() -> Self {
        let mut reg = Self::default();
        reg.register(transform_type());
        reg.register(NodeTypeDef::new("network", false));
        reg
    }

    /// Register a type as immediately creatable.
    pub fn register(&mut self, def: NodeTypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    /// Register a type under a plugin; creatable only after
    /// [`TypeRegistry::load_plugin`].
    pub fn register_plugin(&mut self, plugin: impl Into<String>, mut def: NodeTypeDef) {
        let plugin = plugin.into();
        def.plugin = Some(plugin.clone());
        if self.loaded_plugins.contains(&plugin) {
            self.types.insert(def.name.clone(), def);
        } else {
            self.available.entry(plugin).or_default().push(def);
        }
    }

    /// Load a plugin, promoting its types. Loading twice is a no-op.
    pub fn load_plugin(&mut self, plugin: &str) -> Result<()> {
        if self.loaded_plugins.contains(plugin) {
            return Ok(());
        }
        let defs = self
            .available
            .remove(plugin)
            .ok_or_else(|| Error::PluginLoadFailed(plugin.to_string()))?;
        for def in defs {
            self.types.insert(def.name.clone(), def);
        }
        self.loaded_plugins.insert(plugin.to_string());
        Ok(())
    }

    pub fn is_plugin_loaded(&self, plugin: &str) -> bool {
        self.loaded_plugins.contains(plugin)
    }

    /// Look up a creatable type.
    pub fn get(&self, name: &str) -> Result<&NodeTypeDef> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownNodeType(name.to_string()))
    }

    /// Plugin owning a type, if the type is known and plugin-provided.
    pub fn plugin_of(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name).and_then(|d| d.plugin.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let reg = TypeRegistry::with_builtins();
        assert!(reg.get("transform").unwrap().is_dag);
        assert!(!reg.get("network").unwrap().is_dag);
        assert!(reg.get("nurbsCurve").is_err());
    }

    #[test]
    fn test_plugin_gating() {
        let mut reg = TypeRegistry::with_builtins();
        reg.register_plugin("rigTools", NodeTypeDef::new("ikSolver", false));
        assert!(reg.get("ikSolver").is_err());
        reg.load_plugin("rigTools").unwrap();
        assert!(reg.get("ikSolver").is_ok());
        assert_eq!(reg.plugin_of("ikSolver"), Some("rigTools"));
        // reload is a no-op
        reg.load_plugin("rigTools").unwrap();
        assert!(reg.load_plugin("missing").is_err());
    }
}
