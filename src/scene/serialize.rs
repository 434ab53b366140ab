//! JSON-shaped node, attribute and connection records.
//!
//! Records are the portable contract: plain serde structs with values in
//! their plain-JSON shape, independent of graph handles. Serialization skips
//! what a template can reconstruct (static attributes still at their
//! default); deserialization soft-fails per attribute so one bad record
//! never aborts a bulk load.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::attr::{AttrSpec, AttrType, Value};
use crate::scene::node::NodeId;
use crate::scene::plug::Plug;
use crate::scene::SceneGraph;
use crate::util::{Error, Result};

/// Serialized state of one attribute (or compound child).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeRecord {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<AttrType>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub is_dynamic: bool,
    pub is_array: bool,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub default: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub min: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub max: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub soft_min: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub soft_max: serde_json::Value,
    pub keyable: bool,
    pub channel_box: bool,
    pub locked: bool,
    /// Per-child records for compounds. Placeholder (empty) records keep the
    /// positions of children that had nothing to say.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<AttributeRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enums: Option<Vec<String>>,
}

impl AttributeRecord {
    /// A positional placeholder carrying no information.
    pub fn is_empty(&self) -> bool {
        *self == AttributeRecord::default()
    }
}

/// Serialized connection, captured from the destination side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub source_plug: String,
    pub destination_plug: String,
    /// Full path of the source node.
    pub source: String,
    /// Full path of the destination node.
    pub destination: String,
}

/// Serialized state of one node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Plugin the node type comes from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    /// Parent full path; `Some("")` marks a DAG root. Absent for DG nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectionRecord>,
}

impl NodeRecord {
    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::invalid(e.to_string()))
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::invalid(e.to_string()))
    }
}

impl SceneGraph {
    /// Serialize one plug to a record.
    ///
    /// Static attributes still at their default, array roots and
    /// non-storable attributes produce `None`; compound records carry one
    /// child record per child, with empty placeholders keeping the
    /// positions.
    pub fn serialize_plug(&self, plug: &Plug) -> Result<Option<AttributeRecord>> {
        self.serialize_plug_inner(plug, false)
    }

    fn serialize_plug_inner(&self, plug: &Plug, force: bool) -> Result<Option<AttributeRecord>> {
        let def = self.attr_def(plug)?.clone();
        let dynamic = def.is_dynamic;
        let array_root = self.is_array_root(plug)?;
        if !force && !def.storable {
            return Ok(None);
        }
        if !dynamic && !force && (array_root || self.is_default(plug)?) {
            return Ok(None);
        }
        let state_locked = self.is_locked(plug)?;
        let mut record = AttributeRecord {
            ty: Some(def.ty),
            name: self.plug_name(plug),
            is_dynamic: dynamic,
            is_array: def.is_array,
            keyable: self.is_keyable(plug)?,
            channel_box: self.is_channel_box(plug)?,
            locked: state_locked,
            ..AttributeRecord::default()
        };
        if array_root {
            // Definition only; elements are runtime state. Compound arrays
            // keep their child definitions so a rebuild restores the shape.
            if def.ty == AttrType::Compound {
                record.children = Some(def_children_records(&def, &record.name));
            }
            return Ok(Some(record));
        }
        if def.ty == AttrType::Compound {
            let mut children = Vec::with_capacity(def.children.len());
            for i in 0..def.children.len() {
                let child = self
                    .serialize_plug_inner(&plug.child_at(i), false)?
                    .unwrap_or_default();
                children.push(child);
            }
            record.children = Some(children);
            return Ok(Some(record));
        }
        if def.ty != AttrType::Message {
            record.default = def.default.to_plain();
            record.value = self.plug_value(plug)?.scalar()?.to_plain();
            if def.ty.has_bounds() {
                record.min = def.min.map_or(serde_json::Value::Null, |v| v.into());
                record.max = def.max.map_or(serde_json::Value::Null, |v| v.into());
                record.soft_min = def.soft_min.map_or(serde_json::Value::Null, |v| v.into());
                record.soft_max = def.soft_max.map_or(serde_json::Value::Null, |v| v.into());
            }
            if def.ty == AttrType::Enum && !def.enum_fields.is_empty() {
                record.enums = Some(def.enum_fields.clone());
            }
        }
        Ok(Some(record))
    }

    /// Serialize the connection feeding a destination plug.
    pub fn serialize_connection(&self, destination: &Plug) -> Result<ConnectionRecord> {
        let source = self.source_of(destination)?.ok_or_else(|| {
            Error::other(format!(
                "plug {} has no incoming connection",
                self.plug_full_name(destination)
            ))
        })?;
        Ok(ConnectionRecord {
            source_plug: self.plug_name(&source),
            destination_plug: self.plug_name(destination),
            source: self.full_name(source.node, true)?,
            destination: self.full_name(destination.node, true)?,
        })
    }

    /// Serialize one node to a record.
    ///
    /// `skip` drops the named root attributes; `include` forces the named
    /// attributes into the record even when still at their default. With
    /// `include_connections` every incoming edge is captured (outgoing edges
    /// belong to the node on their destination side).
    pub fn serialize_node(
        &self,
        id: NodeId,
        skip: &[&str],
        include_connections: bool,
        include: &[&str],
    ) -> Result<NodeRecord> {
        let node = self.node(id)?;
        let full = self.full_name(id, true)?;
        // Strip this node's namespace everywhere in the path. A deeper
        // segment carrying the same prefix loses it too.
        let name = match node.name.rfind(':') {
            Some(pos) => {
                let ns = &node.name[..pos];
                full.replace(&format!("{ns}:"), "")
            }
            None => full,
        };
        let parent = match &node.dag {
            Some(dag) => Some(match dag.parent {
                Some(p) => self.full_name(p, true)?,
                None => String::new(),
            }),
            None => None,
        };
        let mut attributes = Vec::new();
        for plug in self.iter_plugs(id)? {
            let attr_name = plug.path.root.clone();
            if skip.contains(&attr_name.as_str()) {
                continue;
            }
            let force = include.contains(&attr_name.as_str());
            if let Some(record) = self.serialize_plug_inner(&plug, force)? {
                attributes.push(record);
            }
        }
        let mut connections = Vec::new();
        if include_connections {
            for (dst, _) in self.iter_connections(id, true, false)? {
                connections.push(self.serialize_connection(&dst)?);
            }
        }
        Ok(NodeRecord {
            name,
            type_name: Some(node.type_name.clone()),
            requirements: self.registry.plugin_of(&node.type_name).map(String::from),
            parent,
            attributes,
            connections,
        })
    }

    /// Rebuild a node from a record.
    ///
    /// Soft-fail contract: a missing type, an unloadable plugin or a failed
    /// node creation yields `Ok((None, _))` with the reason logged; a bad
    /// attribute record is logged and skipped without aborting the rest.
    /// Returns the created node and the plugs of attributes that had to be
    /// created. Connections in the record are not applied here.
    pub fn deserialize_node(
        &mut self,
        record: &NodeRecord,
        parent: Option<NodeId>,
    ) -> Result<(Option<NodeId>, Vec<Plug>)> {
        let short_name = record
            .name
            .rsplit('|')
            .next()
            .unwrap_or(record.name.as_str())
            .to_string();
        let Some(type_name) = &record.type_name else {
            return Ok((None, Vec::new()));
        };
        if let Some(plugin) = &record.requirements {
            if !self.registry.is_plugin_loaded(plugin) {
                if let Err(e) = self.load_plugin(plugin) {
                    error!(node = %short_name, plugin = %plugin, error = %e, "plugin requirement failed");
                    return Ok((None, Vec::new()));
                }
            }
        }
        let created = if record.parent.is_some() {
            self.create_dag_node(&short_name, type_name, parent)
        } else {
            self.create_dg_node(&short_name, type_name)
        };
        let node = match created {
            Ok(n) => n,
            Err(e) => {
                error!(node = %short_name, error = %e, "node creation failed");
                return Ok((None, Vec::new()));
            }
        };
        let mut created_plugs = Vec::new();
        for attr in &record.attributes {
            if attr.is_empty() {
                continue;
            }
            if self.has_attribute(node, root_attr_name(&attr.name))? {
                match self.find_plug(node, &attr.name) {
                    Ok(plug) => {
                        if let Err(e) = self.apply_record(&plug, attr) {
                            warn!(node = %short_name, attr = %attr.name, error = %e, "attribute restore failed");
                        }
                    }
                    Err(e) => {
                        warn!(node = %short_name, attr = %attr.name, error = %e, "attribute lookup failed");
                    }
                }
                continue;
            }
            match spec_from_record(attr) {
                Ok(spec) => {
                    let result = if spec.ty == AttrType::Compound {
                        self.add_compound_attribute(node, &spec)
                    } else {
                        self.add_attribute(node, &spec)
                    };
                    match result {
                        Ok(plug) => created_plugs.push(plug),
                        Err(e) => {
                            warn!(node = %short_name, attr = %attr.name, error = %e, "attribute creation failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(node = %short_name, attr = %attr.name, error = %e, "bad attribute record");
                }
            }
        }
        Ok((Some(node), created_plugs))
    }
}

fn root_attr_name(path: &str) -> &str {
    let end = path
        .find(['.', '['])
        .unwrap_or(path.len());
    &path[..end]
}

fn def_children_records(
    def: &crate::scene::node::AttrDef,
    prefix: &str,
) -> Vec<AttributeRecord> {
    def.children
        .iter()
        .map(|child| {
            let name = format!("{prefix}.{}", child.long_name);
            let mut record = AttributeRecord {
                ty: Some(child.ty),
                name: name.clone(),
                is_dynamic: child.is_dynamic,
                is_array: child.is_array,
                keyable: child.keyable,
                channel_box: child.channel_box,
                locked: child.locked,
                ..AttributeRecord::default()
            };
            if child.ty == AttrType::Compound {
                record.children = Some(def_children_records(child, &name));
            } else if child.ty != AttrType::Message {
                record.default = child.default.to_plain();
                if child.ty == AttrType::Enum && !child.enum_fields.is_empty() {
                    record.enums = Some(child.enum_fields.clone());
                }
            }
            record
        })
        .collect()
}

/// Last path segment without any element index ("limits.lo" -> "lo").
fn leaf_attr_name(path: &str) -> &str {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    let end = leaf.find('[').unwrap_or(leaf.len());
    &leaf[..end]
}

/// Build a declarative spec from a serialized attribute record.
pub fn spec_from_record(record: &AttributeRecord) -> Result<AttrSpec> {
    let ty = record
        .ty
        .ok_or_else(|| Error::invalid(format!("attribute '{}' has no type", record.name)))?;
    let mut spec = AttrSpec::new(leaf_attr_name(&record.name), ty)
        .array(record.is_array)
        .keyable(record.keyable)
        .channel_box(record.channel_box)
        .locked(record.locked);
    if !record.default.is_null() {
        spec.default = Some(Value::from_plain(ty, &record.default)?);
    }
    if !record.value.is_null() && ty != AttrType::Message && ty != AttrType::Compound {
        spec.value = Some(Value::from_plain(ty, &record.value)?);
    }
    spec.min = record.min.as_f64();
    spec.max = record.max.as_f64();
    spec.soft_min = record.soft_min.as_f64();
    spec.soft_max = record.soft_max.as_f64();
    if let Some(enums) = &record.enums {
        spec.enum_fields = enums.clone();
    }
    if let Some(children) = &record.children {
        for child in children {
            if child.is_empty() {
                continue;
            }
            spec.children.push(spec_from_record(child)?);
        }
    }
    Ok(spec)
}
