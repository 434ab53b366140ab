//! Runtime attribute creation and record application.

use tracing::debug;

use crate::attr::{AttrSpec, AttrType, Value};
use crate::scene::node::{AttrDef, Attribute, NodeId};
use crate::scene::plug::Plug;
use crate::scene::serialize::AttributeRecord;
use crate::scene::SceneGraph;
use crate::util::{Error, Result};

impl SceneGraph {
    /// Add a dynamic attribute to a node.
    ///
    /// The attribute starts at its default (or the spec's initial value) and
    /// is locked last, so a locked spec still applies its value.
    pub fn add_attribute(&mut self, node: NodeId, spec: &AttrSpec) -> Result<Plug> {
        let node_ref = self.node(node)?;
        for name in [&spec.long_name, &spec.short_name] {
            if node_ref.has_attr(name) {
                return Err(Error::AttributeExists {
                    node: node_ref.name.clone(),
                    attr: name.clone(),
                });
            }
        }
        let mut def = AttrDef::from_spec(spec, true);
        def.locked = false;
        self.node_mut(node)?.attrs.push(Attribute::new(def));
        let plug = Plug::new(node, spec.long_name.clone());
        self.apply_spec_values(&plug, spec)?;
        if spec.locked {
            self.attr_def_mut(&plug)?.locked = true;
            self.set_locked(&plug, true)?;
        }
        debug!(plug = %self.plug_full_name(&plug), "added attribute");
        Ok(plug)
    }

    fn apply_spec_values(&mut self, plug: &Plug, spec: &AttrSpec) -> Result<()> {
        if let Some(value) = &spec.value {
            self.set_plug_value(plug, value.clone())?;
        }
        for (i, child) in spec.children.iter().enumerate() {
            self.apply_spec_values(&plug.child_at(i), child)?;
        }
        Ok(())
    }

    /// Add a dynamic compound attribute with its children.
    pub fn add_compound_attribute(&mut self, node: NodeId, spec: &AttrSpec) -> Result<Plug> {
        if spec.ty != AttrType::Compound {
            return Err(Error::mismatch("compound", spec.ty.name()));
        }
        self.add_attribute(node, spec)
    }

    /// Add a proxy attribute: a dynamic attribute driven by `source`.
    ///
    /// Compound proxies connect child by child; scalar proxies connect the
    /// plug directly. The proxy flag is set on every created definition.
    pub fn add_proxy_attribute(
        &mut self,
        node: NodeId,
        source: &Plug,
        spec: &AttrSpec,
    ) -> Result<Plug> {
        let plug = self.add_attribute(node, spec)?;
        self.attr_def_mut(&plug)?.proxy = true;
        let child_count = self.attr_def(&plug)?.children.len();
        if child_count > 0 {
            for i in 0..child_count {
                let child = plug.child_at(i);
                self.attr_def_mut(&child)?.proxy = true;
                self.connect(&source.child_at(i), &child, true, None)?;
            }
        } else {
            self.connect(source, &plug, true, None)?;
        }
        Ok(plug)
    }

    /// Apply a serialized attribute record onto an existing plug.
    ///
    /// Compound records without child records distribute the parent's value
    /// and default lists positionally across the children; with child
    /// records each is applied in position, empty placeholders skipped.
    /// The lock state lands last so everything else can still be written.
    pub fn apply_record(&mut self, plug: &Plug, record: &AttributeRecord) -> Result<()> {
        let def = self.attr_def(plug)?;
        let ty = def.ty;
        let is_array = self.is_array_root(plug)?;
        if ty == AttrType::Compound && !is_array {
            let child_count = def.children.len();
            match &record.children {
                Some(children) if !children.is_empty() => {
                    for (i, child) in children.iter().enumerate().take(child_count) {
                        if child.is_empty() {
                            continue;
                        }
                        self.apply_record(&plug.child_at(i), child)?;
                    }
                }
                _ => {
                    for i in 0..child_count {
                        let piece = AttributeRecord {
                            value: index_plain(&record.value, i),
                            default: index_plain(&record.default, i),
                            keyable: record.keyable,
                            channel_box: record.channel_box,
                            locked: record.locked,
                            ..AttributeRecord::default()
                        };
                        self.apply_record(&plug.child_at(i), &piece)?;
                    }
                }
            }
            self.set_keyable(plug, record.keyable)?;
            self.set_channel_box(plug, record.channel_box)?;
            self.set_locked(plug, record.locked)?;
            return Ok(());
        }
        if !record.default.is_null() && ty != AttrType::Message {
            let default = Value::from_plain(ty, &record.default)?;
            self.set_plug_default(plug, default)?;
        }
        if !record.value.is_null() && ty != AttrType::Message && !is_array {
            let value = Value::from_plain(ty, &record.value)?;
            self.with_unlocked(plug, |g| g.set_plug_value(plug, value))?;
        }
        if let Some(min) = record.min.as_f64() {
            self.set_plug_min(plug, min)?;
        }
        if let Some(max) = record.max.as_f64() {
            self.set_plug_max(plug, max)?;
        }
        if let Some(v) = record.soft_min.as_f64() {
            self.set_plug_soft_min(plug, v)?;
        }
        if let Some(v) = record.soft_max.as_f64() {
            self.set_plug_soft_max(plug, v)?;
        }
        self.set_keyable(plug, record.keyable)?;
        self.set_channel_box(plug, record.channel_box)?;
        self.set_locked(plug, record.locked)?;
        Ok(())
    }

    /// Whether a plug sits on a proxy attribute definition.
    pub fn is_proxy(&self, plug: &Plug) -> Result<bool> {
        Ok(self.attr_def(plug)?.proxy)
    }

    /// Remove a dynamic root attribute, breaking its connections.
    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<()> {
        let plug = self.find_plug(node, name)?;
        if !plug.path.segs.is_empty() {
            return Err(Error::mismatch("root attribute", self.plug_name(&plug)));
        }
        if !self.attr_def(&plug)?.is_dynamic {
            return Err(Error::other(format!(
                "'{}' is a static attribute",
                self.plug_full_name(&plug)
            )));
        }
        self.break_edges(&plug)?;
        for child in self.iter_plug_children(&plug)? {
            self.break_edges(&child)?;
        }
        let long = plug.path.root.clone();
        self.node_mut(node)?
            .attrs
            .retain(|a| a.def.long_name != long);
        Ok(())
    }
}

fn index_plain(v: &serde_json::Value, i: usize) -> serde_json::Value {
    v.as_array()
        .and_then(|a| a.get(i))
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}
