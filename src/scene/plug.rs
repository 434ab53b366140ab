//! Plug addressing and value marshalling.
//!
//! A [`Plug`] names one addressable value slot on a node: a root attribute,
//! a compound child, or an array element. All reads and writes dispatch on
//! the attribute's type tag; compound and array plugs recurse through
//! [`PlugValue::Many`].

use smallvec::SmallVec;
use tracing::debug;

use crate::attr::{AttrCategory, Value};
use crate::scene::node::{AttrDef, Attribute, NodeId, PlugState};
use crate::scene::SceneGraph;
use crate::util::{Error, Result};

/// One step down a plug path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlugSeg {
    /// Compound child by positional index.
    Child(usize),
    /// Array element by logical index.
    Element(u32),
}

/// Path from a root attribute down to a plug.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlugPath {
    /// Long name of the root attribute.
    pub root: String,
    pub segs: SmallVec<[PlugSeg; 2]>,
}

/// Address of a plug: a node handle plus a path on that node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Plug {
    pub node: NodeId,
    pub path: PlugPath,
}

impl Plug {
    /// Root attribute plug.
    pub fn new(node: NodeId, attr: impl Into<String>) -> Self {
        Self {
            node,
            path: PlugPath {
                root: attr.into(),
                segs: SmallVec::new(),
            },
        }
    }

    /// Descend to a compound child by index.
    pub fn child_at(&self, index: usize) -> Self {
        let mut p = self.clone();
        p.path.segs.push(PlugSeg::Child(index));
        p
    }

    /// Descend to an array element by logical index.
    pub fn element(&self, index: u32) -> Self {
        let mut p = self.clone();
        p.path.segs.push(PlugSeg::Element(index));
        p
    }

    /// The root attribute plug this plug descends from.
    pub fn root(&self) -> Self {
        Self::new(self.node, self.path.root.clone())
    }
}

/// Value of a plug.
///
/// Leaf plugs carry a `Scalar`; compound plugs carry one entry per child and
/// array plugs one entry per existing element, in logical-index order.
#[derive(Clone, Debug, PartialEq)]
pub enum PlugValue {
    Scalar(Value),
    Many(Vec<PlugValue>),
}

impl PlugValue {
    pub fn scalar(self) -> Result<Value> {
        match self {
            PlugValue::Scalar(v) => Ok(v),
            PlugValue::Many(_) => Err(Error::mismatch("scalar value", "value list")),
        }
    }
}

impl From<Value> for PlugValue {
    fn from(v: Value) -> Self {
        PlugValue::Scalar(v)
    }
}

/// Resolved position in an attribute tree: the governing definition plus
/// whether a trailing element segment has consumed its array-ness.
struct DefCursor<'a> {
    def: &'a AttrDef,
    consumed_array: bool,
}

fn walk_def<'a>(root: &'a AttrDef, plug: &Plug) -> Result<DefCursor<'a>> {
    let mut def = root;
    let mut consumed = false;
    for seg in &plug.path.segs {
        match seg {
            PlugSeg::Child(i) => {
                def = def.children.get(*i).ok_or(Error::ChildOutOfBounds {
                    index: *i,
                    count: def.children.len(),
                })?;
                consumed = false;
            }
            PlugSeg::Element(_) => consumed = true,
        }
    }
    Ok(DefCursor {
        def,
        consumed_array: consumed,
    })
}

fn value_of(def: &AttrDef, state: &PlugState, array_root: bool) -> PlugValue {
    if array_root {
        return PlugValue::Many(
            state
                .elements
                .values()
                .map(|el| value_of(def, el, false))
                .collect(),
        );
    }
    // Tuple plugs store per-component children but read as one scalar.
    if def.ty.component_type().is_some() && !def.children.is_empty() {
        let parts: Vec<Value> = state.children.iter().map(|s| s.value.clone()).collect();
        if let Ok(v) = Value::from_components(def.ty, &parts) {
            return PlugValue::Scalar(v);
        }
    }
    if !def.children.is_empty() {
        return PlugValue::Many(
            def.children
                .iter()
                .zip(&state.children)
                .map(|(d, s)| value_of(d, s, d.is_array))
                .collect(),
        );
    }
    PlugValue::Scalar(state.value.clone())
}

impl SceneGraph {
    /// Definition governing a plug.
    pub fn attr_def(&self, plug: &Plug) -> Result<&AttrDef> {
        let node = self.node(plug.node)?;
        let attr = node.attr(&plug.path.root).ok_or_else(|| {
            Error::AttributeNotFound {
                node: node.name.clone(),
                attr: plug.path.root.clone(),
            }
        })?;
        Ok(walk_def(&attr.def, plug)?.def)
    }

    pub(crate) fn attr_def_mut(&mut self, plug: &Plug) -> Result<&mut AttrDef> {
        let node_name = self.node(plug.node)?.name.clone();
        let node = self.node_mut(plug.node)?;
        let attr = node
            .attr_mut(&plug.path.root)
            .ok_or(Error::AttributeNotFound {
                node: node_name,
                attr: plug.path.root.clone(),
            })?;
        let mut def = &mut attr.def;
        for seg in &plug.path.segs {
            if let PlugSeg::Child(i) = seg {
                let count = def.children.len();
                def = def
                    .children
                    .get_mut(*i)
                    .ok_or(Error::ChildOutOfBounds { index: *i, count })?;
            }
        }
        Ok(def)
    }

    /// Whether the plug addresses an array root (elements live below it).
    pub fn is_array_root(&self, plug: &Plug) -> Result<bool> {
        let node = self.node(plug.node)?;
        let attr = node.attr(&plug.path.root).ok_or_else(|| {
            Error::AttributeNotFound {
                node: node.name.clone(),
                attr: plug.path.root.clone(),
            }
        })?;
        let cursor = walk_def(&attr.def, plug)?;
        Ok(cursor.def.is_array && !cursor.consumed_array)
    }

    /// Shared access to a plug's state. Missing array elements are an error.
    pub(crate) fn plug_state(&self, plug: &Plug) -> Result<&PlugState> {
        let node = self.node(plug.node)?;
        let attr = node.attr(&plug.path.root).ok_or_else(|| {
            Error::AttributeNotFound {
                node: node.name.clone(),
                attr: plug.path.root.clone(),
            }
        })?;
        let mut state = &attr.state;
        let mut def = &attr.def;
        for seg in &plug.path.segs {
            match seg {
                PlugSeg::Child(i) => {
                    def = def.children.get(*i).ok_or(Error::ChildOutOfBounds {
                        index: *i,
                        count: def.children.len(),
                    })?;
                    state = &state.children[*i];
                }
                PlugSeg::Element(idx) => {
                    state = state.elements.get(idx).ok_or_else(|| Error::ElementNotFound {
                        plug: self.plug_name(plug),
                        index: *idx,
                    })?;
                }
            }
        }
        Ok(state)
    }

    /// Mutable access to a plug's state; array elements spring into
    /// existence on demand.
    pub(crate) fn plug_state_mut(&mut self, plug: &Plug) -> Result<&mut PlugState> {
        let node_name = self.node(plug.node)?.name.clone();
        let node = self.node_mut(plug.node)?;
        let attr = node
            .attr_mut(&plug.path.root)
            .ok_or(Error::AttributeNotFound {
                node: node_name,
                attr: plug.path.root.clone(),
            })?;
        let Attribute { def, state } = attr;
        let mut def: &AttrDef = def;
        let mut state = state;
        for seg in &plug.path.segs {
            match seg {
                PlugSeg::Child(i) => {
                    def = def.children.get(*i).ok_or(Error::ChildOutOfBounds {
                        index: *i,
                        count: def.children.len(),
                    })?;
                    state = &mut state.children[*i];
                }
                PlugSeg::Element(idx) => {
                    state = state
                        .elements
                        .entry(*idx)
                        .or_insert_with(|| PlugState::from_def(def));
                }
            }
        }
        Ok(state)
    }

    /// Attribute-path name of a plug ("limits.lo", "weights[2]").
    pub fn plug_name(&self, plug: &Plug) -> String {
        let mut name = plug.path.root.clone();
        let def_root = self
            .node(plug.node)
            .ok()
            .and_then(|n| n.attr(&plug.path.root).map(|a| a.def.clone()));
        let mut def = def_root.as_ref();
        for seg in &plug.path.segs {
            match seg {
                PlugSeg::Child(i) => {
                    let child = def.and_then(|d| d.children.get(*i));
                    match child {
                        Some(c) => {
                            name.push('.');
                            name.push_str(&c.long_name);
                            def = Some(c);
                        }
                        None => {
                            name.push_str(&format!(".#{i}"));
                            def = None;
                        }
                    }
                }
                PlugSeg::Element(idx) => name.push_str(&format!("[{idx}]")),
            }
        }
        name
    }

    /// Full "node.attr" name of a plug, using the node's partial name.
    pub fn plug_full_name(&self, plug: &Plug) -> String {
        let node = self
            .node(plug.node)
            .map(|n| n.name.clone())
            .unwrap_or_else(|_| plug.node.to_string());
        format!("{node}.{}", self.plug_name(plug))
    }

    /// Parse an attribute path ("limits.lo", "weights[2].w") into a plug.
    pub fn find_plug(&self, node: NodeId, attr_path: &str) -> Result<Plug> {
        let node_ref = self.node(node)?;
        let mut tokens = attr_path.split('.');
        let first = tokens
            .next()
            .ok_or_else(|| Error::PlugNotFound(attr_path.to_string()))?;
        let (root_name, root_idx) = split_index(first)?;
        let attr = node_ref.attr(root_name).ok_or_else(|| {
            Error::AttributeNotFound {
                node: node_ref.name.clone(),
                attr: root_name.to_string(),
            }
        })?;
        let mut plug = Plug::new(node, attr.def.long_name.clone());
        let mut def = &attr.def;
        if let Some(idx) = root_idx {
            plug = plug.element(idx);
        }
        for token in tokens {
            let (name, idx) = split_index(token)?;
            let (i, child) = def
                .children
                .iter()
                .enumerate()
                .find(|(_, c)| c.long_name == name || c.short_name == name)
                .ok_or_else(|| Error::PlugNotFound(format!("{attr_path} (no child '{name}')")))?;
            plug = plug.child_at(i);
            def = child;
            if let Some(idx) = idx {
                plug = plug.element(idx);
            }
        }
        Ok(plug)
    }

    /// Type tag of a plug.
    pub fn type_of(&self, plug: &Plug) -> Result<crate::attr::AttrType> {
        Ok(self.attr_def(plug)?.ty)
    }

    /// Read a plug's value.
    ///
    /// Array roots yield [`PlugValue::Many`] over existing elements in
    /// logical-index order; compound plugs yield one entry per child; tuple
    /// plugs compose one scalar from their component children; leaf plugs
    /// yield a scalar (message plugs read as [`Value::Message`]).
    pub fn plug_value(&self, plug: &Plug) -> Result<PlugValue> {
        let def = self.attr_def(plug)?.clone();
        let state = self.plug_state(plug)?;
        Ok(value_of(&def, state, self.is_array_root(plug)?))
    }

    /// Read a plug's value together with its type tag.
    pub fn plug_value_and_type(&self, plug: &Plug) -> Result<(PlugValue, crate::attr::AttrType)> {
        Ok((self.plug_value(plug)?, self.type_of(plug)?))
    }

    /// Write a plug's value.
    ///
    /// Leaf writes coerce to the attribute type and fail on locked or
    /// non-writable plugs, or on type mismatch. A scalar tuple write
    /// distributes its components onto the tuple's children. Compound and
    /// array writes distribute a [`PlugValue::Many`] positionally; a length
    /// mismatch against the current shape leaves the plug untouched.
    pub fn set_plug_value(&mut self, plug: &Plug, value: impl Into<PlugValue>) -> Result<()> {
        let value = value.into();
        if !self.attr_def(plug)?.writable {
            return Err(Error::NotWritable(self.plug_full_name(plug)));
        }
        if self.is_array_root(plug)? {
            let values = match value {
                PlugValue::Many(v) => v,
                PlugValue::Scalar(_) => {
                    return Err(Error::mismatch("value list", "scalar value"))
                }
            };
            let indices = self.element_indices(plug)?;
            if indices.len() != values.len() {
                debug!(
                    plug = %self.plug_full_name(plug),
                    have = indices.len(),
                    got = values.len(),
                    "array length mismatch, write skipped"
                );
                return Ok(());
            }
            for (idx, v) in indices.into_iter().zip(values) {
                self.set_plug_value(&plug.element(idx), v)?;
            }
            return Ok(());
        }
        let def = self.attr_def(plug)?;
        let ty = def.ty;
        if ty.component_type().is_some()
            && !def.children.is_empty()
            && matches!(&value, PlugValue::Scalar(_))
        {
            let raw = value.scalar()?;
            let coerced = Value::coerce(ty, raw).map_err(|e| {
                debug!(plug = %self.plug_full_name(plug), error = %e, "rejected plug write");
                e
            })?;
            if self.plug_state(plug)?.locked {
                return Err(Error::PlugLocked(self.plug_full_name(plug)));
            }
            let parts = coerced
                .components()
                .ok_or_else(|| Error::mismatch(ty.name(), "scalar value"))?;
            for (i, part) in parts.into_iter().enumerate() {
                self.set_plug_value(&plug.child_at(i), part)?;
            }
            return Ok(());
        }
        if !def.children.is_empty() {
            let count = def.children.len();
            let values = match value {
                PlugValue::Many(v) => v,
                PlugValue::Scalar(_) => {
                    return Err(Error::mismatch("value list", "scalar value"))
                }
            };
            if values.len() != count {
                debug!(
                    plug = %self.plug_full_name(plug),
                    have = count,
                    got = values.len(),
                    "compound length mismatch, write skipped"
                );
                return Ok(());
            }
            for (i, v) in values.into_iter().enumerate() {
                self.set_plug_value(&plug.child_at(i), v)?;
            }
            return Ok(());
        }
        if ty == crate::attr::AttrType::Message {
            return Err(Error::mismatch("a value-bearing plug", "message"));
        }
        let raw = value.scalar()?;
        let coerced = Value::coerce(ty, raw).map_err(|e| {
            debug!(plug = %self.plug_full_name(plug), error = %e, "rejected plug write");
            e
        })?;
        let name = self.plug_full_name(plug);
        let state = self.plug_state_mut(plug)?;
        if state.locked {
            return Err(Error::PlugLocked(name));
        }
        state.value = coerced;
        Ok(())
    }

    /// Whether a plug still holds its default.
    ///
    /// Array roots are default when empty; compounds when every child is
    /// default; message plugs are always default.
    pub fn is_default(&self, plug: &Plug) -> Result<bool> {
        if self.is_array_root(plug)? {
            return Ok(self.plug_state(plug)?.elements.is_empty());
        }
        let def = self.attr_def(plug)?;
        if !def.children.is_empty() {
            for i in 0..def.children.len() {
                if !self.is_default(&plug.child_at(i))? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        if def.ty == crate::attr::AttrType::Message {
            return Ok(true);
        }
        let default = def.default.clone();
        Ok(self.plug_state(plug)?.value == default)
    }

    /// The plug's declared default value.
    pub fn plug_default(&self, plug: &Plug) -> Result<Value> {
        Ok(self.attr_def(plug)?.default.clone())
    }

    /// Redefine the plug's default. Only value-bearing leaf types accept a
    /// default; structural plugs reject the write.
    pub fn set_plug_default(&mut self, plug: &Plug, value: Value) -> Result<()> {
        let def = self.attr_def(plug)?;
        match def.ty.category() {
            AttrCategory::Compound | AttrCategory::Message => {
                let e = Error::mismatch("a value-bearing plug", def.ty.name());
                debug!(plug = %self.plug_full_name(plug), error = %e, "rejected default write");
                return Err(e);
            }
            _ => {}
        }
        let ty = def.ty;
        let coerced = Value::coerce(ty, value).map_err(|e| {
            debug!(plug = %self.plug_full_name(plug), error = %e, "rejected default write");
            e
        })?;
        let parts = coerced.components();
        self.attr_def_mut(plug)?.default = coerced;
        // Tuple defaults live on the component children as well.
        if let Some(parts) = parts {
            let count = self.attr_def(plug)?.children.len();
            for (i, part) in parts.into_iter().enumerate().take(count) {
                self.attr_def_mut(&plug.child_at(i))?.default = part;
            }
        }
        Ok(())
    }

    pub fn plug_min(&self, plug: &Plug) -> Result<Option<f64>> {
        Ok(self.attr_def(plug)?.min)
    }

    pub fn plug_max(&self, plug: &Plug) -> Result<Option<f64>> {
        Ok(self.attr_def(plug)?.max)
    }

    pub fn plug_soft_min(&self, plug: &Plug) -> Result<Option<f64>> {
        Ok(self.attr_def(plug)?.soft_min)
    }

    pub fn plug_soft_max(&self, plug: &Plug) -> Result<Option<f64>> {
        Ok(self.attr_def(plug)?.soft_max)
    }

    /// Set the hard minimum. Returns false (and leaves the plug untouched)
    /// when bounds do not apply to the attribute's type.
    pub fn set_plug_min(&mut self, plug: &Plug, value: f64) -> Result<bool> {
        self.set_bound(plug, value, |d, v| d.min = Some(v))
    }

    pub fn set_plug_max(&mut self, plug: &Plug, value: f64) -> Result<bool> {
        self.set_bound(plug, value, |d, v| d.max = Some(v))
    }

    pub fn set_plug_soft_min(&mut self, plug: &Plug, value: f64) -> Result<bool> {
        self.set_bound(plug, value, |d, v| d.soft_min = Some(v))
    }

    pub fn set_plug_soft_max(&mut self, plug: &Plug, value: f64) -> Result<bool> {
        self.set_bound(plug, value, |d, v| d.soft_max = Some(v))
    }

    fn set_bound(
        &mut self,
        plug: &Plug,
        value: f64,
        apply: impl FnOnce(&mut AttrDef, f64),
    ) -> Result<bool> {
        let def = self.attr_def(plug)?;
        if !def.ty.has_bounds() {
            debug!(
                plug = %self.plug_full_name(plug),
                ty = %def.ty,
                "bounds not supported, skipped"
            );
            return Ok(false);
        }
        apply(self.attr_def_mut(plug)?, value);
        Ok(true)
    }

    pub fn is_locked(&self, plug: &Plug) -> Result<bool> {
        Ok(self.plug_state(plug)?.locked)
    }

    pub fn set_locked(&mut self, plug: &Plug, locked: bool) -> Result<()> {
        self.plug_state_mut(plug)?.locked = locked;
        Ok(())
    }

    pub fn is_keyable(&self, plug: &Plug) -> Result<bool> {
        Ok(self.plug_state(plug)?.keyable)
    }

    pub fn set_keyable(&mut self, plug: &Plug, keyable: bool) -> Result<()> {
        self.plug_state_mut(plug)?.keyable = keyable;
        Ok(())
    }

    pub fn is_channel_box(&self, plug: &Plug) -> Result<bool> {
        Ok(self.plug_state(plug)?.channel_box)
    }

    pub fn set_channel_box(&mut self, plug: &Plug, on: bool) -> Result<()> {
        self.plug_state_mut(plug)?.channel_box = on;
        Ok(())
    }

    /// Logical indices of an array plug's existing elements, in order.
    pub fn element_indices(&self, plug: &Plug) -> Result<Vec<u32>> {
        if !self.is_array_root(plug)? {
            return Err(Error::mismatch("array plug", self.plug_name(plug)));
        }
        Ok(self.plug_state(plug)?.elements.keys().copied().collect())
    }

    /// All plugs strictly below this one: array elements, compound children,
    /// recursively, in depth-first order.
    pub fn iter_plug_children(&self, plug: &Plug) -> Result<Vec<Plug>> {
        let mut out = Vec::new();
        self.collect_plug_children(plug, &mut out)?;
        Ok(out)
    }

    fn collect_plug_children(&self, plug: &Plug, out: &mut Vec<Plug>) -> Result<()> {
        if self.is_array_root(plug)? {
            for idx in self.element_indices(plug)? {
                let el = plug.element(idx);
                out.push(el.clone());
                self.collect_plug_children(&el, out)?;
            }
            return Ok(());
        }
        let count = self.attr_def(plug)?.children.len();
        for i in 0..count {
            let child = plug.child_at(i);
            out.push(child.clone());
            self.collect_plug_children(&child, out)?;
        }
        Ok(())
    }

    /// Root attribute plugs of a node, in declaration order.
    pub fn iter_plugs(&self, node: NodeId) -> Result<Vec<Plug>> {
        let node_ref = self.node(node)?;
        Ok(node_ref
            .attrs
            .iter()
            .map(|a| Plug::new(node, a.def.long_name.clone()))
            .collect())
    }

    /// First array element (by logical index) with no incoming connection.
    ///
    /// Indexes past the end of the existing elements when every element is
    /// taken; the element itself is only created on first write or connect.
    pub fn next_available_element_plug(&self, plug: &Plug) -> Result<Plug> {
        let state = self.plug_state(plug)?;
        if !self.is_array_root(plug)? {
            return Err(Error::mismatch("array plug", self.plug_name(plug)));
        }
        let mut idx = 0u32;
        for (i, el) in &state.elements {
            if el.source.is_none() {
                return Ok(plug.element(*i));
            }
            idx = *i + 1;
        }
        Ok(plug.element(idx))
    }

    /// Like [`SceneGraph::next_available_element_plug`], but for arrays of
    /// compounds: an element counts as taken when any child has a source.
    pub fn next_available_dest_element_plug(&self, plug: &Plug) -> Result<Plug> {
        let state = self.plug_state(plug)?;
        if !self.is_array_root(plug)? {
            return Err(Error::mismatch("array plug", self.plug_name(plug)));
        }
        let mut idx = 0u32;
        for (i, el) in &state.elements {
            let taken =
                el.source.is_some() || el.children.iter().any(|c| c.source.is_some());
            if !taken {
                return Ok(plug.element(*i));
            }
            idx = *i + 1;
        }
        Ok(plug.element(idx))
    }

    /// Remove one array element, breaking any connections under it first.
    pub fn remove_element_plug(&mut self, plug: &Plug) -> Result<()> {
        let Some(PlugSeg::Element(idx)) = plug.path.segs.last().copied() else {
            return Err(Error::mismatch("array element plug", self.plug_name(plug)));
        };
        // Break edges on the element and everything below it.
        let mut doomed = vec![plug.clone()];
        doomed.extend(self.iter_plug_children(plug)?);
        for p in &doomed {
            self.break_edges(p)?;
        }
        let mut parent = plug.clone();
        parent.path.segs.pop();
        let state = self.plug_state_mut(&parent)?;
        state.elements.remove(&idx);
        Ok(())
    }

    /// Run `f` with the plug temporarily unlocked, restoring the previous
    /// lock state afterwards even when `f` fails.
    pub fn with_unlocked<T>(
        &mut self,
        plug: &Plug,
        f: impl FnOnce(&mut SceneGraph) -> Result<T>,
    ) -> Result<T> {
        let was_locked = self.is_locked(plug)?;
        self.set_locked(plug, false)?;
        let result = f(self);
        // Restore even if the closure deleted the plug's node.
        if self.is_valid(plug.node) {
            self.set_locked(plug, was_locked)?;
        }
        result
    }
}

fn split_index(token: &str) -> Result<(&str, Option<u32>)> {
    match token.find('[') {
        None => Ok((token, None)),
        Some(open) => {
            let close = token
                .rfind(']')
                .ok_or_else(|| Error::PlugNotFound(token.to_string()))?;
            let idx = token[open + 1..close]
                .parse::<u32>()
                .map_err(|_| Error::PlugNotFound(token.to_string()))?;
            Ok((&token[..open], Some(idx)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttrSpec, AttrType};

    fn graph_with_node() -> (SceneGraph, NodeId) {
        let mut g = SceneGraph::new();
        let n = g.create_dg_node("pose", "network").unwrap();
        (g, n)
    }

    #[test]
    fn test_leaf_read_write() {
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("blend", AttrType::Double))
            .unwrap();
        assert!(g.is_default(&plug).unwrap());
        g.set_plug_value(&plug, Value::Double(0.75)).unwrap();
        assert_eq!(
            g.plug_value(&plug).unwrap(),
            PlugValue::Scalar(Value::Double(0.75))
        );
        assert!(!g.is_default(&plug).unwrap());
    }

    #[test]
    fn test_locked_write_rejected() {
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("blend", AttrType::Double))
            .unwrap();
        g.set_locked(&plug, true).unwrap();
        let err = g.set_plug_value(&plug, Value::Double(1.0)).unwrap_err();
        assert!(matches!(err, Error::PlugLocked(_)));
        // scoped unlock restores the lock
        g.with_unlocked(&plug, |g| g.set_plug_value(&plug, Value::Double(1.0)))
            .unwrap();
        assert!(g.is_locked(&plug).unwrap());
        assert_eq!(
            g.plug_value(&plug).unwrap().scalar().unwrap(),
            Value::Double(1.0)
        );
    }

    #[test]
    fn test_compound_positional_write() {
        let (mut g, n) = graph_with_node();
        let spec = AttrSpec::new("limits", AttrType::Compound)
            .child(AttrSpec::new("lo", AttrType::Double))
            .child(AttrSpec::new("hi", AttrType::Double));
        let plug = g.add_compound_attribute(n, &spec).unwrap();
        g.set_plug_value(
            &plug,
            PlugValue::Many(vec![
                Value::Double(-1.0).into(),
                Value::Double(1.0).into(),
            ]),
        )
        .unwrap();
        let lo = g.find_plug(n, "limits.lo").unwrap();
        assert_eq!(
            g.plug_value(&lo).unwrap().scalar().unwrap(),
            Value::Double(-1.0)
        );
        // length mismatch: silent no-op
        g.set_plug_value(&plug, PlugValue::Many(vec![Value::Double(9.0).into()]))
            .unwrap();
        assert_eq!(
            g.plug_value(&lo).unwrap().scalar().unwrap(),
            Value::Double(-1.0)
        );
    }

    #[test]
    fn test_tuple_parent_and_children_stay_in_sync() {
        use crate::util::math::DVec3;
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("offset", AttrType::Double3))
            .unwrap();
        g.set_plug_value(&plug, Value::Double3(DVec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let y = g.find_plug(n, "offset.offsetY").unwrap();
        assert_eq!(
            g.plug_value(&y).unwrap().scalar().unwrap(),
            Value::Double(2.0)
        );
        // a component write reads back through the parent
        g.set_plug_value(&y, Value::Double(5.0)).unwrap();
        assert_eq!(
            g.plug_value(&plug).unwrap().scalar().unwrap(),
            Value::Double3(DVec3::new(1.0, 5.0, 3.0))
        );
        assert!(!g.is_default(&plug).unwrap());
        // a new default covers parent and children
        g.set_plug_default(&plug, Value::Double3(DVec3::new(1.0, 5.0, 3.0)))
            .unwrap();
        assert!(g.is_default(&plug).unwrap());
        assert_eq!(g.plug_default(&y).unwrap(), Value::Double(5.0));
    }

    #[test]
    fn test_non_writable_rejects_writes() {
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("output", AttrType::Double).writable(false))
            .unwrap();
        let err = g.set_plug_value(&plug, Value::Double(1.0)).unwrap_err();
        assert!(matches!(err, Error::NotWritable(_)));
    }

    #[test]
    fn test_sparse_array_elements() {
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("weights", AttrType::Double).array(true))
            .unwrap();
        assert!(g.is_default(&plug).unwrap());
        g.set_plug_value(&plug.element(4), Value::Double(0.4)).unwrap();
        g.set_plug_value(&plug.element(1), Value::Double(0.1)).unwrap();
        assert_eq!(g.element_indices(&plug).unwrap(), vec![1, 4]);
        assert_eq!(
            g.plug_value(&plug).unwrap(),
            PlugValue::Many(vec![
                Value::Double(0.1).into(),
                Value::Double(0.4).into()
            ])
        );
        g.remove_element_plug(&plug.element(1)).unwrap();
        assert_eq!(g.element_indices(&plug).unwrap(), vec![4]);
    }

    #[test]
    fn test_find_plug_paths() {
        let (mut g, n) = graph_with_node();
        let spec = AttrSpec::new("targets", AttrType::Compound)
            .array(true)
            .child(AttrSpec::new("weight", AttrType::Double).short_name("w"))
            .child(AttrSpec::new("shape", AttrType::Message));
        g.add_compound_attribute(n, &spec).unwrap();
        let p = g.find_plug(n, "targets[2].w").unwrap();
        assert_eq!(g.plug_name(&p), "targets[2].weight");
        assert_eq!(g.type_of(&p).unwrap(), AttrType::Double);
        assert!(g.find_plug(n, "targets[0].missing").is_err());
    }

    #[test]
    fn test_type_mismatch_on_write() {
        let (mut g, n) = graph_with_node();
        let plug = g
            .add_attribute(n, &AttrSpec::new("label", AttrType::String))
            .unwrap();
        let err = g.set_plug_value(&plug, Value::Double(1.0)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_bounds_only_on_scalars() {
        let (mut g, n) = graph_with_node();
        let d = g
            .add_attribute(n, &AttrSpec::new("amount", AttrType::Double))
            .unwrap();
        assert!(g.set_plug_min(&d, 0.0).unwrap());
        assert_eq!(g.plug_min(&d).unwrap(), Some(0.0));
        let s = g
            .add_attribute(n, &AttrSpec::new("label", AttrType::String))
            .unwrap();
        assert!(!g.set_plug_min(&s, 0.0).unwrap());
    }

    #[test]
    fn test_next_available_element() {
        let (mut g, n) = graph_with_node();
        let arr = g
            .add_attribute(n, &AttrSpec::new("inputs", AttrType::Message).array(true))
            .unwrap();
        let first = g.next_available_element_plug(&arr).unwrap();
        assert_eq!(first, arr.element(0));
        let m = g.create_dg_node("driver", "network").unwrap();
        let src = Plug::new(m, "message");
        g.connect(&src, &arr.element(0), false, None).unwrap();
        let next = g.next_available_element_plug(&arr).unwrap();
        assert_eq!(next, arr.element(1));
    }
}
