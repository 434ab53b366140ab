//! The scene graph: node storage, hierarchy and naming.
//!
//! `SceneGraph` owns every node and hands out opaque [`NodeId`] handles.
//! DAG nodes form a forest addressed by `|`-separated full paths; dependency
//! nodes live outside the hierarchy. All mutation goes through the graph.

use std::collections::HashMap;

use tracing::debug;

use crate::attr::{AttrSpec, AttrType};
use crate::scene::node::{Attribute, AttrDef, DagData, NodeId, SceneNode};
use crate::scene::plug::Plug;
use crate::scene::registry::TypeRegistry;
use crate::util::{Error, Result};

/// Retained scene graph.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, SceneNode>,
    /// Creation order, for deterministic iteration.
    order: Vec<NodeId>,
    /// DAG roots in creation order.
    roots: Vec<NodeId>,
    next_id: u64,
    pub registry: TypeRegistry,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Empty graph with the built-in node types.
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::with_builtins())
    }

    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            roots: Vec::new(),
            next_id: 1,
            registry,
        }
    }

    /// Whether a handle still refers to a live node.
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))
    }

    /// All nodes in creation order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    fn alloc(&mut self, name: &str, type_name: &str, dag: bool) -> Result<NodeId> {
        let type_def = self.registry.get(type_name)?;
        let plugin = type_def.plugin.clone();
        let mut attrs = Vec::with_capacity(type_def.attrs.len() + 1);
        // Every node carries an implicit message plug.
        attrs.push(Attribute::new(AttrDef::from_spec(
            &AttrSpec::new("message", AttrType::Message).short_name("msg"),
            false,
        )));
        for spec in &type_def.attrs {
            attrs.push(Attribute::new(AttrDef::from_spec(spec, false)));
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SceneNode {
                id,
                name: name.to_string(),
                type_name: type_name.to_string(),
                plugin,
                locked: false,
                dag: dag.then(DagData::default),
                attrs,
            },
        );
        self.order.push(id);
        Ok(id)
    }

    /// Create a DAG node, optionally parented.
    pub fn create_dag_node(
        &mut self,
        name: &str,
        type_name: &str,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        if !self.registry.get(type_name)?.is_dag {
            return Err(Error::NotADagNode(type_name.to_string()));
        }
        let id = self.alloc(name, type_name, true)?;
        match parent {
            Some(p) => {
                self.node(p)?;
                self.attach(id, p);
            }
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Create a dependency (non-DAG) node.
    pub fn create_dg_node(&mut self, name: &str, type_name: &str) -> Result<NodeId> {
        if self.registry.get(type_name)?.is_dag {
            return Err(Error::other(format!(
                "'{type_name}' is a DAG type, use create_dag_node"
            )));
        }
        self.alloc(name, type_name, false)
    }

    /// Load a plugin through the registry.
    pub fn load_plugin(&mut self, plugin: &str) -> Result<()> {
        self.registry.load_plugin(plugin)
    }

    fn attach(&mut self, child: NodeId, parent: NodeId) {
        if let Some(dag) = self.nodes.get_mut(&child).and_then(|n| n.dag.as_mut()) {
            dag.parent = Some(parent);
        }
        if let Some(dag) = self.nodes.get_mut(&parent).and_then(|n| n.dag.as_mut()) {
            dag.children.push(child);
        }
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self
            .nodes
            .get(&child)
            .and_then(|n| n.dag.as_ref())
            .and_then(|d| d.parent);
        match parent {
            Some(p) => {
                if let Some(dag) = self.nodes.get_mut(&p).and_then(|n| n.dag.as_mut()) {
                    dag.children.retain(|c| *c != child);
                }
                if let Some(dag) = self.nodes.get_mut(&child).and_then(|n| n.dag.as_mut()) {
                    dag.parent = None;
                }
            }
            None => self.roots.retain(|r| *r != child),
        }
    }

    /// Parent of a DAG node, `None` at a root (or for DG nodes).
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.dag.as_ref().and_then(|d| d.parent))
    }

    /// Reparent a DAG node. `new_parent = None` moves it to the root level.
    ///
    /// Returns false without touching the graph when the node is already
    /// under `new_parent` or the parent equals the child. With
    /// `maintain_offset` the node's world transform is preserved across the
    /// move.
    pub fn set_parent(
        &mut self,
        child: NodeId,
        new_parent: Option<NodeId>,
        maintain_offset: bool,
    ) -> Result<bool> {
        let current = self.parent(child)?;
        if new_parent == Some(child) || current == new_parent {
            return Ok(false);
        }
        if let Some(p) = new_parent {
            if self.node(p)?.dag.is_none() {
                return Err(Error::NotADagNode(self.node(p)?.name.clone()));
            }
            // Reject cycles: the new parent may not live under the child.
            let mut walk = Some(p);
            while let Some(n) = walk {
                if n == child {
                    return Err(Error::other(format!(
                        "cannot parent '{}' under its own descendant",
                        self.node(child)?.name
                    )));
                }
                walk = self.parent(n)?;
            }
        }
        let world = if maintain_offset {
            Some(self.world_matrix(child)?)
        } else {
            None
        };
        self.detach(child);
        match new_parent {
            Some(p) => self.attach(child, p),
            None => self.roots.push(child),
        }
        if let Some(world) = world {
            self.set_matrix(child, &world, crate::util::Space::World)?;
        }
        Ok(true)
    }

    /// Walk from a node's parent up to its root.
    pub fn iter_parents(&self, id: NodeId) -> AncestorIter<'_> {
        let first = self
            .nodes
            .get(&id)
            .and_then(|n| n.dag.as_ref())
            .and_then(|d| d.parent);
        AncestorIter { graph: self, next: first }
    }

    /// Topmost ancestor of a DAG node (itself when already a root).
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        self.node(id)?;
        Ok(self.iter_parents(id).last().unwrap_or(id))
    }

    /// Children of a DAG node in pre-order.
    ///
    /// With a type `filter`, a non-matching child is skipped along with its
    /// entire subtree. Without `recursive`, only direct children are visited.
    pub fn iter_children(
        &self,
        id: NodeId,
        recursive: bool,
        filter: Option<&[&str]>,
    ) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        self.collect_children(id, recursive, filter, &mut out)?;
        Ok(out)
    }

    fn collect_children(
        &self,
        id: NodeId,
        recursive: bool,
        filter: Option<&[&str]>,
        out: &mut Vec<NodeId>,
    ) -> Result<()> {
        let children = match &self.node(id)?.dag {
            Some(d) => d.children.clone(),
            None => return Ok(()),
        };
        for child in children {
            let type_name = &self.node(child)?.type_name;
            if let Some(types) = filter {
                if !types.contains(&type_name.as_str()) {
                    continue;
                }
            }
            out.push(child);
            if recursive {
                self.collect_children(child, true, filter, out)?;
            }
        }
        Ok(())
    }

    /// Full `|`-separated DAG path of a node ("|root|spine|chest").
    /// Dependency nodes have no path and return their plain name.
    ///
    /// With `include_namespace = false` each segment's namespace prefix is
    /// stripped.
    pub fn full_name(&self, id: NodeId, include_namespace: bool) -> Result<String> {
        let node = self.node(id)?;
        if node.dag.is_none() {
            return Ok(strip_ns(&node.name, include_namespace));
        }
        let mut segments = vec![strip_ns(&node.name, include_namespace)];
        for ancestor in self.iter_parents(id) {
            segments.push(strip_ns(&self.node(ancestor)?.name, include_namespace));
        }
        segments.reverse();
        Ok(format!("|{}", segments.join("|")))
    }

    /// Shortest unambiguous name: the plain name when unique in the scene,
    /// otherwise the full path.
    pub fn partial_name(&self, id: NodeId) -> Result<String> {
        let name = &self.node(id)?.name;
        let count = self
            .order
            .iter()
            .filter(|n| self.nodes.get(n).map(|n| &n.name) == Some(name))
            .count();
        if count <= 1 {
            Ok(name.clone())
        } else {
            self.full_name(id, true)
        }
    }

    /// Resolve a name to a node handle.
    ///
    /// A leading `|` means an exact full-path lookup. A bare name matches any
    /// node with that short name; zero matches is an error, more than one is
    /// ambiguous.
    pub fn resolve_node(&self, name: &str) -> Result<NodeId> {
        if let Some(stripped) = name.strip_prefix('|') {
            let mut current: Option<NodeId> = None;
            for segment in stripped.split('|') {
                let candidates: Vec<NodeId> = match current {
                    None => self
                        .roots
                        .iter()
                        .copied()
                        .filter(|r| self.nodes.get(r).map(|n| n.name.as_str()) == Some(segment))
                        .collect(),
                    Some(parent) => self
                        .node(parent)?
                        .dag
                        .as_ref()
                        .map(|d| {
                            d.children
                                .iter()
                                .copied()
                                .filter(|c| {
                                    self.nodes.get(c).map(|n| n.name.as_str()) == Some(segment)
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                };
                match candidates.len() {
                    0 => return Err(Error::NodeNotFound(name.to_string())),
                    1 => current = Some(candidates[0]),
                    _ => return Err(Error::AmbiguousName(name.to_string())),
                }
            }
            return current.ok_or_else(|| Error::NodeNotFound(name.to_string()));
        }
        let matches: Vec<NodeId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.nodes.get(id).map(|n| n.name.as_str()) == Some(name))
            .collect();
        match matches.len() {
            0 => Err(Error::NodeNotFound(name.to_string())),
            1 => Ok(matches[0]),
            _ => Err(Error::AmbiguousName(name.to_string())),
        }
    }

    /// Resolve a "node.attrPath" string to a plug.
    pub fn resolve_plug(&self, name: &str) -> Result<Plug> {
        let (node_name, attr_path) = name
            .split_once('.')
            .ok_or_else(|| Error::PlugNotFound(name.to_string()))?;
        let node = self.resolve_node(node_name)?;
        self.find_plug(node, attr_path)
    }

    /// Rename a node. Names may carry a namespace prefix ("rig:hips").
    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<()> {
        if self.node(id)?.locked {
            return Err(Error::other(format!(
                "cannot rename locked node '{}'",
                self.node(id)?.name
            )));
        }
        self.node_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Lock or unlock a node. Locked nodes cannot be renamed or deleted.
    pub fn lock_node(&mut self, id: NodeId, locked: bool) -> Result<()> {
        self.node_mut(id)?.locked = locked;
        Ok(())
    }

    pub fn is_node_locked(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.locked)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.node(id)?.has_attr(name))
    }

    /// Lock or unlock a batch of root attributes by name.
    pub fn set_lock_state_on_attributes(
        &mut self,
        id: NodeId,
        names: &[&str],
        locked: bool,
    ) -> Result<()> {
        for name in names {
            let plug = self.find_plug(id, name)?;
            self.set_locked(&plug, locked)?;
        }
        Ok(())
    }

    /// Toggle channel-box visibility (and keyable state) for a batch of
    /// root attributes.
    pub fn show_hide_attributes(&mut self, id: NodeId, names: &[&str], show: bool) -> Result<()> {
        for name in names {
            let plug = self.find_plug(id, name)?;
            self.set_channel_box(&plug, show)?;
            self.set_keyable(&plug, show)?;
        }
        Ok(())
    }

    /// Dynamic (runtime-added) root attribute plugs of a node, optionally
    /// restricted to one type tag.
    pub fn iter_extra_attributes(
        &self,
        id: NodeId,
        type_filter: Option<AttrType>,
    ) -> Result<Vec<Plug>> {
        let node = self.node(id)?;
        Ok(node
            .attrs
            .iter()
            .filter(|a| a.def.is_dynamic)
            .filter(|a| type_filter.map_or(true, |t| a.def.ty == t))
            .map(|a| Plug::new(id, a.def.long_name.clone()))
            .collect())
    }

    /// Delete a node and, for DAG nodes, its whole subtree.
    ///
    /// The node is unlocked first and every connection touching the subtree
    /// is broken (far ends are unlocked as needed). Deleting an already
    /// invalid handle is a no-op.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        if !self.is_valid(id) {
            return Ok(());
        }
        let mut doomed = vec![id];
        doomed.extend(self.iter_children(id, true, None)?);
        // Children first so surviving mirror edges never point at a gone node.
        for node in doomed.iter().rev().copied() {
            self.lock_node(node, false)?;
            for plug in self.iter_plugs(node)? {
                self.break_edges(&plug)?;
                for child in self.iter_plug_children(&plug)? {
                    self.break_edges(&child)?;
                }
            }
            self.detach(node);
            self.nodes.remove(&node);
            self.order.retain(|n| *n != node);
            debug!(node = %node, "deleted node");
        }
        Ok(())
    }
}

fn strip_ns(name: &str, include_namespace: bool) -> String {
    if include_namespace {
        name.to_string()
    } else {
        name.rsplit(':').next().unwrap_or(name).to_string()
    }
}

/// Iterator over a node's ancestors, nearest first.
pub struct AncestorIter<'a> {
    graph: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self
            .graph
            .nodes
            .get(&current)
            .and_then(|n| n.dag.as_ref())
            .and_then(|d| d.parent);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(g: &mut SceneGraph) -> (NodeId, NodeId, NodeId) {
        let root = g.create_dag_node("root", "transform", None).unwrap();
        let mid = g.create_dag_node("spine", "transform", Some(root)).unwrap();
        let tip = g.create_dag_node("chest", "transform", Some(mid)).unwrap();
        (root, mid, tip)
    }

    #[test]
    fn test_full_and_partial_names() {
        let mut g = SceneGraph::new();
        let (_, _, tip) = chain(&mut g);
        assert_eq!(g.full_name(tip, true).unwrap(), "|root|spine|chest");
        assert_eq!(g.partial_name(tip).unwrap(), "chest");
        let other = g.create_dag_node("chest", "transform", None).unwrap();
        assert_eq!(g.partial_name(other).unwrap(), "|chest");
    }

    #[test]
    fn test_namespace_stripping() {
        let mut g = SceneGraph::new();
        let root = g.create_dag_node("rig:root", "transform", None).unwrap();
        let child = g
            .create_dag_node("rig:hips", "transform", Some(root))
            .unwrap();
        assert_eq!(g.full_name(child, true).unwrap(), "|rig:root|rig:hips");
        assert_eq!(g.full_name(child, false).unwrap(), "|root|hips");
    }

    #[test]
    fn test_resolve_node() {
        let mut g = SceneGraph::new();
        let (root, mid, tip) = chain(&mut g);
        assert_eq!(g.resolve_node("spine").unwrap(), mid);
        assert_eq!(g.resolve_node("|root|spine|chest").unwrap(), tip);
        assert!(matches!(
            g.resolve_node("missing"),
            Err(Error::NodeNotFound(_))
        ));
        let dup = g.create_dag_node("spine", "transform", Some(root)).unwrap();
        assert!(matches!(
            g.resolve_node("spine"),
            Err(Error::AmbiguousName(_))
        ));
        let _ = dup;
    }

    #[test]
    fn test_reparent_and_cycle_guard() {
        let mut g = SceneGraph::new();
        let (root, mid, tip) = chain(&mut g);
        assert!(!g.set_parent(mid, Some(root), false).unwrap());
        assert!(g.set_parent(tip, Some(root), false).unwrap());
        assert_eq!(g.parent(tip).unwrap(), Some(root));
        assert!(g.set_parent(root, Some(tip), false).is_err());
        assert!(!g.set_parent(root, Some(root), false).unwrap());
        assert!(g.set_parent(tip, None, false).unwrap());
        assert_eq!(g.parent(tip).unwrap(), None);
        assert_eq!(g.root_of(mid).unwrap(), root);
    }

    #[test]
    fn test_iter_children_filter_prunes_subtree() {
        let mut g = SceneGraph::new();
        let (root, mid, tip) = chain(&mut g);
        let all = g.iter_children(root, true, None).unwrap();
        assert_eq!(all, vec![mid, tip]);
        // non-matching child prunes its whole subtree
        let none = g.iter_children(root, true, Some(&["network"])).unwrap();
        assert!(none.is_empty());
        let direct = g.iter_children(root, false, None).unwrap();
        assert_eq!(direct, vec![mid]);
    }

    #[test]
    fn test_delete_subtree_invalidates_handles() {
        let mut g = SceneGraph::new();
        let (root, mid, tip) = chain(&mut g);
        g.delete(mid).unwrap();
        assert!(g.is_valid(root));
        assert!(!g.is_valid(mid));
        assert!(!g.is_valid(tip));
        // deleting again is a no-op
        g.delete(mid).unwrap();
        assert!(g.iter_children(root, true, None).unwrap().is_empty());
    }

    #[test]
    fn test_locked_node_rename() {
        let mut g = SceneGraph::new();
        let n = g.create_dg_node("meta", "network").unwrap();
        g.lock_node(n, true).unwrap();
        assert!(g.rename(n, "meta2").is_err());
        g.lock_node(n, false).unwrap();
        g.rename(n, "meta2").unwrap();
        assert_eq!(g.node(n).unwrap().name, "meta2");
    }
}
