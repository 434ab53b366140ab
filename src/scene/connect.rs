//! Connection management.
//!
//! Connections are directed plug-to-plug edges with single-writer semantics:
//! a destination holds at most one incoming source, while a source fans out
//! to any number of destinations. Edits either apply immediately or queue
//! into an [`EditBatch`] that replays them in order.

use tracing::debug;

use crate::scene::node::NodeId;
use crate::scene::plug::{Plug, PlugSeg};
use crate::scene::SceneGraph;
use crate::util::{Error, Result};

/// One deferred connection edit.
#[derive(Clone, Debug)]
pub enum GraphEdit {
    Connect {
        source: Plug,
        destination: Plug,
        force: bool,
    },
    Disconnect {
        plug: Plug,
        source: bool,
        destination: bool,
    },
}

/// An ordered queue of connection edits, applied in one shot.
#[derive(Debug, Default)]
pub struct EditBatch {
    edits: Vec<GraphEdit>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn push(&mut self, edit: GraphEdit) {
        self.edits.push(edit);
    }

    /// Apply all queued edits in order, draining the batch.
    pub fn apply(&mut self, graph: &mut SceneGraph) -> Result<()> {
        for edit in self.edits.drain(..) {
            match edit {
                GraphEdit::Connect {
                    source,
                    destination,
                    force,
                } => graph.do_connect(&source, &destination, force)?,
                GraphEdit::Disconnect {
                    plug,
                    source,
                    destination,
                } => {
                    graph.do_disconnect(&plug, source, destination)?;
                }
            }
        }
        Ok(())
    }
}

impl SceneGraph {
    /// Connect `source` into `destination`.
    ///
    /// With `force`, an existing incoming connection on the destination is
    /// broken first; without it the conflict is an error. With a batch the
    /// edit is queued instead of applied.
    pub fn connect(
        &mut self,
        source: &Plug,
        destination: &Plug,
        force: bool,
        batch: Option<&mut EditBatch>,
    ) -> Result<()> {
        if let Some(batch) = batch {
            batch.push(GraphEdit::Connect {
                source: source.clone(),
                destination: destination.clone(),
                force,
            });
            return Ok(());
        }
        self.do_connect(source, destination, force)
    }

    fn do_connect(&mut self, source: &Plug, destination: &Plug, force: bool) -> Result<()> {
        for plug in [source, destination] {
            if !self.attr_def(plug)?.connectable {
                return Err(Error::NotConnectable(self.plug_full_name(plug)));
            }
            // materialize array elements addressed for the first time
            self.plug_state_mut(plug)?;
        }
        if self.is_locked(destination)? {
            return Err(Error::PlugLocked(self.plug_full_name(destination)));
        }
        if let Some(existing) = self.plug_state(destination)?.source.clone() {
            if existing == *source {
                return Ok(());
            }
            if !force {
                return Err(Error::ConnectionConflict {
                    destination: self.plug_full_name(destination),
                    current: self.plug_full_name(&existing),
                });
            }
            self.remove_edge(&existing, destination);
        }
        self.plug_state_mut(destination)?.source = Some(source.clone());
        self.plug_state_mut(source)?.destinations.push(destination.clone());
        debug!(
            source = %self.plug_full_name(source),
            destination = %self.plug_full_name(destination),
            "connected"
        );
        Ok(())
    }

    /// Break the incoming and/or outgoing connections of a plug.
    ///
    /// The plug and the far ends are unlocked first and stay unlocked.
    /// Returns whether any edge was removed. With a batch the edit is queued
    /// and `true` is returned optimistically.
    pub fn disconnect(
        &mut self,
        plug: &Plug,
        source: bool,
        destination: bool,
        batch: Option<&mut EditBatch>,
    ) -> Result<bool> {
        if let Some(batch) = batch {
            batch.push(GraphEdit::Disconnect {
                plug: plug.clone(),
                source,
                destination,
            });
            return Ok(true);
        }
        self.do_disconnect(plug, source, destination)
    }

    fn do_disconnect(&mut self, plug: &Plug, source: bool, destination: bool) -> Result<bool> {
        self.set_locked(plug, false)?;
        let mut removed = false;
        if source {
            if let Some(src) = self.plug_state(plug)?.source.clone() {
                if self.is_valid(src.node) {
                    self.set_locked(&src, false)?;
                }
                self.remove_edge(&src, plug);
                removed = true;
            }
        }
        if destination {
            for dst in self.plug_state(plug)?.destinations.clone() {
                if self.is_valid(dst.node) {
                    self.set_locked(&dst, false)?;
                }
                self.remove_edge(plug, &dst);
                removed = true;
            }
        }
        Ok(removed)
    }

    /// Remove one edge, tolerating far ends on already-deleted nodes.
    pub(crate) fn remove_edge(&mut self, source: &Plug, destination: &Plug) {
        if let Ok(state) = self.plug_state_mut(destination) {
            if state.source.as_ref() == Some(source) {
                state.source = None;
            }
        }
        if let Ok(state) = self.plug_state_mut(source) {
            state.destinations.retain(|d| d != destination);
        }
    }

    /// Break every edge touching a plug, unlocking far ends.
    pub(crate) fn break_edges(&mut self, plug: &Plug) -> Result<()> {
        let state = match self.plug_state(plug) {
            Ok(s) => s,
            Err(_) => return Ok(()),
        };
        let source = state.source.clone();
        let destinations = state.destinations.clone();
        if let Some(src) = source {
            self.remove_edge(&src, plug);
        }
        for dst in destinations {
            if self.is_valid(dst.node) {
                self.set_locked(&dst, false)?;
            }
            self.remove_edge(plug, &dst);
        }
        Ok(())
    }

    /// Connect two vector (compound) plugs component-wise.
    ///
    /// `axes` holds one flag per child: flagged children are connected,
    /// unflagged children have any existing incoming connection on the
    /// destination child broken. When every axis is flagged the parent plugs
    /// are connected directly.
    pub fn connect_vector(
        &mut self,
        source: &Plug,
        destination: &Plug,
        axes: &[bool],
        force: bool,
        mut batch: Option<&mut EditBatch>,
    ) -> Result<()> {
        if axes.iter().all(|a| *a) {
            return self.connect(source, destination, force, batch);
        }
        let src_count = self.attr_def(source)?.children.len();
        let dst_count = self.attr_def(destination)?.children.len();
        for count in [src_count, dst_count] {
            if axes.len() > count {
                return Err(Error::ChildOutOfBounds {
                    index: axes.len() - 1,
                    count,
                });
            }
        }
        for (i, on) in axes.iter().enumerate() {
            let dst_child = destination.child_at(i);
            if *on {
                self.connect(
                    &source.child_at(i),
                    &dst_child,
                    force,
                    batch.as_deref_mut(),
                )?;
            } else if self.plug_state(&dst_child)?.source.is_some() {
                self.disconnect(&dst_child, true, false, batch.as_deref_mut())?;
            }
        }
        Ok(())
    }

    /// Incoming source of a plug, if connected.
    pub fn source_of(&self, plug: &Plug) -> Result<Option<Plug>> {
        Ok(self.plug_state(plug)?.source.clone())
    }

    /// Source feeding a plug, looking through compound parent edges: a
    /// child of a compound driven at the parent level reads as driven by
    /// the matching child of the parent's source.
    pub fn effective_source_of(&self, plug: &Plug) -> Result<Option<Plug>> {
        if let Some(src) = self.plug_state(plug)?.source.clone() {
            return Ok(Some(src));
        }
        if let Some(PlugSeg::Child(i)) = plug.path.segs.last().copied() {
            let mut parent = plug.clone();
            parent.path.segs.pop();
            if let Some(parent_src) = self.effective_source_of(&parent)? {
                return Ok(Some(parent_src.child_at(i)));
            }
        }
        Ok(None)
    }

    /// Outgoing destinations of a plug.
    pub fn destinations_of(&self, plug: &Plug) -> Result<Vec<Plug>> {
        Ok(self.plug_state(plug)?.destinations.clone())
    }

    /// Every connection touching a node, as `(plug on node, far plug)`.
    ///
    /// `source` selects incoming edges, `destination` outgoing ones; fan-out
    /// yields one pair per destination.
    pub fn iter_connections(
        &self,
        node: NodeId,
        source: bool,
        destination: bool,
    ) -> Result<Vec<(Plug, Plug)>> {
        let mut out = Vec::new();
        let mut plugs = self.iter_plugs(node)?;
        for root in plugs.clone() {
            plugs.extend(self.iter_plug_children(&root)?);
        }
        for plug in plugs {
            let state = self.plug_state(&plug)?;
            if source {
                if let Some(src) = &state.source {
                    out.push((plug.clone(), src.clone()));
                }
            }
            if destination {
                for dst in &state.destinations {
                    out.push((plug.clone(), dst.clone()));
                }
            }
        }
        Ok(out)
    }

    /// Move every outgoing connection of `source_node` onto the same-named
    /// plugs of `dest_node`.
    ///
    /// With a `filter`, only the listed plugs on the source node are moved.
    /// Far-end destinations are unlocked as needed. Fails when the
    /// destination node lacks a matching attribute.
    pub fn swap_outgoing_connections(
        &mut self,
        source_node: NodeId,
        dest_node: NodeId,
        filter: Option<&[Plug]>,
    ) -> Result<()> {
        let outgoing = self.iter_connections(source_node, false, true)?;
        for (src, far_dst) in outgoing {
            if let Some(keep) = filter {
                if !keep.contains(&src) {
                    continue;
                }
            }
            let attr_path = self.plug_name(&src);
            let new_src = self.find_plug(dest_node, &attr_path)?;
            if self.is_locked(&far_dst)? {
                self.set_locked(&far_dst, false)?;
            }
            self.remove_edge(&src, &far_dst);
            self.do_connect(&new_src, &far_dst, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttrSpec, AttrType, Value};
    use crate::scene::plug::PlugValue;

    fn two_nodes(g: &mut SceneGraph) -> (NodeId, NodeId) {
        let a = g.create_dg_node("driver", "network").unwrap();
        let b = g.create_dg_node("driven", "network").unwrap();
        (a, b)
    }

    #[test]
    fn test_single_writer() {
        let mut g = SceneGraph::new();
        let (a, b) = two_nodes(&mut g);
        let out1 = g.add_attribute(a, &AttrSpec::new("out1", AttrType::Double)).unwrap();
        let out2 = g.add_attribute(a, &AttrSpec::new("out2", AttrType::Double)).unwrap();
        let inp = g.add_attribute(b, &AttrSpec::new("inp", AttrType::Double)).unwrap();

        g.connect(&out1, &inp, false, None).unwrap();
        assert_eq!(g.source_of(&inp).unwrap(), Some(out1.clone()));

        let err = g.connect(&out2, &inp, false, None).unwrap_err();
        assert!(matches!(err, Error::ConnectionConflict { .. }));

        g.connect(&out2, &inp, true, None).unwrap();
        assert_eq!(g.source_of(&inp).unwrap(), Some(out2.clone()));
        assert!(g.destinations_of(&out1).unwrap().is_empty());
        assert_eq!(g.destinations_of(&out2).unwrap(), vec![inp.clone()]);
    }

    #[test]
    fn test_disconnect_unlocks() {
        let mut g = SceneGraph::new();
        let (a, b) = two_nodes(&mut g);
        let out = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
        let inp = g.add_attribute(b, &AttrSpec::new("inp", AttrType::Double)).unwrap();
        g.connect(&out, &inp, false, None).unwrap();
        g.set_locked(&inp, true).unwrap();

        assert!(g.disconnect(&inp, true, true, None).unwrap());
        assert_eq!(g.source_of(&inp).unwrap(), None);
        assert!(!g.is_locked(&inp).unwrap());
        // nothing left to break
        assert!(!g.disconnect(&inp, true, true, None).unwrap());
    }

    #[test]
    fn test_not_connectable() {
        let mut g = SceneGraph::new();
        let (a, b) = two_nodes(&mut g);
        let out = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
        let inp = g
            .add_attribute(b, &AttrSpec::new("inp", AttrType::Double).connectable(false))
            .unwrap();
        assert!(matches!(
            g.connect(&out, &inp, false, None),
            Err(Error::NotConnectable(_))
        ));
    }

    #[test]
    fn test_edit_batch_applies_in_order() {
        let mut g = SceneGraph::new();
        let (a, b) = two_nodes(&mut g);
        let out = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
        let inp = g.add_attribute(b, &AttrSpec::new("inp", AttrType::Double)).unwrap();

        let mut batch = EditBatch::new();
        g.connect(&out, &inp, false, Some(&mut batch)).unwrap();
        g.disconnect(&inp, true, false, Some(&mut batch)).unwrap();
        // nothing applied yet
        assert_eq!(g.source_of(&inp).unwrap(), None);
        assert_eq!(batch.len(), 2);

        batch.apply(&mut g).unwrap();
        assert!(batch.is_empty());
        assert_eq!(g.source_of(&inp).unwrap(), None);
    }

    #[test]
    fn test_connect_vector_partial_axes() {
        let mut g = SceneGraph::new();
        let a = g.create_dag_node("src", "transform", None).unwrap();
        let b = g.create_dag_node("dst", "transform", None).unwrap();
        let src = g.find_plug(a, "translate").unwrap();
        let dst = g.find_plug(b, "translate").unwrap();

        g.connect_vector(&src, &dst, &[true, false, true], false, None)
            .unwrap();
        assert_eq!(
            g.source_of(&dst.child_at(0)).unwrap(),
            Some(src.child_at(0))
        );
        assert_eq!(g.source_of(&dst.child_at(1)).unwrap(), None);
        assert_eq!(g.source_of(&dst).unwrap(), None);

        // all-axes connects the parents directly
        g.connect_vector(&src, &dst, &[true, true, true], false, None)
            .unwrap();
        assert_eq!(g.source_of(&dst).unwrap(), Some(src.clone()));
    }

    #[test]
    fn test_swap_outgoing() {
        let mut g = SceneGraph::new();
        let old = g.create_dg_node("old", "network").unwrap();
        let new = g.create_dg_node("new", "network").unwrap();
        let sink = g.create_dg_node("sink", "network").unwrap();
        for n in [old, new] {
            g.add_attribute(n, &AttrSpec::new("out", AttrType::Double)).unwrap();
        }
        let inp = g.add_attribute(sink, &AttrSpec::new("inp", AttrType::Double)).unwrap();
        let old_out = g.find_plug(old, "out").unwrap();
        g.connect(&old_out, &inp, false, None).unwrap();

        g.swap_outgoing_connections(old, new, None).unwrap();
        let new_out = g.find_plug(new, "out").unwrap();
        assert_eq!(g.source_of(&inp).unwrap(), Some(new_out));
        assert!(g.destinations_of(&old_out).unwrap().is_empty());
    }

    #[test]
    fn test_delete_breaks_connections() {
        let mut g = SceneGraph::new();
        let (a, b) = two_nodes(&mut g);
        let out = g.add_attribute(a, &AttrSpec::new("out", AttrType::Double)).unwrap();
        let inp = g.add_attribute(b, &AttrSpec::new("inp", AttrType::Double)).unwrap();
        g.connect(&out, &inp, false, None).unwrap();
        g.set_locked(&inp, true).unwrap();

        g.delete(a).unwrap();
        assert_eq!(g.source_of(&inp).unwrap(), None);
        // survivor is writable again
        g.set_plug_value(&inp, PlugValue::Scalar(Value::Double(2.0)))
            .unwrap();
    }
}
