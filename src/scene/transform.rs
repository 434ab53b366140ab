//! Transform reads and writes on DAG nodes.
//!
//! Transform nodes carry `translate` / `rotate` / `scale` attributes in
//! local space; rotation is an XYZ euler triple in radians. World-space
//! reads walk the parent chain, world-space writes re-express the value in
//! the node's local frame before touching the plugs.

use crate::attr::Value;
use crate::scene::node::NodeId;
use crate::scene::plug::Plug;
use crate::scene::SceneGraph;
use crate::util::math::{
    compose, decompose, mirror_quat, mirror_translation, AxisMask, DMat4, DQuat, DVec3,
    EulerRot, MirrorMode, MirrorPlane,
};
use crate::util::{Error, Result, Space};

impl SceneGraph {
    fn read_d3(&self, id: NodeId, attr: &str) -> Result<DVec3> {
        let plug = Plug::new(id, attr);
        match self.plug_value(&plug)?.scalar()? {
            Value::Double3(v) => Ok(v),
            other => Err(Error::mismatch("double3", other.kind())),
        }
    }

    fn write_d3(&mut self, id: NodeId, attr: &str, v: DVec3) -> Result<()> {
        self.set_plug_value(&Plug::new(id, attr), Value::Double3(v))
    }

    /// Local TRS of a transform node.
    pub fn local_trs(&self, id: NodeId) -> Result<(DVec3, DQuat, DVec3)> {
        let t = self.read_d3(id, "translate")?;
        let r = self.read_d3(id, "rotate")?;
        let s = self.read_d3(id, "scale")?;
        Ok((t, DQuat::from_euler(EulerRot::XYZ, r.x, r.y, r.z), s))
    }

    /// Local transform matrix.
    pub fn local_matrix(&self, id: NodeId) -> Result<DMat4> {
        let (t, r, s) = self.local_trs(id)?;
        Ok(compose(t, r, s))
    }

    /// World transform matrix: the local matrices accumulated down from the
    /// root.
    pub fn world_matrix(&self, id: NodeId) -> Result<DMat4> {
        let mut m = self.local_matrix(id)?;
        for ancestor in self.iter_parents(id) {
            m = self.local_matrix(ancestor)? * m;
        }
        Ok(m)
    }

    /// Inverse of the parent's world matrix (identity at the root).
    pub fn parent_inverse_matrix(&self, id: NodeId) -> Result<DMat4> {
        match self.parent(id)? {
            Some(p) => Ok(self.world_matrix(p)?.inverse()),
            None => Ok(DMat4::IDENTITY),
        }
    }

    /// Write a transform matrix in the given space.
    ///
    /// World-space writes convert to local through the parent's inverse
    /// world matrix, then decompose onto the TRS plugs.
    pub fn set_matrix(&mut self, id: NodeId, matrix: &DMat4, space: Space) -> Result<()> {
        let local = match space {
            Space::Transform => *matrix,
            Space::World => self.parent_inverse_matrix(id)? * *matrix,
        };
        let (s, r, t) = decompose(&local);
        let (rx, ry, rz) = r.to_euler(EulerRot::XYZ);
        self.write_d3(id, "translate", t)?;
        self.write_d3(id, "rotate", DVec3::new(rx, ry, rz))?;
        self.write_d3(id, "scale", s)?;
        Ok(())
    }

    /// Transform of `end` expressed in `start`'s frame.
    pub fn offset_matrix(&self, start: NodeId, end: NodeId, space: Space) -> Result<DMat4> {
        let (a, b) = match space {
            Space::World => (self.world_matrix(start)?, self.world_matrix(end)?),
            Space::Transform => (self.local_matrix(start)?, self.local_matrix(end)?),
        };
        Ok(a.inverse() * b)
    }

    pub fn translation(&self, id: NodeId, space: Space) -> Result<DVec3> {
        match space {
            Space::Transform => self.read_d3(id, "translate"),
            Space::World => {
                let (_, _, t) = decompose(&self.world_matrix(id)?);
                Ok(t)
            }
        }
    }

    pub fn set_translation(&mut self, id: NodeId, t: DVec3, space: Space) -> Result<()> {
        let local = match space {
            Space::Transform => t,
            Space::World => self.parent_inverse_matrix(id)?.transform_point3(t),
        };
        self.write_d3(id, "translate", local)
    }

    pub fn rotation(&self, id: NodeId, space: Space) -> Result<DQuat> {
        match space {
            Space::Transform => {
                let (_, r, _) = self.local_trs(id)?;
                Ok(r)
            }
            Space::World => {
                let (_, r, _) = decompose(&self.world_matrix(id)?);
                Ok(r)
            }
        }
    }

    pub fn set_rotation(&mut self, id: NodeId, q: DQuat, space: Space) -> Result<()> {
        let local = match space {
            Space::Transform => q,
            Space::World => {
                let parent_rot = match self.parent(id)? {
                    Some(p) => {
                        let (_, r, _) = decompose(&self.world_matrix(p)?);
                        r
                    }
                    None => DQuat::IDENTITY,
                };
                parent_rot.inverse() * q
            }
        };
        let (rx, ry, rz) = local.to_euler(EulerRot::XYZ);
        self.write_d3(id, "rotate", DVec3::new(rx, ry, rz))
    }

    /// Mirrored world translation and rotation for a node.
    ///
    /// The translation has the masked axes negated; the rotation is
    /// reflected across `plane` under the chosen convention. When a
    /// `reference_parent` is given the mirrored rotation is re-expressed in
    /// that parent's frame, ready for a local write under it.
    pub fn mirror_transform(
        &self,
        id: NodeId,
        reference_parent: Option<NodeId>,
        axes: AxisMask,
        plane: MirrorPlane,
        mode: MirrorMode,
    ) -> Result<(DVec3, DQuat)> {
        let (_, rot, t) = decompose(&self.world_matrix(id)?);
        let t2 = mirror_translation(t, axes);
        let mut q2 = mirror_quat(rot, plane, mode);
        if let Some(parent) = reference_parent {
            let rel = self.world_matrix(parent)?.inverse() * DMat4::from_quat(q2);
            let (_, q, _) = decompose(&rel);
            q2 = q;
        }
        Ok((t2, q2))
    }

    /// Mirror a node in place: world translation plus a rotation relative to
    /// its own parent.
    pub fn mirror_node(
        &mut self,
        id: NodeId,
        axes: AxisMask,
        plane: MirrorPlane,
        mode: MirrorMode,
    ) -> Result<()> {
        let parent = self.parent(id)?;
        let (t, q) = self.mirror_transform(id, parent, axes, plane, mode)?;
        self.set_translation(id, t, Space::World)?;
        self.set_rotation(id, q, Space::Transform)?;
        Ok(())
    }

    /// Drive each target's transform from `source`.
    ///
    /// Channel flags select which of translation/rotation/scale to copy. In
    /// world space the source's world transform is re-expressed through each
    /// target's parent. With `pivot`, the translation is compensated by the
    /// difference of the two scale pivots. Returns false when `targets` is
    /// empty.
    #[allow(clippy::too_many_arguments)]
    pub fn match_transform(
        &mut self,
        targets: &[NodeId],
        source: NodeId,
        translation: bool,
        rotation: bool,
        scale: bool,
        space: Space,
        pivot: bool,
    ) -> Result<bool> {
        if targets.is_empty() {
            return Ok(false);
        }
        let source_matrix = match space {
            Space::World => self.world_matrix(source)?,
            Space::Transform => self.local_matrix(source)?,
        };
        for target in targets {
            let local = match space {
                Space::World => self.parent_inverse_matrix(*target)? * source_matrix,
                Space::Transform => source_matrix,
            };
            let (s, r, mut t) = decompose(&local);
            if pivot && translation {
                let src_pivot = self.read_d3(source, "scalePivot")?;
                let tgt_pivot = self.read_d3(*target, "scalePivot")?;
                t += src_pivot - tgt_pivot;
            }
            if translation {
                self.write_d3(*target, "translate", t)?;
            }
            if rotation {
                let (rx, ry, rz) = r.to_euler(EulerRot::XYZ);
                self.write_d3(*target, "rotate", DVec3::new(rx, ry, rz))?;
            }
            if scale {
                self.write_d3(*target, "scale", s)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_world_matrix_accumulates() {
        let mut g = SceneGraph::new();
        let root = g.create_dag_node("root", "transform", None).unwrap();
        let child = g.create_dag_node("child", "transform", Some(root)).unwrap();
        g.set_translation(root, DVec3::new(1.0, 0.0, 0.0), Space::Transform)
            .unwrap();
        g.set_translation(child, DVec3::new(0.0, 2.0, 0.0), Space::Transform)
            .unwrap();
        assert!(close(
            g.translation(child, Space::World).unwrap(),
            DVec3::new(1.0, 2.0, 0.0)
        ));
    }

    #[test]
    fn test_world_write_roundtrip() {
        let mut g = SceneGraph::new();
        let root = g.create_dag_node("root", "transform", None).unwrap();
        let child = g.create_dag_node("child", "transform", Some(root)).unwrap();
        g.set_translation(root, DVec3::new(5.0, 0.0, 0.0), Space::Transform)
            .unwrap();
        g.set_rotation(root, DQuat::from_euler(EulerRot::XYZ, 0.0, 0.5, 0.0), Space::Transform)
            .unwrap();
        let want = DVec3::new(1.0, 2.0, 3.0);
        g.set_translation(child, want, Space::World).unwrap();
        assert!(close(g.translation(child, Space::World).unwrap(), want));
    }

    #[test]
    fn test_offset_matrix_identity_on_self() {
        let mut g = SceneGraph::new();
        let n = g.create_dag_node("n", "transform", None).unwrap();
        g.set_translation(n, DVec3::new(3.0, 1.0, 0.0), Space::Transform)
            .unwrap();
        let off = g.offset_matrix(n, n, Space::World).unwrap();
        assert!((off - DMat4::IDENTITY).abs().to_cols_array().iter().all(|x| *x < 1e-9));
    }

    #[test]
    fn test_match_transform_world() {
        let mut g = SceneGraph::new();
        let src = g.create_dag_node("src", "transform", None).unwrap();
        let parent = g.create_dag_node("parent", "transform", None).unwrap();
        let tgt = g.create_dag_node("tgt", "transform", Some(parent)).unwrap();
        g.set_translation(src, DVec3::new(4.0, 5.0, 6.0), Space::Transform)
            .unwrap();
        g.set_translation(parent, DVec3::new(1.0, 1.0, 1.0), Space::Transform)
            .unwrap();
        assert!(g
            .match_transform(&[tgt], src, true, true, true, Space::World, false)
            .unwrap());
        assert!(close(
            g.translation(tgt, Space::World).unwrap(),
            DVec3::new(4.0, 5.0, 6.0)
        ));
        assert!(!g
            .match_transform(&[], src, true, true, true, Space::World, false)
            .unwrap());
    }
}
