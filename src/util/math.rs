//! Math type re-exports and transform utilities.
//!
//! This module re-exports types from `glam` and provides the mirroring and
//! decomposition helpers used by the transform layer. All transform math is
//! double precision.

// Re-export glam types
pub use glam::{
    // Double precision vectors
    DVec2, DVec3, DVec4,
    // Integer vectors
    IVec2, IVec3,
    // Single precision vectors
    Vec2, Vec3, Vec4,
    // Matrices
    DMat3, DMat4, Mat3, Mat4,
    // Quaternions
    DQuat, Quat,
    // Euler orders
    EulerRot,
};

use crate::util::{Error, Result};

/// Coordinate space selector for transform reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Space {
    /// Local (object/transform) space, relative to the parent.
    #[default]
    Transform,
    /// World space.
    World,
}

/// Mirror plane for quaternion reflection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorPlane {
    Xy,
    Yz,
    Xz,
}

impl MirrorPlane {
    /// Parse a plane name ("xy", "yz", "xz").
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "xy" | "XY" => Ok(Self::Xy),
            "yz" | "YZ" => Ok(Self::Yz),
            "xz" | "XZ" => Ok(Self::Xz),
            other => Err(Error::other(format!("unknown mirror plane: {other}"))),
        }
    }
}

/// Mirroring convention.
///
/// `Behaviour` produces an anti-symmetric pose (biped rig mirroring);
/// `Orientation` negates fewer components, preserving joint orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MirrorMode {
    #[default]
    Behaviour,
    Orientation,
}

/// A per-axis mask, used to select which translation axes to negate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    /// All three axes.
    pub const ALL: Self = Self {
        x: true,
        y: true,
        z: true,
    };

    /// Parse an axis set such as "x", "xz" or "xyz".
    pub fn parse(s: &str) -> Result<Self> {
        let mut mask = Self::default();
        for c in s.chars() {
            match c.to_ascii_lowercase() {
                'x' => mask.x = true,
                'y' => mask.y = true,
                'z' => mask.z = true,
                other => return Err(Error::other(format!("unknown axis: {other}"))),
            }
        }
        Ok(mask)
    }

    /// True when every axis is selected.
    pub fn is_all(&self) -> bool {
        self.x && self.y && self.z
    }
}

/// Decompose a matrix into (scale, rotation, translation).
#[inline]
pub fn decompose(m: &DMat4) -> (DVec3, DQuat, DVec3) {
    m.to_scale_rotation_translation()
}

/// Compose a matrix from translation, rotation and scale.
#[inline]
pub fn compose(translation: DVec3, rotation: DQuat, scale: DVec3) -> DMat4 {
    DMat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Negate the selected components of a translation vector.
pub fn mirror_translation(t: DVec3, axes: AxisMask) -> DVec3 {
    if axes.is_all() {
        return -t;
    }
    DVec3::new(
        if axes.x { -t.x } else { t.x },
        if axes.y { -t.y } else { t.y },
        if axes.z { -t.z } else { t.z },
    )
}

/// Reflect a rotation quaternion across a plane.
///
/// The component swaps follow the rig-mirroring convention: `Behaviour`
/// produces an anti-symmetric pose, `Orientation` keeps the orientation of
/// the rotation axes and only flips the handedness.
pub fn mirror_quat(q: DQuat, plane: MirrorPlane, mode: MirrorMode) -> DQuat {
    match mode {
        MirrorMode::Behaviour => match plane {
            MirrorPlane::Xy => DQuat::from_xyzw(-q.y, q.x, q.w, -q.z),
            MirrorPlane::Yz => DQuat::from_xyzw(-q.w, q.z, -q.y, q.x),
            MirrorPlane::Xz => DQuat::from_xyzw(q.z, q.w, -q.x, -q.y),
        },
        MirrorMode::Orientation => match plane {
            MirrorPlane::Xy => DQuat::from_xyzw(q.x, q.y, -q.z, -q.w),
            MirrorPlane::Yz => DQuat::from_xyzw(-q.x, q.y, q.z, -q.w),
            MirrorPlane::Xz => DQuat::from_xyzw(q.x, -q.y, q.z, -q.w),
        },
    }
}
