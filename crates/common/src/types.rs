use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Spatial transform of one scene object: position, rotation, non-uniform scale.
///
/// The world matrix applies scale first, then rotation, then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    /// Replace the rotation. The quaternion is stored as given.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Compose a rotation of `radians` about `axis` on the left of the current
    /// rotation, then renormalize so repeated calls do not drift.
    ///
    /// A zero axis produces a NaN rotation.
    pub fn rotate_axis_angle(&mut self, axis: Vec3, radians: f32) {
        let delta = Quat::from_axis_angle(axis.normalize(), radians);
        self.rotation = (delta * self.rotation).normalize();
    }

    /// Scale, then rotate, then translate.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}
