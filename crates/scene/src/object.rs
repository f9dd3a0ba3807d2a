use glam::Vec3;
use serde::{Deserialize, Serialize};
use shadowcast_common::Transform;

/// Opaque reference to a mesh owned by the renderer's resource registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// Opaque reference to a texture owned by the renderer's resource registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// Constant rotation applied every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spin {
    pub axis: Vec3,
    /// Radians per second.
    pub speed: f32,
}

impl Spin {
    pub fn new(axis: Vec3, speed: f32) -> Self {
        Self { axis, speed }
    }
}

/// A drawable entity: a mesh, a texture, and where to put them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject {
    pub name: String,
    pub mesh: MeshHandle,
    pub texture: TextureHandle,
    pub transform: Transform,
    pub spin: Option<Spin>,
}

impl RenderObject {
    pub fn new(name: impl Into<String>, mesh: MeshHandle, texture: TextureHandle) -> Self {
        Self {
            name: name.into(),
            mesh,
            texture,
            transform: Transform::default(),
            spin: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_spin(mut self, spin: Spin) -> Self {
        self.spin = Some(spin);
        self
    }

    /// Advance the spin animation by `dt` seconds.
    pub fn animate(&mut self, dt: f32) {
        if let Some(spin) = self.spin {
            self.transform.rotate_axis_angle(spin.axis, spin.speed * dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn animate_without_spin_is_noop() {
        let mut obj = RenderObject::new("crate", MeshHandle(0), TextureHandle(0));
        obj.animate(1.0);
        assert_eq!(obj.transform, Transform::default());
    }

    #[test]
    fn animate_rotates_about_axis() {
        let mut obj = RenderObject::new("crate", MeshHandle(0), TextureHandle(0))
            .with_spin(Spin::new(Vec3::Y, 2.0));
        obj.animate(0.25);
        let expected = Quat::from_axis_angle(Vec3::Y, 0.5);
        assert!(obj.transform.rotation.abs_diff_eq(expected, 1e-6));
    }
}
