//! Fixed-layout records shared with the shaders.
//!
//! Matrices are stored column-major (`Mat4::to_cols_array_2d`), which is what
//! WGSL `mat4x4<f32>` expects. Both records are multiples of 16 bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use shadowcast_scene::{GpuLight, Light, MAX_LIGHTS};

/// Per-draw transforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerObjectRecord {
    pub world: [[f32; 4]; 4],
    /// Normal matrix; translation-free.
    pub world_inv_transpose: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
}

const _: () = assert!(std::mem::size_of::<PerObjectRecord>() % 16 == 0);

/// Inverse-transpose of the linear part of `world`, embedded in a 4x4 with no
/// translation. Singular matrices (zero scale) produce non-finite values.
pub fn normal_matrix(world: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(world).inverse().transpose())
}

impl PerObjectRecord {
    pub fn new(world: Mat4, view: Mat4, projection: Mat4, light_view_proj: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            world_inv_transpose: normal_matrix(world).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
        }
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    pub fn translation(&self) -> Vec3 {
        self.world_matrix().w_axis.truncate()
    }
}

/// Per-frame lighting.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    pub camera_position: [f32; 3],
    /// Never more than [`MAX_LIGHTS`].
    pub light_count: u32,
    pub lights: [GpuLight; MAX_LIGHTS],
}

const _: () = assert!(std::mem::size_of::<LightRecord>() % 16 == 0);

impl LightRecord {
    /// Pack the first [`MAX_LIGHTS`] lights; the rest are dropped.
    pub fn pack(camera_position: Vec3, lights: &[Light]) -> Self {
        let mut record = Self::zeroed();
        record.camera_position = camera_position.to_array();
        for (slot, light) in record.lights.iter_mut().zip(lights) {
            *slot = light.to_gpu();
        }
        record.light_count = lights.len().min(MAX_LIGHTS) as u32;
        record
    }
}
