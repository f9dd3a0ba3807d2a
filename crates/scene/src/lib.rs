//! Scene graph for the shadowcast renderer: what is drawn and from where.
//!
//! # Invariants
//! - Objects reference meshes and textures through opaque handles, never
//!   through backend resources.
//! - The light list is fixed after startup; the renderer packs at most
//!   [`MAX_LIGHTS`] of them per frame.

mod camera;
mod desc;
mod light;
mod object;
mod scene;

pub use camera::{Camera, CameraSettings};
pub use desc::{ObjectDesc, Primitive, SceneDesc, SceneError, TextureSource};
pub use light::{GpuLight, Light, LIGHT_DIRECTIONAL, LIGHT_POINT, MAX_LIGHTS};
pub use object::{MeshHandle, RenderObject, Spin, TextureHandle};
pub use scene::Scene;

pub fn crate_info() -> &'static str {
    "shadowcast-scene v0.1.0"
}
