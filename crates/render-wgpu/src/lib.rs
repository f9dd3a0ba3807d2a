//! wgpu implementation of [`shadowcast_render::RenderDevice`].
//!
//! # Invariants
//! - Each frame's command list is validated for shadow-map hazards before
//!   anything is submitted.
//! - A draw sees exactly the constant-buffer contents uploaded before it in
//!   the command list, even though wgpu applies all writes before the passes.
//! - Pipelines are built lazily from the (program, rasterizer, depth state,
//!   target) combination a draw uses.

mod device;
mod plan;
mod shaders;

pub use device::WgpuDevice;
pub use shaders::{LIT_SHADER, SHADOW_SHADER};
