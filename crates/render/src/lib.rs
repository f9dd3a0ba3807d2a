//! Renderer-agnostic shadow-mapped render pipeline.
//!
//! # Invariants
//! - The renderer never touches the GPU directly: it records a
//!   [`CommandList`] per frame and a [`RenderDevice`] executes it.
//! - A shadow map is never bound as render target and sampled resource at
//!   the same time.
//! - Constant buffers are sized to a multiple of 16 bytes and every upload
//!   replaces the whole buffer.
//!
//! [`RecordingDevice`] executes nothing and records everything, which is
//! what the tests and the headless CLI run against.

mod command;
mod config;
mod constant_buffer;
mod device;
mod error;
mod ids;
mod mesh;
mod program;
mod recording;
mod records;
mod registry;
mod renderer;
mod shadow;
mod state;
mod texture;

pub use command::{
    Command, CommandList, HazardError, HazardTracker, LIGHTS_SLOT, PER_OBJECT_SLOT, RenderTarget,
    SHADOW_MAP_SLOT, ShaderStage, TEXTURE_SLOT, Viewport,
};
pub use config::{ConfigError, MAX_SHADOW_MAP_SIZE, MAX_SYNC_INTERVAL, RendererConfig, ShadowSettings};
pub use constant_buffer::{ConstantBuffer, padded_size};
pub use device::{DeviceError, RenderDevice};
pub use error::{InitStage, RenderError};
pub use ids::{
    BufferId, DepthStateId, MeshId, ProgramId, RasterizerId, Resource, ResourceKind, SamplerId,
    ShadowMapId, TextureId,
};
pub use mesh::{MeshData, Vertex};
pub use program::{ProgramDesc, Semantic, ShaderRef, ShaderSource, VertexElement, VertexFormat};
pub use recording::RecordingDevice;
pub use records::{LightRecord, PerObjectRecord, normal_matrix};
pub use registry::ResourceRegistry;
pub use renderer::{FrameStats, Renderer, RendererState};
pub use shadow::LightSpace;
pub use state::{
    AddressMode, CompareFunction, CullMode, DepthStencilDesc, FilterMode, RasterizerDesc,
    SamplerDesc,
};
pub use texture::TexturePixels;

pub fn crate_info() -> &'static str {
    "shadowcast-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
