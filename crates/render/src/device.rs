use crate::command::{CommandList, HazardError};
use crate::ids::{
    BufferId, DepthStateId, MeshId, ProgramId, RasterizerId, Resource, ResourceKind, SamplerId,
    ShadowMapId, TextureId,
};
use crate::mesh::MeshData;
use crate::program::ProgramDesc;
use crate::state::{DepthStencilDesc, RasterizerDesc, SamplerDesc};
use shadowcast_scene::TextureSource;

/// Errors raised by a [`RenderDevice`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("graphics device is not valid")]
    InvalidDevice,
    #[error("program '{label}' failed to compile: {reason}")]
    ShaderCompile { label: String, reason: String },
    #[error("{kind} allocation failed: {reason}")]
    Allocation { kind: ResourceKind, reason: String },
    #[error("texture '{texture}' could not be loaded: {reason}")]
    TextureLoad { texture: String, reason: String },
    #[error("resource hazard: {0}")]
    Hazard(#[from] HazardError),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("surface error: {0}")]
    Surface(String),
    #[error("no usable graphics device: {0}")]
    Unavailable(String),
}

/// The graphics device as seen by the pipeline: resource creation, command
/// execution and presentation.
///
/// The device is owned by the caller and lent to the renderer for each
/// call; it must outlive every resource the renderer created on it.
pub trait RenderDevice {
    /// Whether the device can create resources and execute commands.
    fn is_valid(&self) -> bool;

    /// Current back-buffer size in pixels.
    fn back_buffer_size(&self) -> (u32, u32);

    fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.back_buffer_size();
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError>;

    fn create_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, DeviceError>;

    fn create_texture(&mut self, source: &TextureSource) -> Result<TextureId, DeviceError>;

    /// Allocate a constant buffer of exactly `byte_size` bytes.
    fn create_buffer(&mut self, byte_size: u64) -> Result<BufferId, DeviceError>;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<SamplerId, DeviceError>;

    fn create_rasterizer_state(&mut self, desc: &RasterizerDesc)
    -> Result<RasterizerId, DeviceError>;

    fn create_depth_state(&mut self, desc: &DepthStencilDesc) -> Result<DepthStateId, DeviceError>;

    /// Square depth texture usable as a render target and as a sampled,
    /// comparison-filtered resource.
    fn create_shadow_map(&mut self, size: u32) -> Result<ShadowMapId, DeviceError>;

    /// Run one frame's commands in order.
    fn execute(&mut self, commands: &CommandList) -> Result<(), DeviceError>;

    /// Free a resource. Unknown or already-freed resources are ignored.
    fn release(&mut self, resource: Resource);
}
