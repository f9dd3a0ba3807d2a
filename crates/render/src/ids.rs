use serde::Serialize;

macro_rules! resource_ids {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
            #[serde(transparent)]
            pub struct $name(pub u32);
        )*
    };
}

resource_ids! {
    /// Compiled vertex + pixel program.
    ProgramId,
    /// Vertex and index buffers for one mesh.
    MeshId,
    /// Sampled 2D texture.
    TextureId,
    /// GPU-visible constant buffer.
    BufferId,
    SamplerId,
    RasterizerId,
    DepthStateId,
    /// Depth texture with a render-target view and a sampled view.
    ShadowMapId,
}

/// Any device-owned object, for release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Resource {
    Program(ProgramId),
    Mesh(MeshId),
    Texture(TextureId),
    Buffer(BufferId),
    Sampler(SamplerId),
    Rasterizer(RasterizerId),
    DepthState(DepthStateId),
    ShadowMap(ShadowMapId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Program,
    Mesh,
    Texture,
    Buffer,
    Sampler,
    Rasterizer,
    DepthState,
    ShadowMap,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Program(_) => ResourceKind::Program,
            Self::Mesh(_) => ResourceKind::Mesh,
            Self::Texture(_) => ResourceKind::Texture,
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Sampler(_) => ResourceKind::Sampler,
            Self::Rasterizer(_) => ResourceKind::Rasterizer,
            Self::DepthState(_) => ResourceKind::DepthState,
            Self::ShadowMap(_) => ResourceKind::ShadowMap,
        }
    }

    /// Raw id, unique only within its kind.
    pub fn raw(&self) -> u32 {
        match *self {
            Self::Program(ProgramId(id))
            | Self::Mesh(MeshId(id))
            | Self::Texture(TextureId(id))
            | Self::Buffer(BufferId(id))
            | Self::Sampler(SamplerId(id))
            | Self::Rasterizer(RasterizerId(id))
            | Self::DepthState(DepthStateId(id))
            | Self::ShadowMap(ShadowMapId(id)) => id,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Program => "program",
            Self::Mesh => "mesh",
            Self::Texture => "texture",
            Self::Buffer => "buffer",
            Self::Sampler => "sampler",
            Self::Rasterizer => "rasterizer state",
            Self::DepthState => "depth-stencil state",
            Self::ShadowMap => "shadow map",
        };
        f.write_str(name)
    }
}
