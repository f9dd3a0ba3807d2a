use crate::config::ConfigError;
use crate::device::DeviceError;
use std::fmt;

/// Initialization stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InitStage {
    Shaders,
    Meshes,
    ConstantBuffers,
    Textures,
    Samplers,
    RenderStates,
    ShadowMap,
    Lights,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shaders => "shaders",
            Self::Meshes => "meshes",
            Self::ConstantBuffers => "constant buffers",
            Self::Textures => "textures",
            Self::Samplers => "samplers",
            Self::RenderStates => "render states",
            Self::ShadowMap => "shadow map",
            Self::Lights => "lights",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("graphics device is not valid")]
    InvalidDevice,
    #[error("initialization failed creating {stage}: {source}")]
    Initialization {
        stage: InitStage,
        #[source]
        source: DeviceError,
    },
    #[error("renderer is not initialized")]
    NotInitialized,
    #[error("renderer is already initialized")]
    AlreadyInitialized,
    #[error("renderer has been released")]
    Released,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}
