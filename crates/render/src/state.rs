//! Fixed-function state descriptors handed to [`RenderDevice`](crate::RenderDevice).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Equal,
    Greater,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address: AddressMode,
    /// Set for comparison samplers used for shadow lookups.
    pub compare: Option<CompareFunction>,
}

impl SamplerDesc {
    /// Bilinear, repeating. Used for object textures.
    pub fn linear_repeat() -> Self {
        Self {
            filter: FilterMode::Linear,
            address: AddressMode::Repeat,
            compare: None,
        }
    }

    /// Filtered depth comparison, clamped so lookups outside the map read
    /// the edge texel.
    pub fn shadow_comparison() -> Self {
        Self {
            filter: FilterMode::Linear,
            address: AddressMode::ClampToEdge,
            compare: Some(CompareFunction::LessEqual),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterizerDesc {
    pub cull: CullMode,
    /// Constant depth offset in units of the smallest depth step.
    pub depth_bias: i32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip: bool,
}

impl RasterizerDesc {
    pub fn standard() -> Self {
        Self {
            cull: CullMode::Back,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0,
            depth_clip: true,
        }
    }

    /// Front-face culling with bias for the shadow pass.
    pub fn shadow(depth_bias: i32, slope_scaled_depth_bias: f32) -> Self {
        Self {
            cull: CullMode::Front,
            depth_bias,
            slope_scaled_depth_bias,
            depth_clip: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare: CompareFunction,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            compare: CompareFunction::LessEqual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_rasterizer_culls_front_faces() {
        let shadow = RasterizerDesc::shadow(1000, 1.5);
        assert_eq!(shadow.cull, CullMode::Front);
        assert_eq!(shadow.depth_bias, 1000);
        assert_eq!(RasterizerDesc::standard().cull, CullMode::Back);
    }

    #[test]
    fn comparison_sampler() {
        assert!(SamplerDesc::shadow_comparison().compare.is_some());
        assert!(SamplerDesc::linear_repeat().compare.is_none());
    }
}
