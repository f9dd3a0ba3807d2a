use crate::mesh::Vertex;
use serde::Serialize;

/// Shader sources the device knows how to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderSource {
    /// Textured, lit, shadow-receiving surface shader.
    Lit,
    /// Depth-only shader for the shadow pass.
    Shadow,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShaderRef {
    pub source: ShaderSource,
    pub entry: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Semantic {
    Position,
    Normal,
    TexCoord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub fn byte_size(self) -> u32 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VertexElement {
    pub semantic: Semantic,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Vertex layout plus vertex and optional pixel entry points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProgramDesc {
    pub label: &'static str,
    pub vertex: ShaderRef,
    /// `None` for depth-only programs.
    pub pixel: Option<ShaderRef>,
    pub layout: Vec<VertexElement>,
    pub stride: u32,
}

impl ProgramDesc {
    pub fn lit() -> Self {
        Self {
            label: "lit",
            vertex: ShaderRef {
                source: ShaderSource::Lit,
                entry: "vs_main",
            },
            pixel: Some(ShaderRef {
                source: ShaderSource::Lit,
                entry: "fs_main",
            }),
            layout: Vertex::layout(),
            stride: Vertex::STRIDE,
        }
    }

    pub fn shadow() -> Self {
        Self {
            label: "shadow",
            vertex: ShaderRef {
                source: ShaderSource::Shadow,
                entry: "vs_shadow",
            },
            pixel: None,
            layout: Vertex::layout(),
            stride: Vertex::STRIDE,
        }
    }

    /// Every element fits inside the stride and none overlap.
    pub fn layout_is_consistent(&self) -> bool {
        let mut spans: Vec<(u32, u32)> = self
            .layout
            .iter()
            .map(|e| (e.offset, e.offset + e.format.byte_size()))
            .collect();
        spans.sort_unstable();
        spans.iter().all(|&(_, end)| end <= self.stride)
            && spans.windows(2).all(|pair| pair[0].1 <= pair[1].0)
    }
}
