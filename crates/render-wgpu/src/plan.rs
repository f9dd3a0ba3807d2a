//! Translation of a [`CommandList`] into render passes.
//!
//! wgpu applies every `queue.write_buffer` before the submitted passes run,
//! so per-draw uploads are staged as numbered versions of each buffer and
//! each draw remembers which version it must see. The device then lays the
//! versions out at dynamic offsets.

use shadowcast_render::{
    BufferId, Command, CommandList, DepthStateId, DeviceError, MeshId, ProgramId, RasterizerId,
    RenderTarget, SHADOW_MAP_SLOT, SamplerId, ShadowMapId, TEXTURE_SLOT, TextureId, Viewport,
};
use std::collections::HashMap;

/// Constant-buffer slots a program can see.
pub(crate) const UNIFORM_SLOTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TargetKind {
    ShadowDepth,
    BackBuffer,
}

impl From<RenderTarget> for TargetKind {
    fn from(target: RenderTarget) -> Self {
        match target {
            RenderTarget::ShadowMap(_) => Self::ShadowDepth,
            RenderTarget::BackBuffer => Self::BackBuffer,
        }
    }
}

/// Everything that selects a compiled pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ProgramId,
    pub rasterizer: RasterizerId,
    pub depth_state: DepthStateId,
    pub target: TargetKind,
}

/// Which contents of a constant buffer a draw reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Version {
    /// The n-th upload recorded this frame.
    Uploaded(usize),
    /// Whatever the buffer held at the end of the previous frame.
    Previous,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedDraw {
    pub pipeline: PipelineKey,
    pub mesh: MeshId,
    pub viewport: Option<Viewport>,
    pub uniforms: [Option<(BufferId, Version)>; UNIFORM_SLOTS],
    pub texture: Option<(TextureId, SamplerId)>,
    pub shadow: Option<(ShadowMapId, SamplerId)>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlannedPass {
    pub target: RenderTarget,
    pub clear_color: Option<[f32; 4]>,
    pub clear_depth: Option<f32>,
    pub draws: Vec<PlannedDraw>,
}

impl PlannedPass {
    fn new(target: RenderTarget) -> Self {
        Self {
            target,
            clear_color: None,
            clear_depth: None,
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FramePlan {
    pub passes: Vec<PlannedPass>,
    pub uploads: HashMap<BufferId, Vec<Vec<u8>>>,
    pub present: Option<u32>,
}

impl FramePlan {
    /// The pass a clear applies to. A clear after draws starts a new pass on
    /// the same target.
    fn clearable_pass(&mut self, target: RenderTarget) -> Result<&mut PlannedPass, DeviceError> {
        let needs_split = match self.passes.last() {
            Some(pass) if pass.target == target => !pass.draws.is_empty(),
            _ => {
                return Err(DeviceError::InvalidCommand(format!(
                    "clear of {target:?} while it is not the render target"
                )));
            }
        };
        if needs_split {
            self.passes.push(PlannedPass::new(target));
        }
        self.passes
            .last_mut()
            .ok_or_else(|| DeviceError::InvalidCommand("no render target set".into()))
    }

    /// Draws that read the previous frame's contents of `buffer`.
    pub fn reads_previous(&self, buffer: BufferId) -> bool {
        self.passes.iter().flat_map(|p| &p.draws).any(|d| {
            d.uniforms
                .iter()
                .any(|u| *u == Some((buffer, Version::Previous)))
        })
    }

    /// Every buffer some draw reads.
    pub fn bound_buffers(&self) -> Vec<BufferId> {
        let mut buffers: Vec<BufferId> = self
            .passes
            .iter()
            .flat_map(|p| &p.draws)
            .flat_map(|d| d.uniforms.iter().flatten().map(|(b, _)| *b))
            .chain(self.uploads.keys().copied())
            .collect();
        buffers.sort_unstable();
        buffers.dedup();
        buffers
    }
}

#[derive(Debug, Default)]
struct Bindings {
    rasterizer: Option<RasterizerId>,
    depth_state: Option<DepthStateId>,
    program: Option<ProgramId>,
    viewport: Option<Viewport>,
    uniforms: [Option<BufferId>; UNIFORM_SLOTS],
    texture: Option<(TextureId, SamplerId)>,
    shadow: Option<(ShadowMapId, SamplerId)>,
}

fn invalid(message: impl Into<String>) -> DeviceError {
    DeviceError::InvalidCommand(message.into())
}

pub(crate) fn plan(commands: &CommandList) -> Result<FramePlan, DeviceError> {
    let mut plan = FramePlan::default();
    let mut bound = Bindings::default();

    for command in commands {
        match command {
            Command::UnbindShaderResource { slot } => match *slot {
                TEXTURE_SLOT => bound.texture = None,
                SHADOW_MAP_SLOT => bound.shadow = None,
                other => return Err(invalid(format!("no shader resource slot {other}"))),
            },
            Command::SetRasterizerState { state } => bound.rasterizer = Some(*state),
            Command::SetDepthStencilState { state } => bound.depth_state = Some(*state),
            Command::SetRenderTarget { target } => plan.passes.push(PlannedPass::new(*target)),
            Command::SetViewport { viewport } => bound.viewport = Some(*viewport),
            Command::ClearDepth { target, depth } => {
                plan.clearable_pass(*target)?.clear_depth = Some(*depth);
            }
            Command::ClearColor { color } => {
                plan.clearable_pass(RenderTarget::BackBuffer)?.clear_color = Some(*color);
            }
            Command::BindProgram { program } => bound.program = Some(*program),
            Command::BindConstantBuffer { slot, buffer, .. } => {
                let entry = bound
                    .uniforms
                    .get_mut(*slot as usize)
                    .ok_or_else(|| invalid(format!("no constant buffer slot {slot}")))?;
                *entry = Some(*buffer);
            }
            Command::UpdateBuffer { buffer, data } => {
                plan.uploads.entry(*buffer).or_default().push(data.clone());
            }
            Command::BindShadowMap {
                slot,
                shadow_map,
                sampler,
            } => {
                if *slot != SHADOW_MAP_SLOT {
                    return Err(invalid(format!("shadow map bound to slot {slot}")));
                }
                bound.shadow = Some((*shadow_map, *sampler));
            }
            Command::BindTexture {
                slot,
                texture,
                sampler,
            } => {
                if *slot != TEXTURE_SLOT {
                    return Err(invalid(format!("texture bound to slot {slot}")));
                }
                bound.texture = Some((*texture, *sampler));
            }
            Command::DrawIndexed { mesh } => {
                let (Some(program), Some(rasterizer), Some(depth_state)) =
                    (bound.program, bound.rasterizer, bound.depth_state)
                else {
                    return Err(invalid("draw without program, rasterizer and depth state"));
                };
                let uniforms = bound.uniforms.map(|slot| {
                    slot.map(|buffer| {
                        let version = match plan.uploads.get(&buffer) {
                            Some(versions) if !versions.is_empty() => {
                                Version::Uploaded(versions.len() - 1)
                            }
                            _ => Version::Previous,
                        };
                        (buffer, version)
                    })
                });
                let pass = plan
                    .passes
                    .last_mut()
                    .ok_or_else(|| invalid("draw with no render target"))?;
                pass.draws.push(PlannedDraw {
                    pipeline: PipelineKey {
                        program,
                        rasterizer,
                        depth_state,
                        target: pass.target.into(),
                    },
                    mesh: *mesh,
                    viewport: bound.viewport,
                    uniforms,
                    texture: bound.texture,
                    shadow: bound.shadow,
                });
            }
            Command::Present { sync_interval } => plan.present = Some(*sync_interval),
        }
    }
    Ok(plan)
}
