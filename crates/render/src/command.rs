//! Recorded frame commands and shadow-map hazard tracking.
//!
//! The renderer never talks to the GPU directly: it records a
//! [`CommandList`] per frame and hands it to a [`RenderDevice`](crate::RenderDevice).

use crate::ids::{BufferId, DepthStateId, MeshId, ProgramId, RasterizerId, SamplerId, ShadowMapId, TextureId};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Slot the object texture is bound to in the pixel stage.
pub const TEXTURE_SLOT: u32 = 0;
/// Slot the shadow map's sampled view is bound to in the pixel stage.
pub const SHADOW_MAP_SLOT: u32 = 1;
/// Constant-buffer slot of the per-object record.
pub const PER_OBJECT_SLOT: u32 = 0;
/// Constant-buffer slot of the per-frame light record.
pub const LIGHTS_SLOT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTarget {
    /// Depth-only: the shadow map's depth view, no color target.
    ShadowMap(ShadowMapId),
    /// Swapchain color plus the back-buffer depth.
    BackBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

fn byte_len<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(data.len() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Null-bind a pixel-stage shader resource slot.
    UnbindShaderResource { slot: u32 },
    SetRasterizerState { state: RasterizerId },
    SetDepthStencilState { state: DepthStateId },
    SetRenderTarget { target: RenderTarget },
    SetViewport { viewport: Viewport },
    ClearDepth { target: RenderTarget, depth: f32 },
    /// Clears the back-buffer color target.
    ClearColor { color: [f32; 4] },
    BindProgram { program: ProgramId },
    BindConstantBuffer {
        stage: ShaderStage,
        slot: u32,
        buffer: BufferId,
    },
    /// Replace the whole buffer contents. Later draws see the new data;
    /// earlier draws keep what they saw.
    UpdateBuffer {
        buffer: BufferId,
        #[serde(rename = "bytes", serialize_with = "byte_len")]
        data: Vec<u8>,
    },
    /// Bind the shadow map's sampled view with a comparison sampler.
    BindShadowMap {
        slot: u32,
        shadow_map: ShadowMapId,
        sampler: SamplerId,
    },
    BindTexture {
        slot: u32,
        texture: TextureId,
        sampler: SamplerId,
    },
    DrawIndexed { mesh: MeshId },
    Present { sync_interval: u32 },
}

/// One frame's worth of commands, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HazardError {
    #[error("shadow map {shadow_map:?} set as render target while still sampled in slot {slot}")]
    TargetWhileSampled { shadow_map: ShadowMapId, slot: u32 },
    #[error("shadow map {shadow_map:?} sampled in slot {slot} while it is the render target")]
    SampledWhileTarget { shadow_map: ShadowMapId, slot: u32 },
}

/// Tracks which shadow map views are bound, across frames.
///
/// A shadow map's depth view and sampled view must never be bound at the
/// same time.
#[derive(Debug, Clone, Default)]
pub struct HazardTracker {
    target: Option<RenderTarget>,
    sampled: BTreeMap<u32, ShadowMapId>,
}

impl HazardTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: &Command) -> Result<(), HazardError> {
        match *command {
            Command::UnbindShaderResource { slot } | Command::BindTexture { slot, .. } => {
                self.sampled.remove(&slot);
            }
            Command::BindShadowMap {
                slot, shadow_map, ..
            } => {
                if self.target == Some(RenderTarget::ShadowMap(shadow_map)) {
                    return Err(HazardError::SampledWhileTarget { shadow_map, slot });
                }
                self.sampled.insert(slot, shadow_map);
            }
            Command::SetRenderTarget { target } => {
                if let RenderTarget::ShadowMap(shadow_map) = target {
                    if let Some((&slot, _)) = self.sampled.iter().find(|(_, id)| **id == shadow_map) {
                        return Err(HazardError::TargetWhileSampled { shadow_map, slot });
                    }
                }
                self.target = Some(target);
            }
            _ => {}
        }
        Ok(())
    }

    /// Check a whole list. State only advances if every command passes.
    pub fn validate(&mut self, list: &CommandList) -> Result<(), HazardError> {
        let mut next = self.clone();
        for command in list {
            next.apply(command)?;
        }
        *self = next;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: ShadowMapId = ShadowMapId(7);
    const CMP: SamplerId = SamplerId(2);

    fn shadow_then_main(unbind: bool) -> CommandList {
        let mut list = CommandList::new();
        if unbind {
            list.push(Command::UnbindShaderResource {
                slot: SHADOW_MAP_SLOT,
            });
        }
        list.push(Command::SetRenderTarget {
            target: RenderTarget::ShadowMap(MAP),
        });
        list.push(Command::SetRenderTarget {
            target: RenderTarget::BackBuffer,
        });
        list.push(Command::BindShadowMap {
            slot: SHADOW_MAP_SLOT,
            shadow_map: MAP,
            sampler: CMP,
        });
        list
    }

    #[test]
    fn unbind_before_write_passes_every_frame() {
        let mut tracker = HazardTracker::new();
        for _ in 0..3 {
            tracker.validate(&shadow_then_main(true)).unwrap();
        }
    }

    #[test]
    fn missing_unbind_fails_on_second_frame() {
        let mut tracker = HazardTracker::new();
        tracker.validate(&shadow_then_main(false)).unwrap();
        let err = tracker.validate(&shadow_then_main(false)).unwrap_err();
        assert_eq!(
            err,
            HazardError::TargetWhileSampled {
                shadow_map: MAP,
                slot: SHADOW_MAP_SLOT
            }
        );
    }

    #[test]
    fn sampling_the_current_target_fails() {
        let mut tracker = HazardTracker::new();
        let mut list = CommandList::new();
        list.push(Command::SetRenderTarget {
            target: RenderTarget::ShadowMap(MAP),
        });
        list.push(Command::BindShadowMap {
            slot: SHADOW_MAP_SLOT,
            shadow_map: MAP,
            sampler: CMP,
        });
        assert!(matches!(
            tracker.validate(&list),
            Err(HazardError::SampledWhileTarget { .. })
        ));
    }

    #[test]
    fn failed_list_leaves_state_untouched() {
        let mut tracker = HazardTracker::new();
        tracker.validate(&shadow_then_main(true)).unwrap();
        assert!(tracker.validate(&shadow_then_main(false)).is_err());
        tracker.validate(&shadow_then_main(true)).unwrap();
    }

    #[test]
    fn texture_bind_replaces_sampled_shadow_map() {
        let mut tracker = HazardTracker::new();
        tracker.validate(&shadow_then_main(true)).unwrap();
        let mut list = CommandList::new();
        list.push(Command::BindTexture {
            slot: SHADOW_MAP_SLOT,
            texture: TextureId(1),
            sampler: CMP,
        });
        list.push(Command::SetRenderTarget {
            target: RenderTarget::ShadowMap(MAP),
        });
        tracker.validate(&list).unwrap();
    }

    #[test]
    fn update_buffer_serializes_length_only() {
        let cmd = Command::UpdateBuffer {
            buffer: BufferId(3),
            data: vec![0; 320],
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["op"], "update_buffer");
        assert_eq!(json["bytes"], 320);
        assert_eq!(json["buffer"], 3);
    }
}
