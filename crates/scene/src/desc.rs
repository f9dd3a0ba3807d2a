//! Serializable scene descriptions.
//!
//! A [`SceneDesc`] names textures and places primitives; the renderer turns
//! it into handles and GPU resources during initialization.

use crate::light::Light;
use crate::object::{MeshHandle, Spin, TextureHandle};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use shadowcast_common::Transform;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("object '{object}' references unknown texture '{texture}'")]
    UnknownTexture { object: String, texture: String },
    #[error("texture '{name}' is invalid: {reason}")]
    InvalidTexture { name: String, reason: String },
    #[error("object '{object}' has a spin with a zero axis")]
    ZeroSpinAxis { object: String },
    #[error("light {index} is invalid: {reason}")]
    InvalidLight { index: usize, reason: String },
}

/// Built-in meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// Unit cube centred on the origin.
    Cube,
    /// Unit quad in the XZ plane facing +Y.
    Plane,
}

impl Primitive {
    pub const ALL: [Primitive; 2] = [Primitive::Cube, Primitive::Plane];

    pub fn handle(self) -> MeshHandle {
        MeshHandle(self as u32)
    }

    pub fn from_handle(handle: MeshHandle) -> Option<Self> {
        Self::ALL.get(handle.0 as usize).copied()
    }
}

/// Where texture pixels come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextureSource {
    /// Image file decoded at startup.
    File { path: PathBuf },
    /// Two-colour checkerboard, `cells` squares per side.
    Checker {
        size: u32,
        cells: u32,
        primary: [u8; 4],
        secondary: [u8; 4],
    },
    /// Single texel.
    Solid { color: [u8; 4] },
}

impl TextureSource {
    fn check(&self, name: &str) -> Result<(), SceneError> {
        let invalid = |reason: &str| SceneError::InvalidTexture {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Self::File { path } if path.as_os_str().is_empty() => Err(invalid("empty path")),
            Self::Checker { size, .. } if *size == 0 => Err(invalid("size must be non-zero")),
            Self::Checker { size, cells, .. } if *cells == 0 || cells > size => {
                Err(invalid("cells must be between 1 and size"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDesc {
    pub name: String,
    pub mesh: Primitive,
    /// Key into [`SceneDesc::textures`].
    pub texture: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub spin: Option<Spin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDesc {
    pub textures: BTreeMap<String, TextureSource>,
    pub objects: Vec<ObjectDesc>,
    pub lights: Vec<Light>,
}

impl Default for SceneDesc {
    fn default() -> Self {
        let mut textures = BTreeMap::new();
        textures.insert(
            "checker".to_string(),
            TextureSource::Checker {
                size: 256,
                cells: 8,
                primary: [200, 200, 200, 255],
                secondary: [90, 90, 90, 255],
            },
        );
        textures.insert(
            "crate".to_string(),
            TextureSource::Checker {
                size: 128,
                cells: 4,
                primary: [214, 140, 60, 255],
                secondary: [120, 72, 30, 255],
            },
        );

        let ground = Transform {
            position: Vec3::new(0.0, -0.5, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::new(20.0, 1.0, 20.0),
        };

        Self {
            textures,
            objects: vec![
                ObjectDesc {
                    name: "ground".to_string(),
                    mesh: Primitive::Plane,
                    texture: "checker".to_string(),
                    transform: ground,
                    spin: None,
                },
                ObjectDesc {
                    name: "cube_a".to_string(),
                    mesh: Primitive::Cube,
                    texture: "crate".to_string(),
                    transform: Transform::from_position(Vec3::ZERO),
                    spin: Some(Spin::new(Vec3::Y, 1.0)),
                },
                ObjectDesc {
                    name: "cube_b".to_string(),
                    mesh: Primitive::Cube,
                    texture: "crate".to_string(),
                    transform: Transform::from_position(Vec3::new(3.0, 0.0, 0.0)),
                    spin: Some(Spin::new(Vec3::X, 2.0)),
                },
            ],
            lights: vec![
                Light::directional(Vec3::new(-0.5, -1.0, 0.5)),
                Light::Point {
                    position: Vec3::new(-2.0, 2.0, -2.0),
                    range: 8.0,
                    color: Vec3::new(1.0, 0.85, 0.6),
                    intensity: 0.6,
                },
            ],
        }
    }
}

impl SceneDesc {
    /// An empty scene: no textures, objects or lights.
    pub fn empty() -> Self {
        Self {
            textures: BTreeMap::new(),
            objects: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Handle for a named texture: its position in key order.
    pub fn texture_handle(&self, name: &str) -> Option<TextureHandle> {
        self.textures
            .keys()
            .position(|key| key == name)
            .map(|index| TextureHandle(index as u32))
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        for (name, source) in &self.textures {
            source.check(name)?;
        }
        for object in &self.objects {
            if !self.textures.contains_key(&object.texture) {
                return Err(SceneError::UnknownTexture {
                    object: object.name.clone(),
                    texture: object.texture.clone(),
                });
            }
            if let Some(spin) = object.spin {
                if spin.axis.length_squared() == 0.0 {
                    return Err(SceneError::ZeroSpinAxis {
                        object: object.name.clone(),
                    });
                }
            }
        }
        for (index, light) in self.lights.iter().enumerate() {
            match *light {
                Light::Directional { direction, .. } if direction.length_squared() == 0.0 => {
                    return Err(SceneError::InvalidLight {
                        index,
                        reason: "direction must be non-zero".to_string(),
                    });
                }
                Light::Point { range, .. } if range <= 0.0 => {
                    return Err(SceneError::InvalidLight {
                        index,
                        reason: "range must be positive".to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
