use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Lights packed into the per-frame light record.
pub const MAX_LIGHTS: usize = 8;

/// `GpuLight::kind` tag for directional lights.
pub const LIGHT_DIRECTIONAL: u32 = 0;
/// `GpuLight::kind` tag for point lights.
pub const LIGHT_POINT: u32 = 1;

fn white() -> Vec3 {
    Vec3::ONE
}

fn unit() -> f32 {
    1.0
}

/// A scene light as authored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Light {
    /// Parallel rays travelling along `direction`.
    Directional {
        direction: Vec3,
        #[serde(default = "white")]
        color: Vec3,
        #[serde(default = "unit")]
        intensity: f32,
    },
    /// Omni light fading linearly to zero at `range`.
    Point {
        position: Vec3,
        #[serde(default = "unit")]
        range: f32,
        #[serde(default = "white")]
        color: Vec3,
        #[serde(default = "unit")]
        intensity: f32,
    },
}

impl Default for Light {
    fn default() -> Self {
        Self::Directional {
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3) -> Self {
        Self::Directional {
            direction,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }

    pub fn point(position: Vec3, range: f32) -> Self {
        Self::Point {
            position,
            range,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }

    pub fn color(&self) -> Vec3 {
        match *self {
            Self::Directional { color, .. } | Self::Point { color, .. } => color,
        }
    }

    pub fn intensity(&self) -> f32 {
        match *self {
            Self::Directional { intensity, .. } | Self::Point { intensity, .. } => intensity,
        }
    }

    /// Travel direction for directional lights.
    pub fn direction(&self) -> Option<Vec3> {
        match *self {
            Self::Directional { direction, .. } => Some(direction),
            Self::Point { .. } => None,
        }
    }

    pub fn kind(&self) -> u32 {
        match self {
            Self::Directional { .. } => LIGHT_DIRECTIONAL,
            Self::Point { .. } => LIGHT_POINT,
        }
    }

    pub fn to_gpu(&self) -> GpuLight {
        match *self {
            Self::Directional {
                direction,
                color,
                intensity,
            } => GpuLight {
                color: color.to_array(),
                kind: LIGHT_DIRECTIONAL,
                direction: direction.normalize_or_zero().to_array(),
                range: 1.0,
                position: [0.0; 3],
                intensity,
            },
            Self::Point {
                position,
                range,
                color,
                intensity,
            } => GpuLight {
                color: color.to_array(),
                kind: LIGHT_POINT,
                direction: [0.0; 3],
                range,
                position: position.to_array(),
                intensity,
            },
        }
    }
}

/// Shader-side light layout: three 16-byte rows.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuLight {
    pub color: [f32; 3],
    pub kind: u32,
    pub direction: [f32; 3],
    pub range: f32,
    pub position: [f32; 3],
    pub intensity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_light_layout() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 48);
        assert_eq!(std::mem::offset_of!(GpuLight, direction), 16);
        assert_eq!(std::mem::offset_of!(GpuLight, position), 32);
    }

    #[test]
    fn default_is_white_downward_sun() {
        let light = Light::default();
        assert_eq!(light.direction(), Some(Vec3::NEG_Y));
        assert_eq!(light.color(), Vec3::ONE);
        assert_eq!(light.intensity(), 1.0);
    }

    #[test]
    fn directional_packs_normalized_direction() {
        let gpu = Light::directional(Vec3::new(0.0, -4.0, 0.0)).to_gpu();
        assert_eq!(gpu.kind, LIGHT_DIRECTIONAL);
        assert_eq!(gpu.direction, [0.0, -1.0, 0.0]);
        assert_eq!(gpu.range, 1.0);
    }

    #[test]
    fn point_packs_position_and_range() {
        let gpu = Light::point(Vec3::new(1.0, 2.0, 3.0), 6.0).to_gpu();
        assert_eq!(gpu.kind, LIGHT_POINT);
        assert_eq!(gpu.position, [1.0, 2.0, 3.0]);
        assert_eq!(gpu.range, 6.0);
    }

    #[test]
    fn yaml_tagged_with_defaults() {
        let yaml = "type: point\nposition: [0.0, 3.0, 0.0]\n";
        let light: Light = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(light, Light::point(Vec3::new(0.0, 3.0, 0.0), 1.0));

        let yaml = "type: directional\ndirection: [-0.5, -1.0, 0.5]\nintensity: 0.8\n";
        let light: Light = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(light.intensity(), 0.8);
        assert_eq!(light.color(), Vec3::ONE);
    }
}
