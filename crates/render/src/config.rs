//! Renderer configuration, loadable from YAML.

use serde::{Deserialize, Serialize};
use shadowcast_scene::{CameraSettings, SceneDesc, SceneError};
use std::path::Path;

/// Largest shadow map edge accepted, in texels.
pub const MAX_SHADOW_MAP_SIZE: u32 = 8192;
/// Largest present sync interval accepted.
pub const MAX_SYNC_INTERVAL: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid scene: {0}")]
    Scene(#[from] SceneError),
}

/// Shadow map resolution and the light's orthographic volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub map_size: u32,
    /// Distance from the origin to the light eye, against the light direction.
    pub light_distance: f32,
    /// Half width and half height of the orthographic volume.
    pub ortho_half_extent: f32,
    pub near: f32,
    pub far: f32,
    pub depth_bias: i32,
    pub slope_scaled_bias: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            map_size: 2048,
            light_distance: 20.0,
            ortho_half_extent: 15.0,
            near: 0.1,
            far: 50.0,
            depth_bias: 1000,
            slope_scaled_bias: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub clear_color: [f32; 4],
    /// Vertical blanks to wait per present; 0 disables vsync.
    pub vsync_interval: u32,
    pub shadow: ShadowSettings,
    pub camera: CameraSettings,
    pub scene: SceneDesc,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.247, 0.557, 0.651, 1.0],
            vsync_interval: 1,
            shadow: ShadowSettings::default(),
            camera: CameraSettings::default(),
            scene: SceneDesc::default(),
        }
    }
}

impl RendererConfig {
    /// Load and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let shadow = &self.shadow;
        if shadow.map_size == 0 || shadow.map_size > MAX_SHADOW_MAP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "shadow.map_size must be in 1..={MAX_SHADOW_MAP_SIZE}, got {}",
                shadow.map_size
            )));
        }
        if shadow.ortho_half_extent <= 0.0 {
            return Err(ConfigError::Invalid(
                "shadow.ortho_half_extent must be positive".into(),
            ));
        }
        if shadow.near >= shadow.far {
            return Err(ConfigError::Invalid("shadow.near must be below shadow.far".into()));
        }
        let camera = &self.camera;
        if camera.near <= 0.0 || camera.near >= camera.far {
            return Err(ConfigError::Invalid(
                "camera.near must be positive and below camera.far".into(),
            ));
        }
        if self.vsync_interval > MAX_SYNC_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "vsync_interval must be at most {MAX_SYNC_INTERVAL}, got {}",
                self.vsync_interval
            )));
        }
        self.scene.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RendererConfig::default();
        config.validate().unwrap();
        assert_eq!(config.vsync_interval, 1);
        assert_eq!(config.shadow.map_size, 2048);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = RendererConfig::from_yaml("shadow:\n  map_size: 1024\n").unwrap();
        assert_eq!(config.shadow.map_size, 1024);
        assert_eq!(config.shadow.light_distance, 20.0);
        assert_eq!(config.scene, SceneDesc::default());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = RendererConfig::default();
        config.shadow.map_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RendererConfig::default();
        config.shadow.near = 60.0;
        assert!(config.validate().is_err());

        let mut config = RendererConfig::default();
        config.vsync_interval = 5;
        assert!(config.validate().is_err());

        let mut config = RendererConfig::default();
        config.scene.objects[0].texture = "missing".into();
        assert!(matches!(config.validate(), Err(ConfigError::Scene(_))));
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut config = RendererConfig::default();
        config.clear_color = [0.0, 0.0, 0.0, 1.0];
        config.save(tmp.path()).unwrap();

        let loaded = RendererConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RendererConfig::load(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
