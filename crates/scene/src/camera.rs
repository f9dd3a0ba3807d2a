use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use shadowcast_input::{InputState, Key, MouseButton};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Startup values for the free-fly camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    /// Radians about +Y; zero looks down +Z.
    pub yaw: f32,
    /// Radians above the horizon.
    pub pitch: f32,
    /// World units per second.
    pub move_speed: f32,
    /// Radians per pixel of mouse motion.
    pub look_sensitivity: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Pitch stays this far short of straight up or down.
    pub pitch_margin: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(1.5, 1.5, -5.0),
            yaw: 0.0,
            pitch: -0.3,
            move_speed: 5.0,
            look_sensitivity: 0.002,
            fov_y: FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            pitch_margin: 0.1,
        }
    }
}

/// Free-fly camera driven by yaw and pitch, left-handed.
///
/// The view is built from a look direction, not a target point.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub move_speed: f32,
    pub look_sensitivity: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pitch_margin: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

impl Camera {
    pub fn from_settings(settings: &CameraSettings) -> Self {
        let mut camera = Self {
            position: settings.position,
            yaw: settings.yaw,
            pitch: settings.pitch,
            move_speed: settings.move_speed,
            look_sensitivity: settings.look_sensitivity,
            fov_y: settings.fov_y,
            near: settings.near,
            far: settings.far,
            pitch_margin: settings.pitch_margin,
        };
        camera.pitch = camera.clamp_pitch(camera.pitch);
        camera
    }

    /// Largest pitch magnitude the camera will accept.
    pub fn max_pitch(&self) -> f32 {
        FRAC_PI_2 - self.pitch_margin
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        let limit = self.max_pitch();
        pitch.clamp(-limit, limit)
    }

    /// Unit look direction from yaw and pitch.
    pub fn forward(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    /// Screen-right direction; horizontal because pitch never reaches ±90°.
    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward()).normalize()
    }

    /// Apply one frame of input: mouse look while the right button is held,
    /// WASD movement, and a wheel dolly along the look direction.
    ///
    /// The wheel delta is consumed.
    pub fn update(&mut self, input: &mut InputState, dt: f32) {
        if input.is_button_down(MouseButton::Right) {
            let delta = input.mouse_delta() * self.look_sensitivity;
            self.yaw += delta.x;
            self.pitch = self.clamp_pitch(self.pitch - delta.y);
        }

        let forward = self.forward();
        let right = self.right();
        let step = self.move_speed * dt;

        if input.is_key_down(Key::W) {
            self.position += forward * step;
        }
        if input.is_key_down(Key::S) {
            self.position -= forward * step;
        }
        if input.is_key_down(Key::D) {
            self.position += right * step;
        }
        if input.is_key_down(Key::A) {
            self.position -= right * step;
        }

        let wheel = input.take_wheel_delta();
        if wheel != 0.0 {
            self.position += forward * wheel * self.move_speed * 0.5;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_lh(self.position, self.forward(), Vec3::Y)
    }

    /// Perspective projection with 0..1 depth.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, aspect_ratio, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::new(1.5, 1.5, -5.0));
        let vp = cam.projection_matrix(16.0 / 9.0) * cam.view_matrix();
        assert!(!vp.is_nan());
    }

    #[test]
    fn zero_yaw_and_pitch_looks_down_positive_z() {
        let cam = Camera::from_settings(&CameraSettings {
            pitch: 0.0,
            ..CameraSettings::default()
        });
        assert!(cam.forward().abs_diff_eq(Vec3::Z, 1e-6));
        assert!(cam.right().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn pitch_is_clamped_after_many_updates() {
        let mut cam = Camera::default();
        let mut input = InputState::new();
        input.set_button(MouseButton::Right, true);
        let limit = FRAC_PI_2 - 0.1;

        for _ in 0..500 {
            input.add_mouse_delta(3.0, -400.0);
            cam.update(&mut input, 0.016);
            input.end_frame();
            assert!(cam.pitch <= limit + 1e-6);
        }
        assert!((cam.pitch - limit).abs() < 1e-6);

        for _ in 0..500 {
            input.add_mouse_delta(-3.0, 400.0);
            cam.update(&mut input, 0.016);
            input.end_frame();
            assert!(cam.pitch >= -limit - 1e-6);
        }
        assert!((cam.pitch + limit).abs() < 1e-6);
        assert!(!cam.view_matrix().is_nan());
    }

    #[test]
    fn look_requires_right_button() {
        let mut cam = Camera::default();
        let before = (cam.yaw, cam.pitch);
        let mut input = InputState::new();
        input.add_mouse_delta(100.0, 100.0);
        cam.update(&mut input, 0.016);
        assert_eq!((cam.yaw, cam.pitch), before);
    }

    #[test]
    fn keys_move_along_basis() {
        let mut cam = Camera::from_settings(&CameraSettings {
            position: Vec3::ZERO,
            pitch: 0.0,
            move_speed: 2.0,
            ..CameraSettings::default()
        });
        let mut input = InputState::new();
        input.set_key(Key::W, true);
        cam.update(&mut input, 0.5);
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));

        input.set_key(Key::W, false);
        input.set_key(Key::D, true);
        cam.update(&mut input, 0.5);
        assert!(cam.position.abs_diff_eq(Vec3::new(1.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn wheel_dollies_and_is_consumed() {
        let mut cam = Camera::from_settings(&CameraSettings {
            position: Vec3::ZERO,
            pitch: 0.0,
            move_speed: 4.0,
            ..CameraSettings::default()
        });
        let mut input = InputState::new();
        input.add_wheel_delta(1.0);
        cam.update(&mut input, 0.016);
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6));
        assert_eq!(input.wheel_delta(), 0.0);

        cam.update(&mut input, 0.016);
        assert!(cam.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-6));
    }

    #[test]
    fn view_matrix_puts_camera_at_origin_looking_down_z() {
        let cam = Camera::default();
        let view = cam.view_matrix();
        assert!(view.transform_point3(cam.position).abs_diff_eq(Vec3::ZERO, 1e-5));
        let ahead = view.transform_point3(cam.position + cam.forward() * 3.0);
        assert!(ahead.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn settings_clamp_initial_pitch() {
        let cam = Camera::from_settings(&CameraSettings {
            pitch: 3.0,
            ..CameraSettings::default()
        });
        assert!((cam.pitch - cam.max_pitch()).abs() < 1e-6);
    }
}
