use glam::Vec2;
use std::collections::HashSet;

/// Keys the renderer reacts to. The platform layer maps its own key codes here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Held keys and buttons plus the motion accumulated since the last poll.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys_down: HashSet<Key>,
    buttons_down: HashSet<MouseButton>,
    mouse_delta: Vec2,
    wheel_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        if pressed {
            self.keys_down.insert(key);
        } else {
            self.keys_down.remove(&key);
        }
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn set_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.buttons_down.insert(button);
        } else {
            self.buttons_down.remove(&button);
        }
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    /// Accumulate raw pointer motion in pixels.
    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    /// Pointer motion since the last `end_frame`.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Accumulate wheel motion in notches; positive scrolls away from the user.
    pub fn add_wheel_delta(&mut self, delta: f32) {
        self.wheel_delta += delta;
    }

    pub fn wheel_delta(&self) -> f32 {
        self.wheel_delta
    }

    /// Return the accumulated wheel motion and reset it to zero.
    pub fn take_wheel_delta(&mut self) -> f32 {
        std::mem::take(&mut self.wheel_delta)
    }

    /// Drop per-frame pointer motion. Held keys and buttons persist.
    pub fn end_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Release everything, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        if !self.keys_down.is_empty() || !self.buttons_down.is_empty() {
            tracing::debug!("clearing held input");
        }
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_track_press_and_release() {
        let mut input = InputState::new();
        input.set_key(Key::W, true);
        assert!(input.is_key_down(Key::W));
        assert!(!input.is_key_down(Key::S));
        input.set_key(Key::W, false);
        assert!(!input.is_key_down(Key::W));
    }

    #[test]
    fn mouse_delta_accumulates_until_end_frame() {
        let mut input = InputState::new();
        input.add_mouse_delta(3.0, -1.0);
        input.add_mouse_delta(2.0, 4.0);
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, 3.0));
        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn wheel_delta_survives_end_frame_but_not_take() {
        let mut input = InputState::new();
        input.add_wheel_delta(1.0);
        input.end_frame();
        assert_eq!(input.wheel_delta(), 1.0);
        assert_eq!(input.take_wheel_delta(), 1.0);
        assert_eq!(input.wheel_delta(), 0.0);
    }

    #[test]
    fn clear_releases_everything() {
        let mut input = InputState::new();
        input.set_key(Key::A, true);
        input.set_button(MouseButton::Right, true);
        input.add_wheel_delta(2.0);
        input.clear();
        assert!(!input.is_key_down(Key::A));
        assert!(!input.is_button_down(MouseButton::Right));
        assert_eq!(input.wheel_delta(), 0.0);
    }
}
