use crate::config::ShadowSettings;
use glam::{Mat4, Vec3};

/// View and orthographic projection of the shadow-casting light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    pub eye: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl LightSpace {
    /// Place the light `light_distance` back along `direction` from the
    /// origin, looking at the origin. With no caster the light points down.
    pub fn new(direction: Option<Vec3>, settings: &ShadowSettings) -> Self {
        let direction = direction
            .and_then(Vec3::try_normalize)
            .unwrap_or(Vec3::NEG_Y);
        let up = if direction.dot(Vec3::Y).abs() > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let eye = -direction * settings.light_distance;
        let h = settings.ortho_half_extent;
        Self {
            eye,
            view: Mat4::look_at_lh(eye, Vec3::ZERO, up),
            projection: Mat4::orthographic_lh(-h, h, -h, h, settings.near, settings.far),
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_lands_in_map_center() {
        let settings = ShadowSettings::default();
        let space = LightSpace::new(Some(Vec3::new(-0.5, -1.0, 0.5)), &settings);
        let clip = space.view_projection().project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn closer_to_light_is_shallower() {
        let settings = ShadowSettings::default();
        let dir = Vec3::new(-0.5, -1.0, 0.5);
        let space = LightSpace::new(Some(dir), &settings);
        let vp = space.view_projection();
        let near = vp.project_point3(-dir.normalize() * 2.0);
        let far = vp.project_point3(dir.normalize() * 2.0);
        assert!(near.z < far.z);
    }

    #[test]
    fn vertical_light_uses_alternate_up() {
        let space = LightSpace::new(Some(Vec3::NEG_Y), &ShadowSettings::default());
        assert!(!space.view.is_nan());
        assert!(space.eye.abs_diff_eq(Vec3::new(0.0, 20.0, 0.0), 1e-5));
    }

    #[test]
    fn no_caster_defaults_downward() {
        let settings = ShadowSettings::default();
        assert_eq!(
            LightSpace::new(None, &settings),
            LightSpace::new(Some(Vec3::NEG_Y), &settings)
        );
        assert_eq!(
            LightSpace::new(Some(Vec3::ZERO), &settings),
            LightSpace::new(None, &settings)
        );
    }
}
