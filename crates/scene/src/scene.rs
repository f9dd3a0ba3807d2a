use crate::camera::Camera;
use crate::desc::{SceneDesc, SceneError};
use crate::light::{Light, MAX_LIGHTS};
use crate::object::RenderObject;
use glam::Vec3;

/// Everything the renderer draws in a frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub camera: Camera,
    objects: Vec<RenderObject>,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            objects: Vec::new(),
            lights: Vec::new(),
        }
    }

    /// Build objects and lights from a description. Mesh handles come from
    /// the primitive, texture handles from [`SceneDesc::texture_handle`].
    pub fn from_desc(desc: &SceneDesc, camera: Camera) -> Result<Self, SceneError> {
        desc.validate()?;
        let mut scene = Self::new(camera);
        for object in &desc.objects {
            let texture =
                desc.texture_handle(&object.texture)
                    .ok_or_else(|| SceneError::UnknownTexture {
                        object: object.name.clone(),
                        texture: object.texture.clone(),
                    })?;
            let mut entity = RenderObject::new(object.name.clone(), object.mesh.handle(), texture)
                .with_transform(object.transform);
            entity.spin = object.spin;
            scene.add_object(entity);
        }
        for light in &desc.lights {
            scene.add_light(*light);
        }
        Ok(scene)
    }

    pub fn add_object(&mut self, object: RenderObject) {
        self.objects.push(object);
    }

    /// Add a light. Returns `false` when the light is past [`MAX_LIGHTS`]
    /// and will be left out of the shaded light set; it is still stored.
    pub fn add_light(&mut self, light: Light) -> bool {
        self.lights.push(light);
        let count = self.lights.len();
        if count == MAX_LIGHTS + 1 {
            tracing::warn!(
                capacity = MAX_LIGHTS,
                "more lights than the light record holds; extra lights are ignored"
            );
        }
        count <= MAX_LIGHTS
    }

    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [RenderObject] {
        &mut self.objects
    }

    pub fn object(&self, name: &str) -> Option<&RenderObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Direction of the first directional light, which casts the shadow.
    pub fn shadow_caster(&self) -> Option<Vec3> {
        self.lights.iter().find_map(Light::direction)
    }

    /// Drop all objects and lights; the camera is kept.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.lights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Primitive;
    use crate::object::TextureHandle;

    #[test]
    fn from_default_desc() {
        let scene = Scene::from_desc(&SceneDesc::default(), Camera::default()).unwrap();
        assert_eq!(scene.objects().len(), 3);
        assert_eq!(scene.lights().len(), 2);

        let ground = scene.object("ground").unwrap();
        assert_eq!(ground.mesh, Primitive::Plane.handle());
        assert_eq!(ground.texture, TextureHandle(0));
        let cube = scene.object("cube_b").unwrap();
        assert_eq!(cube.mesh, Primitive::Cube.handle());
        assert_eq!(cube.transform.position, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn shadow_caster_is_first_directional() {
        let mut scene = Scene::default();
        assert_eq!(scene.shadow_caster(), None);
        scene.add_light(Light::point(Vec3::ONE, 4.0));
        scene.add_light(Light::directional(Vec3::X));
        scene.add_light(Light::directional(Vec3::Z));
        assert_eq!(scene.shadow_caster(), Some(Vec3::X));
    }

    #[test]
    fn invalid_desc_is_rejected() {
        let mut desc = SceneDesc::default();
        desc.objects[2].texture = "gone".to_string();
        assert!(Scene::from_desc(&desc, Camera::default()).is_err());
    }

    #[test]
    fn clear_keeps_camera() {
        let mut scene = Scene::from_desc(&SceneDesc::default(), Camera::default()).unwrap();
        scene.camera.position = Vec3::splat(9.0);
        scene.clear();
        assert!(scene.objects().is_empty());
        assert!(scene.lights().is_empty());
        assert_eq!(scene.camera.position, Vec3::splat(9.0));
    }

    #[test]
    fn lights_past_capacity_are_flagged() {
        let mut scene = Scene::default();
        for i in 0..MAX_LIGHTS {
            assert!(scene.add_light(Light::point(Vec3::splat(i as f32), 1.0)));
        }
        assert!(!scene.add_light(Light::default()));
        assert!(!scene.add_light(Light::default()));
        assert_eq!(scene.lights().len(), MAX_LIGHTS + 2);
    }
}
