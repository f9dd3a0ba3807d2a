use crate::ids::{MeshId, TextureId};
use shadowcast_scene::{MeshHandle, TextureHandle};
use std::collections::BTreeMap;

/// Resolves scene handles to device resources.
///
/// Objects only ever hold handles, so clearing the registry leaves nothing
/// dangling; lookups simply start failing.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    meshes: BTreeMap<MeshHandle, MeshId>,
    textures: BTreeMap<TextureHandle, TextureId>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_mesh(&mut self, handle: MeshHandle, id: MeshId) {
        self.meshes.insert(handle, id);
    }

    pub fn insert_texture(&mut self, handle: TextureHandle, id: TextureId) {
        self.textures.insert(handle, id);
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<MeshId> {
        self.meshes.get(&handle).copied()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<TextureId> {
        self.textures.get(&handle).copied()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
        self.textures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_and_clear() {
        let mut registry = ResourceRegistry::new();
        registry.insert_mesh(MeshHandle(0), MeshId(4));
        registry.insert_texture(TextureHandle(1), TextureId(9));
        assert_eq!(registry.mesh(MeshHandle(0)), Some(MeshId(4)));
        assert_eq!(registry.texture(TextureHandle(1)), Some(TextureId(9)));
        assert_eq!(registry.texture(TextureHandle(0)), None);

        registry.clear();
        assert_eq!(registry.mesh(MeshHandle(0)), None);
        assert_eq!(registry.mesh_count() + registry.texture_count(), 0);
    }
}
