//! GPU resource registry
//!
//! Meshes and textures live in generational arenas and are referred to by
//! copyable handles. A handle outliving its resource resolves to `None`
//! rather than dangling, so scene data can safely retain handles across
//! unloads.

use slotmap::{new_key_type, SlotMap};

use crate::render::vulkan::{Mesh, Texture};

new_key_type! {
    /// Handle to a mesh owned by a [`ResourceRegistry`]
    pub struct MeshHandle;

    /// Handle to a texture owned by a [`ResourceRegistry`]
    pub struct TextureHandle;
}

/// Owns all GPU meshes and textures for a context
pub struct ResourceRegistry {
    meshes: SlotMap<MeshHandle, Mesh>,
    textures: SlotMap<TextureHandle, Texture>,
    default_texture: TextureHandle,
}

impl ResourceRegistry {
    /// Create a registry seeded with `default_texture` for untextured surfaces
    pub fn new(default_texture: Texture) -> Self {
        let mut textures = SlotMap::with_key();
        let default_texture = textures.insert(default_texture);
        Self {
            meshes: SlotMap::with_key(),
            textures,
            default_texture,
        }
    }

    /// Register a mesh and return its handle
    pub fn insert_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    /// Register a texture and return its handle
    pub fn insert_texture(&mut self, texture: Texture) -> TextureHandle {
        self.textures.insert(texture)
    }

    /// Resolve a mesh handle, `None` if it was removed
    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    /// Resolve a texture handle, `None` if it was removed
    pub fn texture(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(handle)
    }

    /// Handle of the built-in 1x1 white texture
    pub fn default_texture(&self) -> TextureHandle {
        self.default_texture
    }

    /// Remove a mesh; existing handles to it become stale
    pub fn remove_mesh(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle)
    }

    /// Remove a texture; the default texture cannot be removed
    pub fn remove_texture(&mut self, handle: TextureHandle) -> Option<Texture> {
        if handle == self.default_texture {
            log::warn!("attempted to remove the default texture, ignored");
            return None;
        }
        self.textures.remove(handle)
    }
}
