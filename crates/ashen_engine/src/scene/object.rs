//! Scene objects and their drawable surfaces

use std::sync::atomic::{AtomicU64, Ordering};

use crate::render::resources::{MeshHandle, TextureHandle};
use crate::scene::Transform;

/// Process-lifetime unique object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Non-owning pairing of a texture and a mesh, the unit of draw-call grouping
///
/// The `(texture, mesh, instanced)` triple is the grouping key for instanced
/// rendering; equality, ordering and hashing are defined over it. Surfaces
/// never own their resources — the handles point into the registries owned by
/// [`crate::render::RenderContext`], which outlive every scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Surface {
    /// Texture sampled by this surface
    pub texture: TextureHandle,
    /// Geometry drawn by this surface
    pub mesh: MeshHandle,
    /// Whether this surface participates in the instanced path
    pub instanced: bool,
}

impl Surface {
    /// Surface drawn through the per-object path
    pub fn new(texture: TextureHandle, mesh: MeshHandle) -> Self {
        Self {
            texture,
            mesh,
            instanced: false,
        }
    }

    /// Surface drawn through the GPU-instanced path
    pub fn instanced(texture: TextureHandle, mesh: MeshHandle) -> Self {
        Self {
            texture,
            mesh,
            instanced: true,
        }
    }
}

/// A named, transformable collection of surfaces owned by a scene
///
/// Created only through [`crate::scene::Scene::add_object`], which assigns a
/// scene-unique name. Surfaces are attached through
/// [`crate::scene::Scene::attach_surface`] so the scene can keep its
/// instanced-surface index current.
#[derive(Debug)]
pub struct Object {
    id: ObjectId,
    name: String,
    /// Spatial transform, freely mutable between frames
    pub transform: Transform,
    surfaces: Vec<Surface>,
}

impl Object {
    pub(crate) fn new(name: String, transform: Transform) -> Self {
        Self {
            id: ObjectId::next(),
            name,
            transform,
            surfaces: Vec::new(),
        }
    }

    /// Unique identifier, stable for the object's lifetime
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Scene-unique display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Surfaces in attachment order
    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    // Index bookkeeping lives in Scene::attach_surface.
    pub(crate) fn push_surface(&mut self, surface: Surface) {
        self.surfaces.push(surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ids_are_unique_and_monotonic() {
        let a = Object::new("a".into(), Transform::identity());
        let b = Object::new("b".into(), Transform::identity());
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_surface_grouping_key_ignores_nothing() {
        let tex = TextureHandle::default();
        let mesh = MeshHandle::default();
        let plain = Surface::new(tex, mesh);
        let inst = Surface::instanced(tex, mesh);
        // Same resources but different instancing flags are distinct keys
        assert_ne!(plain, inst);
        assert_eq!(plain, Surface::new(tex, mesh));
    }
}
