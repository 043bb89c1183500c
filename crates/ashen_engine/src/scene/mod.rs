//! Scene graph: objects, lights, camera and the instanced-surface index

pub mod camera;
pub mod lights;
pub mod object;
pub mod transform;

pub use camera::Camera;
pub use lights::{
    Attenuation, DirectionalLight, LightColor, LightRef, LightRefMut, PointLight, SpotLight,
    MAX_LIGHTS_PER_KIND,
};
pub use object::{Object, ObjectId, Surface};
pub use transform::Transform;

use std::collections::{BTreeMap, HashSet};

/// Mutable collection of named objects and lights plus the active camera
///
/// The scene also maintains the instanced-surface index: for every distinct
/// [`Surface`] key with the instanced flag set, the list of objects using it,
/// in attachment order. The index is updated incrementally as surfaces are
/// attached and is consulted read-only each frame by the instanced render
/// system; the `BTreeMap` gives it a deterministic iteration order.
pub struct Scene {
    /// Active camera
    pub camera: Camera,
    objects: Vec<Object>,
    directional_lights: Vec<DirectionalLight>,
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    names: HashSet<String>,
    instanced_index: BTreeMap<Surface, Vec<ObjectId>>,
}

impl Scene {
    /// Empty scene with a default camera
    pub fn new() -> Self {
        Self {
            camera: Camera::new(),
            objects: Vec::new(),
            directional_lights: Vec::new(),
            point_lights: Vec::new(),
            spot_lights: Vec::new(),
            names: HashSet::new(),
            instanced_index: BTreeMap::new(),
        }
    }

    /// Add an object, deduplicating its name and attaching `surfaces`
    ///
    /// The returned reference stays valid until the object is removed.
    pub fn add_object(&mut self, name: &str, surfaces: Vec<Surface>) -> &mut Object {
        let unique = self.dedup_name(name);
        self.names.insert(unique.clone());
        let mut object = Object::new(unique, Transform::identity());
        for surface in surfaces {
            Self::register_surface(&mut self.instanced_index, object.id(), surface);
            object.push_surface(surface);
        }
        log::debug!("Scene: added object '{}'", object.name());
        self.objects.push(object);
        self.objects.last_mut().expect("object just pushed")
    }

    /// Attach a surface to an existing object
    ///
    /// Returns false when no object with `id` exists. Instanced surfaces are
    /// also registered in the instanced-surface index.
    pub fn attach_surface(&mut self, id: ObjectId, surface: Surface) -> bool {
        let Some(object) = self.objects.iter_mut().find(|o| o.id() == id) else {
            return false;
        };
        Self::register_surface(&mut self.instanced_index, id, surface);
        object.push_surface(surface);
        true
    }

    fn register_surface(
        index: &mut BTreeMap<Surface, Vec<ObjectId>>,
        id: ObjectId,
        surface: Surface,
    ) {
        if surface.instanced {
            index.entry(surface).or_default().push(id);
        }
    }

    /// Remove the object with the given name
    ///
    /// Returns false when no such object exists.
    pub fn remove_object_by_name(&mut self, name: &str) -> bool {
        let Some(position) = self.objects.iter().position(|o| o.name() == name) else {
            return false;
        };
        let object = self.objects.remove(position);
        self.names.remove(object.name());
        for group in self.instanced_index.values_mut() {
            group.retain(|&id| id != object.id());
        }
        self.instanced_index.retain(|_, group| !group.is_empty());
        log::debug!("Scene: removed object '{}'", object.name());
        true
    }

    /// Look up an object by name
    pub fn find_object_by_name(&self, name: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.name() == name)
    }

    /// Look up an object by name, mutably
    pub fn find_object_by_name_mut(&mut self, name: &str) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| o.name() == name)
    }

    /// Look up an object by id
    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.iter().find(|o| o.id() == id)
    }

    /// All objects in insertion order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Add a directional light under a deduplicated name
    ///
    /// Returns `None` when the category is at [`MAX_LIGHTS_PER_KIND`]; the
    /// light budget being exhausted is an expected outcome the caller must
    /// handle, not an error.
    pub fn add_directional_light(
        &mut self,
        name: &str,
        mut light: DirectionalLight,
    ) -> Option<&mut DirectionalLight> {
        if self.directional_lights.len() >= MAX_LIGHTS_PER_KIND {
            log::warn!("Scene: directional light budget exhausted, '{name}' not added");
            return None;
        }
        light.name = self.dedup_name(name);
        self.names.insert(light.name.clone());
        self.directional_lights.push(light);
        self.directional_lights.last_mut()
    }

    /// Add a point light under a deduplicated name
    ///
    /// Returns `None` when the category is at capacity.
    pub fn add_point_light(&mut self, name: &str, mut light: PointLight) -> Option<&mut PointLight> {
        if self.point_lights.len() >= MAX_LIGHTS_PER_KIND {
            log::warn!("Scene: point light budget exhausted, '{name}' not added");
            return None;
        }
        light.name = self.dedup_name(name);
        self.names.insert(light.name.clone());
        self.point_lights.push(light);
        self.point_lights.last_mut()
    }

    /// Add a spot light under a deduplicated name
    ///
    /// Returns `None` when the category is at capacity.
    pub fn add_spot_light(&mut self, name: &str, mut light: SpotLight) -> Option<&mut SpotLight> {
        if self.spot_lights.len() >= MAX_LIGHTS_PER_KIND {
            log::warn!("Scene: spot light budget exhausted, '{name}' not added");
            return None;
        }
        light.name = self.dedup_name(name);
        self.names.insert(light.name.clone());
        self.spot_lights.push(light);
        self.spot_lights.last_mut()
    }

    /// Remove whichever light matches the name, from any category
    ///
    /// Returns false when no such light exists.
    pub fn remove_light_by_name(&mut self, name: &str) -> bool {
        if let Some(position) = self.directional_lights.iter().position(|l| l.name == name) {
            self.directional_lights.remove(position);
        } else if let Some(position) = self.point_lights.iter().position(|l| l.name == name) {
            self.point_lights.remove(position);
        } else if let Some(position) = self.spot_lights.iter().position(|l| l.name == name) {
            self.spot_lights.remove(position);
        } else {
            return false;
        }
        self.names.remove(name);
        true
    }

    /// Look up a light by name across all categories
    pub fn find_light_by_name(&self, name: &str) -> Option<LightRef<'_>> {
        if let Some(light) = self.directional_lights.iter().find(|l| l.name == name) {
            return Some(LightRef::Directional(light));
        }
        if let Some(light) = self.point_lights.iter().find(|l| l.name == name) {
            return Some(LightRef::Point(light));
        }
        self.spot_lights
            .iter()
            .find(|l| l.name == name)
            .map(LightRef::Spot)
    }

    /// Look up a light by name across all categories, mutably
    pub fn find_light_by_name_mut(&mut self, name: &str) -> Option<LightRefMut<'_>> {
        if let Some(light) = self.directional_lights.iter_mut().find(|l| l.name == name) {
            return Some(LightRefMut::Directional(light));
        }
        if let Some(light) = self.point_lights.iter_mut().find(|l| l.name == name) {
            return Some(LightRefMut::Point(light));
        }
        self.spot_lights
            .iter_mut()
            .find(|l| l.name == name)
            .map(LightRefMut::Spot)
    }

    /// Directional lights in insertion order
    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional_lights
    }

    /// Point lights in insertion order
    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Spot lights in insertion order
    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot_lights
    }

    /// The instanced-surface index: surface key to the objects using it
    pub fn instanced_index(&self) -> &BTreeMap<Surface, Vec<ObjectId>> {
        &self.instanced_index
    }

    /// Resolve a requested name to a scene-unique one
    ///
    /// Unused names are taken verbatim. On collision the trailing `#<n>`
    /// suffix (if any) is stripped to find the base name, all existing
    /// `base#<n>` names are scanned for the highest suffix, and the result is
    /// `base#<max + 1>`.
    fn dedup_name(&self, requested: &str) -> String {
        if !self.names.contains(requested) {
            return requested.to_string();
        }
        let base = match requested.rsplit_once('#') {
            Some((prefix, suffix)) if !prefix.is_empty() && suffix.parse::<u32>().is_ok() => prefix,
            _ => requested,
        };
        let mut highest = 0;
        for name in &self.names {
            if let Some(rest) = name.strip_prefix(base) {
                if let Some(n) = rest.strip_prefix('#').and_then(|r| r.parse::<u32>().ok()) {
                    highest = highest.max(n);
                }
            }
        }
        format!("{base}#{}", highest + 1)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::resources::{MeshHandle, TextureHandle};

    fn surface() -> Surface {
        Surface::new(TextureHandle::default(), MeshHandle::default())
    }

    fn instanced_surface() -> Surface {
        Surface::instanced(TextureHandle::default(), MeshHandle::default())
    }

    #[test]
    fn test_object_lifecycle() {
        let mut scene = Scene::new();
        scene.add_object("Vase", vec![surface()]);
        assert!(scene.find_object_by_name("Vase").is_some());
        assert!(scene.remove_object_by_name("Vase"));
        assert!(scene.find_object_by_name("Vase").is_none());
        assert!(!scene.remove_object_by_name("Vase"));
    }

    #[test]
    fn test_name_dedup_sequence() {
        let mut scene = Scene::new();
        let first = scene.add_object("Light", vec![]).name().to_string();
        let second = scene.add_object("Light", vec![]).name().to_string();
        // Explicitly requesting the already-taken suffix must keep counting up
        let third = scene.add_object("Light#1", vec![]).name().to_string();
        assert_eq!(first, "Light");
        assert_eq!(second, "Light#1");
        assert_eq!(third, "Light#2");
    }

    #[test]
    fn test_name_dedup_skips_unrelated_names() {
        let mut scene = Scene::new();
        scene.add_object("Light", vec![]);
        scene.add_object("Lighthouse", vec![]);
        let next = scene.add_object("Light", vec![]).name().to_string();
        assert_eq!(next, "Light#1");
    }

    #[test]
    fn test_names_are_pairwise_distinct() {
        let mut scene = Scene::new();
        let names: Vec<String> = (0..6)
            .map(|_| scene.add_object("Cube", vec![]).name().to_string())
            .collect();
        for (i, a) in names.iter().enumerate() {
            for b in names.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_light_capacity_boundary() {
        let mut scene = Scene::new();
        for _ in 0..MAX_LIGHTS_PER_KIND {
            assert!(scene
                .add_point_light("Point", PointLight::new(Vec3::zeros()))
                .is_some());
        }
        assert!(scene
            .add_point_light("Point", PointLight::new(Vec3::zeros()))
            .is_none());
        assert_eq!(scene.point_lights().len(), MAX_LIGHTS_PER_KIND);
    }

    #[test]
    fn test_light_lookup_returns_matching_category() {
        let mut scene = Scene::new();
        scene.add_directional_light("Sun", DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0)));
        scene.add_spot_light(
            "Lamp",
            SpotLight::new(Vec3::zeros(), Vec3::new(0.0, -1.0, 0.0), 0.5),
        );
        assert!(matches!(
            scene.find_light_by_name("Sun"),
            Some(LightRef::Directional(_))
        ));
        assert!(matches!(
            scene.find_light_by_name("Lamp"),
            Some(LightRef::Spot(_))
        ));
        assert!(scene.find_light_by_name("Moon").is_none());
        assert!(scene.remove_light_by_name("Sun"));
        assert!(scene.find_light_by_name("Sun").is_none());
    }

    #[test]
    fn test_instanced_index_tracks_attachments() {
        let mut scene = Scene::new();
        let key = instanced_surface();
        let a = scene.add_object("A", vec![key]).id();
        let b = scene.add_object("B", vec![key]).id();
        // Non-instanced surfaces never enter the index
        scene.add_object("C", vec![surface()]);

        let index = scene.instanced_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index[&key], vec![a, b]);
    }

    #[test]
    fn test_instanced_index_forgets_removed_objects() {
        let mut scene = Scene::new();
        let key = instanced_surface();
        scene.add_object("A", vec![key]);
        let b = scene.add_object("B", vec![key]).id();
        assert!(scene.remove_object_by_name("A"));
        assert_eq!(scene.instanced_index()[&key], vec![b]);
        assert!(scene.remove_object_by_name("B"));
        assert!(scene.instanced_index().is_empty());
    }

    #[test]
    fn test_attach_surface_updates_index() {
        let mut scene = Scene::new();
        let id = scene.add_object("A", vec![]).id();
        let key = instanced_surface();
        assert!(scene.attach_surface(id, key));
        assert_eq!(scene.instanced_index()[&key], vec![id]);
        assert_eq!(scene.find_object_by_name("A").unwrap().surfaces().len(), 1);

        let gone = scene.add_object("B", vec![]).id();
        scene.remove_object_by_name("B");
        assert!(!scene.attach_surface(gone, key));
    }
}
