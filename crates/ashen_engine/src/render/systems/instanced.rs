//! GPU-instanced rendering of grouped surfaces
//!
//! The scene maintains an ordered index from instanced [`Surface`] keys to
//! the objects using them. Batch building flattens that index into one
//! contiguous per-instance attribute array plus a draw range per group, so a
//! group of any size costs a single draw call.

use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::render::frame::FrameInfo;
use crate::render::resources::ResourceRegistry;
use crate::render::systems::FrameUniforms;
use crate::render::ubo::InstanceData;
use crate::render::vulkan::{
    Buffer, DescriptorSetLayout, DescriptorWriter, Device, GraphicsPipeline, PipelineConfig,
    ShaderModule, Vertex, VulkanResult,
};
use crate::scene::{Scene, Surface};

/// One draw call's worth of instances sharing a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceBatch {
    /// Grouping key
    pub surface: Surface,
    /// Offset into the flat instance array
    pub first_instance: u32,
    /// Number of consecutive instances
    pub instance_count: u32,
}

/// Flatten the scene's instanced index into draw batches
///
/// Batches come out in the index's key order, so output is deterministic for
/// a given scene. Objects that disappeared from the scene after registration
/// are skipped without leaving holes in the array.
pub fn build_instance_batches(scene: &Scene) -> (Vec<InstanceData>, Vec<InstanceBatch>) {
    let mut instances = Vec::new();
    let mut batches = Vec::new();
    for (&surface, ids) in scene.instanced_index() {
        let first_instance = instances.len() as u32;
        for &id in ids {
            let Some(object) = scene.object(id) else {
                continue;
            };
            let t = &object.transform;
            instances.push(InstanceData {
                translation: [t.translation.x, t.translation.y, t.translation.z, 0.0],
                scale: [t.scale.x, t.scale.y, t.scale.z, 0.0],
                rotation: [t.rotation.x, t.rotation.y, t.rotation.z, 0.0],
            });
        }
        let instance_count = instances.len() as u32 - first_instance;
        if instance_count > 0 {
            batches.push(InstanceBatch {
                surface,
                first_instance,
                instance_count,
            });
        }
    }
    (instances, batches)
}

/// Draws all instanced surface groups
pub struct InstancedRenderSystem {
    device: Arc<Device>,
    set_layout: DescriptorSetLayout,
    pipeline: GraphicsPipeline,
    max_instances: usize,
}

impl InstancedRenderSystem {
    /// Build the instanced pipeline from `instanced.vert.spv` /
    /// `instanced.frag.spv`
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
        max_instances: usize,
    ) -> VulkanResult<Self> {
        let set_layout = DescriptorSetLayout::builder(device.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)?
            .add_uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT)?
            .add_combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT)?
            .push_descriptors()
            .build()?;

        let vertex_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("instanced.vert.spv"))?;
        let fragment_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("instanced.frag.spv"))?;

        let mut attribute_descriptions = Vertex::attribute_descriptions();
        attribute_descriptions.extend(InstanceData::attribute_descriptions());
        let config = PipelineConfig {
            binding_descriptions: vec![
                Vertex::binding_description(),
                InstanceData::binding_description(),
            ],
            attribute_descriptions,
            ..PipelineConfig::default()
        };
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass,
            &vertex_shader,
            &fragment_shader,
            &[set_layout.handle()],
            &config,
        )?;

        Ok(Self {
            device,
            set_layout,
            pipeline,
            max_instances,
        })
    }

    /// Upload this frame's instances and record one draw per batch
    ///
    /// `instance_buffer` is the persistently mapped per-frame attribute
    /// buffer; overflow beyond its capacity is truncated with a warning.
    pub fn render(
        &self,
        frame: &FrameInfo,
        scene: &Scene,
        registry: &ResourceRegistry,
        uniforms: &FrameUniforms,
        instance_buffer: &mut Buffer,
    ) {
        let (mut instances, mut batches) = build_instance_batches(scene);
        if instances.is_empty() {
            return;
        }
        if instances.len() > self.max_instances {
            log::warn!(
                "instance count {} exceeds capacity {}, truncating",
                instances.len(),
                self.max_instances
            );
            instances.truncate(self.max_instances);
            batches.retain_mut(|batch| {
                let limit = self.max_instances as u32;
                if batch.first_instance >= limit {
                    return false;
                }
                batch.instance_count = batch.instance_count.min(limit - batch.first_instance);
                true
            });
        }
        instance_buffer.write_bytes(bytemuck::cast_slice(&instances), 0);

        self.pipeline.bind(frame.command_buffer);
        for batch in &batches {
            let Some(mesh) = registry.mesh(batch.surface.mesh) else {
                log::warn!("instanced batch references a removed mesh, skipped");
                continue;
            };
            let Some(texture) = registry.texture(batch.surface.texture) else {
                log::warn!("instanced batch references a removed texture, skipped");
                continue;
            };

            DescriptorWriter::new(&self.set_layout)
                .write_buffer(0, uniforms.camera)
                .write_buffer(1, uniforms.lights)
                .write_image(2, texture.descriptor_info())
                .push(
                    &self.device,
                    frame.command_buffer,
                    self.pipeline.layout(),
                    0,
                );

            mesh.bind(&self.device, frame.command_buffer);
            unsafe {
                self.device.handle().cmd_bind_vertex_buffers(
                    frame.command_buffer,
                    1,
                    &[instance_buffer.handle()],
                    &[0],
                );
            }
            mesh.draw_instanced(
                &self.device,
                frame.command_buffer,
                batch.instance_count,
                batch.first_instance,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::resources::{MeshHandle, TextureHandle};
    use crate::scene::Transform;

    // Distinct mesh handles from a scratch arena give distinct grouping keys
    // without touching the GPU.
    fn scene_with_instances(per_group: &[usize]) -> (Scene, Vec<Surface>) {
        let mut meshes: slotmap::SlotMap<MeshHandle, ()> = slotmap::SlotMap::with_key();
        let texture = TextureHandle::default();
        let mut scene = Scene::new();
        let mut surfaces = Vec::new();
        for (group, &count) in per_group.iter().enumerate() {
            let surface = Surface::instanced(texture, meshes.insert(()));
            for i in 0..count {
                let object = scene.add_object(&format!("obj {group} {i}"), vec![surface]);
                object.transform.translation = Vec3::new(group as f32, i as f32, 0.0);
            }
            surfaces.push(surface);
        }
        (scene, surfaces)
    }

    #[test]
    fn batches_cover_every_instance_exactly_once() {
        let (scene, surfaces) = scene_with_instances(&[3, 4]);
        let (instances, batches) = build_instance_batches(&scene);
        assert_eq!(instances.len(), 7);
        assert_eq!(batches.len(), surfaces.len());
        let total: u32 = batches.iter().map(|b| b.instance_count).sum();
        assert_eq!(total as usize, instances.len());
        // Ranges are contiguous and non-overlapping
        let mut cursor = 0;
        for batch in &batches {
            assert_eq!(batch.first_instance, cursor);
            cursor += batch.instance_count;
        }
    }

    #[test]
    fn instance_data_reflects_object_transforms() {
        let mut scene = Scene::new();
        let surface = Surface::instanced(TextureHandle::default(), MeshHandle::default());
        let object = scene.add_object("mover", vec![surface]);
        object.transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
            rotation: Vec3::new(0.1, 0.2, 0.3),
        };
        let (instances, batches) = build_instance_batches(&scene);
        assert_eq!(batches.len(), 1);
        assert_eq!(instances[0].translation, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(instances[0].scale, [2.0, 2.0, 2.0, 0.0]);
        assert_eq!(instances[0].rotation, [0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn removed_objects_leave_no_holes() {
        let (mut scene, _) = scene_with_instances(&[3]);
        assert!(scene.remove_object_by_name("obj 0 1"));
        let (instances, batches) = build_instance_batches(&scene);
        assert_eq!(instances.len(), 2);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].instance_count, 2);
    }

    #[test]
    fn rebuilding_batches_is_idempotent() {
        let (mut scene, _) = scene_with_instances(&[2, 5, 1]);
        assert!(scene.remove_object_by_name("obj 1 3"));
        let first = build_instance_batches(&scene);
        let second = build_instance_batches(&scene);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_scene_builds_no_batches() {
        let scene = Scene::new();
        let (instances, batches) = build_instance_batches(&scene);
        assert!(instances.is_empty());
        assert!(batches.is_empty());
    }
}
