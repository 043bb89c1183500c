//! Forward rendering of one-off surfaces
//!
//! Each non-instanced surface is drawn with its own push constants (model and
//! normal matrices) and a push-descriptor set carrying the frame uniforms and
//! the surface's texture.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat3;
use crate::render::frame::FrameInfo;
use crate::render::resources::ResourceRegistry;
use crate::render::systems::FrameUniforms;
use crate::render::vulkan::{
    DescriptorSetLayout, DescriptorWriter, Device, GraphicsPipeline, PipelineConfig, ShaderModule,
    Vertex, VulkanResult,
};
use crate::scene::Scene;

/// Model and normal matrices, pushed per draw
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ForwardPush {
    model: [[f32; 4]; 4],
    /// Normal matrix widened to mat4 so the block stays std140-friendly
    normal: [[f32; 4]; 4],
}

fn widen_mat3(m: &Mat3) -> [[f32; 4]; 4] {
    let mut out = [[0.0f32; 4]; 4];
    for col in 0..3 {
        for row in 0..3 {
            out[col][row] = m[(row, col)];
        }
    }
    out[3][3] = 1.0;
    out
}

/// Draws every non-instanced surface in the scene
pub struct ForwardRenderSystem {
    device: Arc<Device>,
    set_layout: DescriptorSetLayout,
    pipeline: GraphicsPipeline,
}

impl ForwardRenderSystem {
    /// Build the forward pipeline from `forward.vert.spv` / `forward.frag.spv`
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
    ) -> VulkanResult<Self> {
        let set_layout = DescriptorSetLayout::builder(device.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)?
            .add_uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT)?
            .add_combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT)?
            .push_descriptors()
            .build()?;

        let vertex_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("forward.vert.spv"))?;
        let fragment_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("forward.frag.spv"))?;

        let config = PipelineConfig {
            binding_descriptions: vec![Vertex::binding_description()],
            attribute_descriptions: Vertex::attribute_descriptions(),
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
        })
    }

    /// Record draws for all non-instanced surfaces
    ///
    /// Surfaces whose mesh or texture handle no longer resolves are skipped
    /// with a warning rather than aborting the frame.
    pub fn render(
        &self,
        frame: &FrameInfo,
        scene: &Scene,
        registry: &ResourceRegistry,
        uniforms: &FrameUniforms,
    ) {
        self.pipeline.bind(frame.command_buffer);

        for object in scene.objects() {
            let push = ForwardPush {
                model: object.transform.model_matrix().into(),
                normal: widen_mat3(&object.transform.normal_matrix()),
            };
            let mut pushed_constants = false;

            for surface in object.surfaces() {
                if surface.instanced {
                    continue;
                }
                let Some(mesh) = registry.mesh(surface.mesh) else {
                    log::warn!("object {:?} references a removed mesh, skipped", object.name());
                    continue;
                };
                let Some(texture) = registry.texture(surface.texture) else {
                    log::warn!(
                        "object {:?} references a removed texture, skipped",
                        object.name()
                    );
                    continue;
                };

                if !pushed_constants {
                    self.pipeline.push_constants(
                        frame.command_buffer,
                        0,
                        bytemuck::bytes_of(&push),
                    );
                    pushed_constants = true;
                }

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
                mesh.draw(&self.device, frame.command_buffer);
            }
        }
    }
}
