//! Light billboards
//!
//! Each point and spot light is visualized as a camera-facing quad expanded in the
//! vertex shader from gl_VertexIndex, so the pipeline has no vertex input at
//! all. Billboards are alpha blended and therefore sorted back to front in
//! view space before recording.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Point3;
use crate::render::frame::FrameInfo;
use crate::render::systems::FrameUniforms;
use crate::render::vulkan::{
    DescriptorSetLayout, DescriptorWriter, Device, GraphicsPipeline, PipelineConfig, ShaderModule,
    VulkanResult,
};
use crate::scene::Scene;

const VERTICES_PER_BILLBOARD: u32 = 6;

/// One light's quad, pushed per draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightBillboard {
    /// World position; w carries the quad radius
    pub position: [f32; 4],
    /// Diffuse color scaled by intensity; w is the view-space depth used for
    /// sorting and ignored by the shader
    pub color: [f32; 4],
}

/// Gather billboards for every point and spot light, sorted farthest first
///
/// Sorting happens in the view space of the scene's camera so that alpha
/// blending composites correctly.
pub fn collect_billboards(scene: &Scene) -> Vec<LightBillboard> {
    let view = scene.camera.view();
    let billboard = |position: &crate::foundation::math::Vec3,
                     diffuse: &crate::foundation::math::Vec3,
                     intensity: f32| {
        let p = Point3::new(position.x, position.y, position.z);
        let depth = view.transform_point(&p).z;
        LightBillboard {
            position: [position.x, position.y, position.z, 0.1 * intensity],
            color: [
                diffuse.x * intensity,
                diffuse.y * intensity,
                diffuse.z * intensity,
                depth,
            ],
        }
    };

    let mut billboards: Vec<LightBillboard> = scene
        .point_lights()
        .iter()
        .map(|l| billboard(&l.position, &l.color.diffuse, l.intensity))
        .chain(
            scene
                .spot_lights()
                .iter()
                .map(|l| billboard(&l.position, &l.color.diffuse, l.intensity)),
        )
        .collect();
    billboards.sort_by(|a, b| b.color[3].total_cmp(&a.color[3]));
    billboards
}

/// Draws a billboard per point and spot light
pub struct LightRenderSystem {
    device: Arc<Device>,
    set_layout: DescriptorSetLayout,
    pipeline: GraphicsPipeline,
}

impl LightRenderSystem {
    /// Build the billboard pipeline from `billboard.vert.spv` /
    /// `billboard.frag.spv`
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
    ) -> VulkanResult<Self> {
        let set_layout = DescriptorSetLayout::builder(device.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)?
            .push_descriptors()
            .build()?;

        let vertex_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("billboard.vert.spv"))?;
        let fragment_shader =
            ShaderModule::from_file(device.clone(), &shader_dir.join("billboard.frag.spv"))?;

        let config = PipelineConfig {
            // The quad is generated in the shader; no vertex input.
            binding_descriptions: Vec::new(),
            attribute_descriptions: Vec::new(),
            cull_mode: vk::CullModeFlags::NONE,
            depth_write: false,
            alpha_blend: true,
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

    /// Record one 6-vertex draw per light billboard
    pub fn render(&self, frame: &FrameInfo, scene: &Scene, uniforms: &FrameUniforms) {
        let billboards = collect_billboards(scene);
        if billboards.is_empty() {
            return;
        }

        self.pipeline.bind(frame.command_buffer);
        DescriptorWriter::new(&self.set_layout)
            .write_buffer(0, uniforms.camera)
            .push(
                &self.device,
                frame.command_buffer,
                self.pipeline.layout(),
                0,
            );

        for billboard in &billboards {
            self.pipeline
                .push_constants(frame.command_buffer, 0, bytemuck::bytes_of(billboard));
            unsafe {
                self.device.handle().cmd_draw(
                    frame.command_buffer,
                    VERTICES_PER_BILLBOARD,
                    1,
                    0,
                    0,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{PointLight, SpotLight};

    #[test]
    fn billboards_sorted_back_to_front() {
        let mut scene = Scene::new();
        scene
            .camera
            .set_view_target(Vec3::new(0.0, 0.0, -5.0), Vec3::zeros(), Vec3::y());
        scene.add_point_light("near", PointLight::new(Vec3::new(0.0, 0.0, -1.0)));
        scene.add_point_light("far", PointLight::new(Vec3::new(0.0, 0.0, 3.0)));
        scene.add_point_light("mid", PointLight::new(Vec3::new(0.0, 0.0, 1.0)));

        let billboards = collect_billboards(&scene);
        assert_eq!(billboards.len(), 3);
        // Depth keys must be non-increasing
        assert!(billboards[0].color[3] >= billboards[1].color[3]);
        assert!(billboards[1].color[3] >= billboards[2].color[3]);
        // The farthest light sits at world z = 3
        assert_eq!(billboards[0].position[2], 3.0);
    }

    #[test]
    fn spot_lights_are_billboarded_too() {
        let mut scene = Scene::new();
        scene.add_point_light("point", PointLight::new(Vec3::zeros()));
        scene.add_spot_light(
            "spot",
            SpotLight::new(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0), 0.5),
        );
        assert_eq!(collect_billboards(&scene).len(), 2);
    }

    #[test]
    fn billboard_radius_scales_with_intensity() {
        let mut scene = Scene::new();
        let light = scene
            .add_point_light("bright", PointLight::new(Vec3::zeros()))
            .unwrap();
        light.intensity = 4.0;
        let billboards = collect_billboards(&scene);
        assert!((billboards[0].position[3] - 0.4).abs() < 1e-6);
    }
}
