//! Shader modules and graphics pipeline construction
//!
//! Pipelines are created with dynamic viewport and scissor state so that a
//! window resize never forces pipeline recreation, only a swapchain rebuild.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::{Device, VulkanError, VulkanResult};

/// Guaranteed-minimum push constant budget shared by all pipelines
pub const PUSH_CONSTANT_SIZE: u32 = 128;

/// Compiled SPIR-V shader with its pipeline stage
pub struct ShaderModule {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}

impl ShaderModule {
    /// Load a SPIR-V file, inferring the stage from a `.vert.spv` or
    /// `.frag.spv` extension
    pub fn from_file(device: Arc<Device>, path: &Path) -> VulkanResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let stage = if name.ends_with(".vert.spv") {
            vk::ShaderStageFlags::VERTEX
        } else if name.ends_with(".frag.spv") {
            vk::ShaderStageFlags::FRAGMENT
        } else {
            return Err(VulkanError::InvalidOperation {
                reason: format!("cannot infer shader stage from file name {name:?}"),
            });
        };
        let bytes = std::fs::read(path).map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to read shader {path:?}: {e}"))
        })?;
        Self::from_spirv(device, &bytes, stage)
    }

    /// Create a module from raw SPIR-V bytes
    pub fn from_spirv(
        device: Arc<Device>,
        bytes: &[u8],
        stage: vk::ShaderStageFlags,
    ) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| {
            VulkanError::InitializationFailed(format!("invalid SPIR-V: {e}"))
        })?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe {
            device
                .handle()
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self {
            device,
            module,
            stage,
        })
    }

    fn stage_info(&self) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(self.stage)
            .module(self.module)
            .name(c_entry_point())
            .build()
    }
}

fn c_entry_point() -> &'static std::ffi::CStr {
    // SPIR-V entry point name used by all engine shaders
    unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0") }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_shader_module(self.module, None);
        }
    }
}

/// Fixed-function state for a graphics pipeline
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub depth_test: bool,
    pub depth_write: bool,
    pub alpha_blend: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binding_descriptions: Vec::new(),
            attribute_descriptions: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            depth_test: true,
            depth_write: true,
            alpha_blend: false,
        }
    }
}

/// Graphics pipeline together with its layout
pub struct GraphicsPipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build a pipeline from vertex + fragment shaders against `render_pass`
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
        set_layouts: &[vk::DescriptorSetLayout],
        config: &PipelineConfig,
    ) -> VulkanResult<Self> {
        let push_constant_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(PUSH_CONSTANT_SIZE)
            .build();
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));
        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let stages = [vertex_shader.stage_info(), fragment_shader.stage_info()];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&config.binding_descriptions)
            .vertex_attribute_descriptions(&config.attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts matter here.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(config.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachment = if config.alpha_blend {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build()
        } else {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .attachments(std::slice::from_ref(&blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&pipeline_info),
                    None,
                )
                .map_err(|(_, e)| VulkanError::Api(e))?
        }
        .into_iter()
        .next()
        .ok_or_else(|| {
            VulkanError::InitializationFailed("pipeline creation returned no pipeline".into())
        })?;

        Ok(Self {
            device,
            pipeline,
            layout,
        })
    }

    /// Bind the pipeline for subsequent draws
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    /// Pipeline layout for push constants and descriptor binding
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Write push constant bytes at `offset`
    pub fn push_constants(&self, command_buffer: vk::CommandBuffer, offset: u32, data: &[u8]) {
        debug_assert!(offset + data.len() as u32 <= PUSH_CONSTANT_SIZE);
        unsafe {
            self.device.handle().cmd_push_constants(
                command_buffer,
                self.layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                offset,
                data,
            );
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
            self.device.handle().destroy_pipeline_layout(self.layout, None);
        }
    }
}
