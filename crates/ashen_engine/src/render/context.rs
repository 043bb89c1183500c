//! Top-level rendering context
//!
//! `RenderContext` wires the device, renderer, resource registry, per-frame
//! uniform buffers and the render systems together, and drives a whole frame
//! through [`RenderContext::make_frame`]. It is the only type an application
//! needs to hold to render scenes.

use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::render::config::RendererConfig;
use crate::render::frame::FrameInfo;
use crate::render::resources::{MeshHandle, ResourceRegistry, TextureHandle};
use crate::render::systems::{
    ForwardRenderSystem, FrameUniforms, InstancedRenderSystem, LightRenderSystem,
};
use crate::render::ubo::{CameraUbo, InstanceData, SceneLightsUbo};
use crate::render::vulkan::{
    Buffer, Device, Mesh, MeshData, Renderer, Texture, VulkanResult,
};
use crate::render::window::WindowSource;
use crate::scene::Scene;

/// Callback recording application-owned draws (UI, debug overlays) inside the
/// frame's render pass, after all scene systems have run
pub type UiHook<'a> = &'a mut dyn FnMut(vk::CommandBuffer, &mut Scene);

/// Owns the full rendering stack for one window
pub struct RenderContext {
    // Field order is drop order: systems and buffers before the renderer,
    // renderer before the device.
    forward_system: Option<ForwardRenderSystem>,
    instanced_system: Option<InstancedRenderSystem>,
    light_system: LightRenderSystem,
    camera_buffers: Vec<Buffer>,
    lights_buffers: Vec<Buffer>,
    instance_buffers: Vec<Buffer>,
    registry: ResourceRegistry,
    renderer: Renderer,
    device: Arc<Device>,
}

impl RenderContext {
    /// Bring up the device, swapchain and render systems for `window`
    pub fn new(window: &dyn WindowSource, config: &RendererConfig) -> VulkanResult<Self> {
        let device = Arc::new(Device::new(window, config)?);
        let renderer = Renderer::new(
            device.clone(),
            window,
            config.max_frames_in_flight,
            config.clear_color,
        )?;
        let frames = renderer.max_frames_in_flight();

        let registry =
            ResourceRegistry::new(Texture::solid_color(device.clone(), [255, 255, 255, 255])?);

        let min_ubo_alignment = device.limits().min_uniform_buffer_offset_alignment;
        let mut camera_buffers = Vec::with_capacity(frames);
        let mut lights_buffers = Vec::with_capacity(frames);
        let mut instance_buffers = Vec::with_capacity(frames);
        for _ in 0..frames {
            let mut camera = Buffer::new(
                device.clone(),
                std::mem::size_of::<CameraUbo>() as vk::DeviceSize,
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                min_ubo_alignment,
            )?;
            camera.map_whole()?;
            camera_buffers.push(camera);

            let mut lights = Buffer::new(
                device.clone(),
                std::mem::size_of::<SceneLightsUbo>() as vk::DeviceSize,
                1,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                min_ubo_alignment,
            )?;
            lights.map_whole()?;
            lights_buffers.push(lights);

            let mut instances = Buffer::new(
                device.clone(),
                std::mem::size_of::<InstanceData>() as vk::DeviceSize,
                config.max_instances,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            )?;
            instances.map_whole()?;
            instance_buffers.push(instances);
        }

        let render_pass = renderer.render_pass();
        let forward_system = if config.enable_forward_system {
            Some(ForwardRenderSystem::new(
                device.clone(),
                render_pass,
                &config.shader_dir,
            )?)
        } else {
            None
        };
        let instanced_system = if config.enable_instanced_system {
            Some(InstancedRenderSystem::new(
                device.clone(),
                render_pass,
                &config.shader_dir,
                config.max_instances,
            )?)
        } else {
            None
        };
        let light_system =
            LightRenderSystem::new(device.clone(), render_pass, &config.shader_dir)?;

        log::info!(
            "render context ready: {} frames in flight, forward={}, instanced={}",
            frames,
            config.enable_forward_system,
            config.enable_instanced_system
        );
        Ok(Self {
            forward_system,
            instanced_system,
            light_system,
            camera_buffers,
            lights_buffers,
            instance_buffers,
            registry,
            renderer,
            device,
        })
    }

    /// Render one frame of `scene`
    ///
    /// Runs the full sequence: acquire, upload per-frame uniforms, record the
    /// instanced, forward and light systems, run the UI hook, submit and
    /// present. Returns without drawing when no swapchain image is available
    /// this tick (resize in progress or window minimized).
    pub fn make_frame(
        &mut self,
        window: &dyn WindowSource,
        scene: &mut Scene,
        delta_time: f32,
        ui: Option<UiHook<'_>>,
    ) -> VulkanResult<()> {
        let Some(frame) = self.renderer.begin_frame(window)? else {
            return Ok(());
        };
        let frame_info = FrameInfo {
            command_buffer: frame.command_buffer(),
            frame_index: frame.frame_index(),
            delta_time,
        };

        let camera_ubo = CameraUbo::new(scene.camera.projection(), scene.camera.view());
        self.camera_buffers[frame_info.frame_index].write_to_index(&camera_ubo, 0);
        let lights_ubo = SceneLightsUbo::from_scene(scene);
        self.lights_buffers[frame_info.frame_index].write_to_index(&lights_ubo, 0);

        let uniforms = FrameUniforms {
            camera: self.camera_buffers[frame_info.frame_index].descriptor_info_for_index(0),
            lights: self.lights_buffers[frame_info.frame_index].descriptor_info_for_index(0),
        };

        self.renderer.begin_swapchain_render_pass(&frame);

        if let Some(instanced) = &self.instanced_system {
            instanced.render(
                &frame_info,
                scene,
                &self.registry,
                &uniforms,
                &mut self.instance_buffers[frame_info.frame_index],
            );
        }
        if let Some(forward) = &self.forward_system {
            forward.render(&frame_info, scene, &self.registry, &uniforms);
        }
        self.light_system.render(&frame_info, scene, &uniforms);

        if let Some(ui) = ui {
            ui(frame_info.command_buffer, scene);
        }

        self.renderer.end_swapchain_render_pass(&frame);
        self.renderer.end_frame(frame)
    }

    /// Upload mesh data and register it
    pub fn load_mesh(&mut self, data: &MeshData) -> VulkanResult<MeshHandle> {
        let mesh = Mesh::new(self.device.clone(), data)?;
        Ok(self.registry.insert_mesh(mesh))
    }

    /// Load a texture file; decode failures fall back to the default texture
    pub fn load_texture(&mut self, path: &Path) -> VulkanResult<TextureHandle> {
        match Texture::from_file(self.device.clone(), path)? {
            Some(texture) => Ok(self.registry.insert_texture(texture)),
            None => Ok(self.registry.default_texture()),
        }
    }

    /// Upload raw RGBA8 pixels as a texture
    pub fn load_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<TextureHandle> {
        let texture = Texture::from_rgba8(self.device.clone(), width, height, pixels)?;
        Ok(self.registry.insert_texture(texture))
    }

    /// The built-in 1x1 white texture
    pub fn default_texture(&self) -> TextureHandle {
        self.registry.default_texture()
    }

    /// Registry holding all loaded meshes and textures
    pub fn resources(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Registry access for unloading resources
    ///
    /// Callers must not remove resources still referenced by an in-flight
    /// frame; wait for idle first.
    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// Forward a window resize to the renderer
    pub fn note_resize(&mut self) {
        self.renderer.note_resize();
    }

    /// Current swapchain aspect ratio, for camera projection updates
    pub fn aspect_ratio(&self) -> f32 {
        self.renderer.aspect_ratio()
    }

    /// Replace the render pass clear color
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.renderer.set_clear_color(color);
    }

    /// Block until the GPU finishes all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        // Up to max_frames_in_flight - 1 submitted frames may still reference
        // the uniform buffers, pipelines and registry resources; drain them
        // before the field drops destroy anything.
        if let Err(e) = self.device.wait_idle() {
            log::error!("device wait failed during context teardown: {e}");
        }
    }
}
