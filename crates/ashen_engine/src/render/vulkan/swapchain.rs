//! Swapchain, render pass, depth buffer and per-frame synchronization
//!
//! The swapchain owns everything whose lifetime is tied to the presentation
//! surface: color images and views, the depth attachment, framebuffers and
//! the semaphore/fence sets that pace frames in flight. Recreation after a
//! resize rebuilds this object while the [`Device`] persists.

use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::{Device, VulkanError, VulkanResult};

/// Preferred depth formats, highest precision first
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Swapchain with render pass, depth attachment and frame pacing state
pub struct Swapchain {
    device: Arc<Device>,
    swapchain: vk::SwapchainKHR,
    image_format: vk::Format,
    extent: vk::Extent2D,
    image_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    depth_image: vk::Image,
    depth_memory: vk::DeviceMemory,
    depth_view: vk::ImageView,
    framebuffers: Vec<vk::Framebuffer>,
    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    in_flight: Vec<vk::Fence>,
    max_frames_in_flight: usize,
}

impl Swapchain {
    /// Create a swapchain for the current surface state
    pub fn new(
        device: Arc<Device>,
        window_extent: vk::Extent2D,
        max_frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        Self::create(device, window_extent, max_frames_in_flight, vk::SwapchainKHR::null())
    }

    /// Recreate after a resize, handing the old swapchain to the driver
    pub fn recreate(self, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let device = self.device.clone();
        let frames = self.max_frames_in_flight;
        let old_handle = self.swapchain;
        // The old swapchain must stay alive until create() passes it to the
        // driver, so destruction of `self` is deferred past the call.
        let new = Self::create(device, window_extent, frames, old_handle)?;
        drop(self);
        Ok(new)
    }

    fn create(
        device: Arc<Device>,
        window_extent: vk::Extent2D,
        max_frames_in_flight: usize,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let support = device.swapchain_support()?;

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_extent);

        let mut image_count = support.capabilities.min_image_count + 1;
        if support.capabilities.max_image_count > 0 {
            image_count = image_count.min(support.capabilities.max_image_count);
        }

        let physical = device.physical();
        let (sharing_mode, family_indices) = if physical.graphics_family != physical.present_family
        {
            (
                vk::SharingMode::CONCURRENT,
                vec![physical.graphics_family, physical.present_family],
            )
        } else {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        };

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = device.swapchain_loader();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };
        log::debug!(
            "swapchain created: {}x{}, {} images, {:?}/{:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        let image_views = create_image_views(&device, &images, surface_format.format)?;

        let depth_format = device
            .find_supported_format(
                &DEPTH_FORMAT_CANDIDATES,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or(VulkanError::NoSupportedFormat)?;
        let render_pass = create_render_pass(&device, surface_format.format, depth_format)?;
        let (depth_image, depth_memory, depth_view) =
            create_depth_resources(&device, extent, depth_format)?;

        let framebuffers =
            create_framebuffers(&device, render_pass, &image_views, depth_view, extent)?;

        let (image_available, render_finished, in_flight) =
            create_sync_objects(&device, max_frames_in_flight)?;

        Ok(Self {
            device,
            swapchain,
            image_format: surface_format.format,
            extent,
            image_views,
            render_pass,
            depth_image,
            depth_memory,
            depth_view,
            framebuffers,
            image_available,
            render_finished,
            in_flight,
            max_frames_in_flight,
        })
    }

    /// Wait for `frame_index`'s previous submission, then acquire an image
    ///
    /// Returns `Ok(None)` when the swapchain is out of date and must be
    /// recreated before rendering can continue. A suboptimal acquisition
    /// returns the image with the flag set true; the image is still usable
    /// and abandoning it would leave its acquire semaphore pending, so the
    /// caller renders the frame and schedules a rebuild for the next one.
    pub fn acquire_next_image(&self, frame_index: usize) -> VulkanResult<Option<(u32, bool)>> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.in_flight[frame_index]], true, u64::MAX)
                .map_err(VulkanError::Api)?;
        }
        let result = unsafe {
            self.device.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available[frame_index],
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(Some((index, suboptimal))),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Submit a recorded command buffer and present `image_index`
    ///
    /// Returns `true` when the swapchain became stale and needs recreation.
    pub fn submit_and_present(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
        frame_index: usize,
    ) -> VulkanResult<bool> {
        let fence = self.in_flight[frame_index];
        unsafe {
            self.device
                .handle()
                .reset_fences(&[fence])
                .map_err(VulkanError::Api)?;
        }

        let wait_semaphores = [self.image_available[frame_index]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[frame_index]];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.device
                .handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    std::slice::from_ref(&submit_info),
                    fence,
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let result = unsafe {
            self.device
                .swapchain_loader()
                .queue_present(self.device.present_queue(), &present_info)
        };
        // The submission already succeeded and its fence will signal, so any
        // presentation failure leaves the frame cursor free to advance. Treat
        // every present error like a stale swapchain and let the next frame
        // attempt a rebuild.
        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => {
                log::error!("presentation failed ({e}), requesting swapchain rebuild");
                Ok(true)
            }
        }
    }

    /// Render pass covering the color + depth attachments
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for a swapchain image
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Color attachment format
    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    /// Width / height of the swapchain images
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }

    /// Number of frames that may be recorded concurrently
    pub fn max_frames_in_flight(&self) -> usize {
        self.max_frames_in_flight
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            for &semaphore in self.image_available.iter().chain(&self.render_finished) {
                device.destroy_semaphore(semaphore, None);
            }
            for &fence in &self.in_flight {
                device.destroy_fence(fence, None);
            }
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_image_view(self.depth_view, None);
            device.destroy_image(self.depth_image, None);
            device.free_memory(self.depth_memory, None);
            device.destroy_render_pass(self.render_pass, None);
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            self.device
                .swapchain_loader()
                .destroy_swapchain(self.swapchain, None);
        }
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is the only mode Vulkan guarantees on every driver
        vk::PresentModeKHR::FIFO
    }
}

fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> VulkanResult<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|&image| {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe {
                device
                    .handle()
                    .create_image_view(&view_info, None)
                    .map_err(VulkanError::Api)
            }
        })
        .collect()
}

fn create_render_pass(
    device: &Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> VulkanResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();
    let depth_attachment = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let color_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();
    let depth_ref = vk::AttachmentReference::builder()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref))
        .depth_stencil_attachment(&depth_ref)
        .build();

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build();

    let attachments = [color_attachment, depth_attachment];
    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));
    unsafe {
        device
            .handle()
            .create_render_pass(&render_pass_info, None)
            .map_err(VulkanError::Api)
    }
}

fn create_depth_resources(
    device: &Device,
    extent: vk::Extent2D,
    format: vk::Format,
) -> VulkanResult<(vk::Image, vk::DeviceMemory, vk::ImageView)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let image = unsafe {
        device
            .handle()
            .create_image(&image_info, None)
            .map_err(VulkanError::Api)?
    };

    let requirements = unsafe { device.handle().get_image_memory_requirements(image) };
    let Some(memory_type) = device.find_memory_type(
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) else {
        unsafe { device.handle().destroy_image(image, None) };
        return Err(VulkanError::NoSuitableMemoryType);
    };
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = unsafe {
        match device.handle().allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(e) => {
                device.handle().destroy_image(image, None);
                return Err(VulkanError::Api(e));
            }
        }
    };
    if let Err(e) = unsafe { device.handle().bind_image_memory(image, memory, 0) } {
        unsafe {
            device.handle().destroy_image(image, None);
            device.handle().free_memory(memory, None);
        }
        return Err(VulkanError::Api(e));
    }

    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    let view = match unsafe { device.handle().create_image_view(&view_info, None) } {
        Ok(view) => view,
        Err(e) => {
            unsafe {
                device.handle().destroy_image(image, None);
                device.handle().free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }
    };

    Ok((image, memory, view))
}

fn create_framebuffers(
    device: &Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> VulkanResult<Vec<vk::Framebuffer>> {
    image_views
        .iter()
        .map(|&view| {
            let attachments = [view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            unsafe {
                device
                    .handle()
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(VulkanError::Api)
            }
        })
        .collect()
}

#[allow(clippy::type_complexity)]
fn create_sync_objects(
    device: &Device,
    max_frames_in_flight: usize,
) -> VulkanResult<(Vec<vk::Semaphore>, Vec<vk::Semaphore>, Vec<vk::Fence>)> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    // Fences start signaled so frame 0 does not deadlock on its first wait.
    let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

    let mut image_available = Vec::with_capacity(max_frames_in_flight);
    let mut render_finished = Vec::with_capacity(max_frames_in_flight);
    let mut in_flight = Vec::with_capacity(max_frames_in_flight);
    for _ in 0..max_frames_in_flight {
        unsafe {
            image_available.push(
                device
                    .handle()
                    .create_semaphore(&semaphore_info, None)
                    .map_err(VulkanError::Api)?,
            );
            render_finished.push(
                device
                    .handle()
                    .create_semaphore(&semaphore_info, None)
                    .map_err(VulkanError::Api)?,
            );
            in_flight.push(
                device
                    .handle()
                    .create_fence(&fence_info, None)
                    .map_err(VulkanError::Api)?,
            );
        }
    }
    Ok((image_available, render_finished, in_flight))
}
