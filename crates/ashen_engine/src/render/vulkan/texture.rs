//! Sampled 2D textures
//!
//! Pixel data is staged through a host-visible buffer into a device-local
//! image, with layout transitions recorded on a one-shot command buffer.
//! A failed image decode is recoverable; the caller falls back to the
//! registry's default texture.

use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::{Buffer, Device, VulkanError, VulkanResult};

/// Device-local RGBA8 texture with view and sampler
pub struct Texture {
    device: Arc<Device>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
}

impl Texture {
    /// Upload raw RGBA8 pixels; `pixels.len()` must be `width * height * 4`
    pub fn from_rgba8(
        device: Arc<Device>,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture data is {} bytes, expected {expected} for {width}x{height} RGBA8",
                    pixels.len()
                ),
            });
        }

        let mut staging = Buffer::new(
            device.clone(),
            pixels.len() as vk::DeviceSize,
            1,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            1,
        )?;
        staging.map_whole()?;
        staging.write_bytes(pixels, 0);
        staging.unmap();

        let extent = vk::Extent2D { width, height };
        let (image, memory) = create_image(&device, extent)?;

        transition_layout(
            &device,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        copy_buffer_to_image(&device, staging.handle(), image, extent)?;
        transition_layout(
            &device,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let view = create_view(&device, image)?;
        let sampler = create_sampler(&device)?;

        Ok(Self {
            device,
            image,
            memory,
            view,
            sampler,
            extent,
        })
    }

    /// Load and decode an image file
    ///
    /// Returns `Ok(None)` when the file cannot be read or decoded; the error
    /// is logged and the caller substitutes a default.
    pub fn from_file(device: Arc<Device>, path: &Path) -> VulkanResult<Option<Self>> {
        let decoded = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                log::warn!("failed to load texture {path:?}: {e}");
                return Ok(None);
            }
        };
        let (width, height) = decoded.dimensions();
        Self::from_rgba8(device, width, height, decoded.as_raw()).map(Some)
    }

    /// A 1x1 texture of a single color, used as the untextured fallback
    pub fn solid_color(device: Arc<Device>, rgba: [u8; 4]) -> VulkanResult<Self> {
        Self::from_rgba8(device, 1, 1, &rgba)
    }

    /// Descriptor info for combined image sampler bindings
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Texture dimensions
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

fn create_image(
    device: &Device,
    extent: vk::Extent2D,
) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .format(vk::Format::R8G8B8A8_SRGB)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let image = unsafe {
        device
            .handle()
            .create_image(&image_info, None)
            .map_err(VulkanError::Api)?
    };

    let requirements = unsafe { device.handle().get_image_memory_requirements(image) };
    let memory_type = device
        .find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .ok_or(VulkanError::NoSuitableMemoryType)?;
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
    unsafe {
        device
            .handle()
            .bind_image_memory(image, memory, 0)
            .map_err(VulkanError::Api)?;
    }
    Ok((image, memory))
}

fn transition_layout(
    device: &Device,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> VulkanResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => {
            return Err(VulkanError::InvalidOperation {
                reason: format!("unsupported layout transition {old_layout:?} -> {new_layout:?}"),
            })
        }
    };

    let command_buffer = device.begin_single_time_commands()?;
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);
    unsafe {
        device.handle().cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            std::slice::from_ref(&barrier),
        );
    }
    device.end_single_time_commands(command_buffer)
}

fn copy_buffer_to_image(
    device: &Device,
    buffer: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) -> VulkanResult<()> {
    let command_buffer = device.begin_single_time_commands()?;
    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });
    unsafe {
        device.handle().cmd_copy_buffer_to_image(
            command_buffer,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            std::slice::from_ref(&region),
        );
    }
    device.end_single_time_commands(command_buffer)
}

fn create_view(device: &Device, image: vk::Image) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(vk::Format::R8G8B8A8_SRGB)
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
}

fn create_sampler(device: &Device) -> VulkanResult<vk::Sampler> {
    let anisotropy = device.physical().features.sampler_anisotropy == vk::TRUE;
    let max_anisotropy = if anisotropy {
        device.limits().max_sampler_anisotropy
    } else {
        1.0
    };
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0);
    unsafe {
        device
            .handle()
            .create_sampler(&sampler_info, None)
            .map_err(VulkanError::Api)
    }
}
