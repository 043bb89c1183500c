//! GPU buffer allocation with alignment-aware element addressing
//!
//! Memory management following RAII patterns; a [`Buffer`] owns one
//! allocation bound to one buffer handle. Uniform buffers replicated per
//! frame use the element-addressing helpers so each slot lands on a legal
//! dynamic-offset boundary.

use std::sync::Arc;

use ash::vk;

use crate::render::std140::round_up;
use crate::render::vulkan::{Device, VulkanError, VulkanResult};

/// Buffer wrapper with memory management and optional persistent mapping
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: Option<*mut std::ffi::c_void>,
    instance_size: vk::DeviceSize,
    alignment_size: vk::DeviceSize,
    instance_count: usize,
    buffer_size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer sized `round_up(instance_size, min_alignment) * instance_count`
    ///
    /// Pass the device's `min_uniform_buffer_offset_alignment` as
    /// `min_offset_alignment` for uniform buffers addressed per element, or
    /// 1 when element padding is not needed.
    pub fn new(
        device: Arc<Device>,
        instance_size: vk::DeviceSize,
        instance_count: usize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        let alignment_size = Self::alignment(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count as vk::DeviceSize;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(buffer_size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe {
            device
                .handle()
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };
        let Some(memory_type_index) =
            device.find_memory_type(requirements.memory_type_bits, properties)
        else {
            unsafe { device.handle().destroy_buffer(buffer, None) };
            return Err(VulkanError::NoSuitableMemoryType);
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = unsafe {
            match device.handle().allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.handle().destroy_buffer(buffer, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        if let Err(e) = unsafe { device.handle().bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.handle().destroy_buffer(buffer, None);
                device.handle().free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            mapped: None,
            instance_size,
            alignment_size,
            instance_count,
            buffer_size,
        })
    }

    /// Round `instance_size` up to the buffer's minimum offset alignment
    pub fn alignment(
        instance_size: vk::DeviceSize,
        min_offset_alignment: vk::DeviceSize,
    ) -> vk::DeviceSize {
        if min_offset_alignment > 0 {
            round_up(instance_size as usize, min_offset_alignment as usize) as vk::DeviceSize
        } else {
            instance_size
        }
    }

    /// Map `size` bytes at `offset` for CPU writes
    pub fn map(&mut self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        let mapped = unsafe {
            self.device
                .handle()
                .map_memory(self.memory, offset, size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };
        self.mapped = Some(mapped);
        Ok(())
    }

    /// Map the whole buffer for CPU writes
    pub fn map_whole(&mut self) -> VulkanResult<()> {
        self.map(vk::WHOLE_SIZE, 0)
    }

    /// Unmap previously mapped memory
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe {
                self.device.handle().unmap_memory(self.memory);
            }
        }
    }

    /// Write raw bytes at a byte offset into mapped memory
    ///
    /// Panics when the buffer is not mapped or the write would overrun it;
    /// both are programming errors on the caller's side.
    pub fn write_bytes(&self, data: &[u8], offset: vk::DeviceSize) {
        let mapped = self.mapped.expect("buffer must be mapped before writing");
        assert!(
            offset + data.len() as vk::DeviceSize <= self.buffer_size,
            "write of {} bytes at offset {} overruns buffer of {} bytes",
            data.len(),
            offset,
            self.buffer_size,
        );
        unsafe {
            let dst = mapped.cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
    }

    /// Write one element at its aligned slot
    pub fn write_to_index<T: bytemuck::Pod>(&self, data: &T, index: usize) {
        self.write_bytes(bytemuck::bytes_of(data), self.offset_of(index));
    }

    /// Byte offset of the aligned slot for `index`
    pub fn offset_of(&self, index: usize) -> vk::DeviceSize {
        self.alignment_size * index as vk::DeviceSize
    }

    /// Descriptor info covering `size` bytes at `offset`
    pub fn descriptor_info(
        &self,
        size: vk::DeviceSize,
        offset: vk::DeviceSize,
    ) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo::builder()
            .buffer(self.buffer)
            .offset(offset)
            .range(size)
            .build()
    }

    /// Descriptor info covering one element slot
    pub fn descriptor_info_for_index(&self, index: usize) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.instance_size, self.offset_of(index))
    }

    /// One-shot device-to-device copy of `size` bytes
    ///
    /// Records into a single-use command buffer, submits and waits idle.
    pub fn copy(
        device: &Device,
        src: &Buffer,
        dst: &Buffer,
        size: vk::DeviceSize,
    ) -> VulkanResult<()> {
        let command_buffer = device.begin_single_time_commands()?;
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device
                .handle()
                .cmd_copy_buffer(command_buffer, src.buffer, dst.buffer, &[region]);
        }
        device.end_single_time_commands(command_buffer)
    }

    /// Build a device-local buffer initialized with `data` via a staging copy
    pub fn device_local_with_data(
        device: Arc<Device>,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> VulkanResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let mut staging = Buffer::new(
            device.clone(),
            size,
            1,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            1,
        )?;
        staging.map_whole()?;
        staging.write_bytes(data, 0);
        staging.unmap();

        let local = Buffer::new(
            device.clone(),
            size,
            1,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            1,
        )?;
        Buffer::copy(&device, &staging, &local, size)?;
        Ok(local)
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Total allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    /// Size of one element before alignment padding
    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    /// Stride between element slots
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    /// Number of element slots
    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Whether the buffer is currently mapped
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_rounds_up_to_min_offset() {
        assert_eq!(Buffer::alignment(64, 256), 256);
        assert_eq!(Buffer::alignment(256, 256), 256);
        assert_eq!(Buffer::alignment(260, 256), 512);
        assert_eq!(Buffer::alignment(100, 1), 100);
        assert_eq!(Buffer::alignment(100, 0), 100);
    }
}
