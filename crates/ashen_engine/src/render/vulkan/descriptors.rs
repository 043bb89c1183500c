//! Descriptor set layouts, pool allocation and resource binding
//!
//! Two binding strategies are supported: persistent sets allocated from a
//! [`DescriptorPool`] (recoverable on exhaustion), and push descriptors
//! written straight into a command buffer for data that changes every draw —
//! the latter avoids pool churn at high draw-call rates.

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::{Device, VulkanError, VulkanResult};

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding>,
}

/// Builder accumulating (binding slot, type, stage, count) tuples
pub struct DescriptorSetLayoutBuilder {
    device: Arc<Device>,
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding>,
    push_descriptors: bool,
}

impl DescriptorSetLayoutBuilder {
    /// Add a binding; duplicate slots are a construction error
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> VulkanResult<Self> {
        if self.bindings.contains_key(&binding) {
            return Err(VulkanError::InvalidOperation {
                reason: format!("duplicate descriptor binding slot {binding}"),
            });
        }
        self.bindings.insert(
            binding,
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        Ok(self)
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(
        self,
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> VulkanResult<Self> {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags, 1)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(
        self,
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> VulkanResult<Self> {
        self.add_binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
            1,
        )
    }

    /// Add a storage buffer binding
    pub fn add_storage_buffer(
        self,
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> VulkanResult<Self> {
        self.add_binding(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags, 1)
    }

    /// Mark this layout for push-descriptor binding
    pub fn push_descriptors(mut self) -> Self {
        self.push_descriptors = true;
        self
    }

    /// Build the layout
    pub fn build(self) -> VulkanResult<DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> =
            self.bindings.values().copied().collect();
        let flags = if self.push_descriptors {
            vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(flags)
            .bindings(&bindings);
        let layout = unsafe {
            self.device
                .handle()
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(DescriptorSetLayout {
            device: self.device,
            layout,
            bindings: self.bindings,
        })
    }
}

impl DescriptorSetLayout {
    /// Start building a layout
    pub fn builder(device: Arc<Device>) -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder {
            device,
            bindings: BTreeMap::new(),
            push_descriptors: false,
        }
    }

    /// Layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    fn binding(&self, slot: u32) -> Option<&vk::DescriptorSetLayoutBinding> {
        self.bindings.get(&slot)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Fixed-capacity descriptor pool
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool with the given per-type sizes and set capacity
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[(vk::DescriptorType, u32)],
    ) -> VulkanResult<Self> {
        let sizes: Vec<vk::DescriptorPoolSize> = pool_sizes
            .iter()
            .map(|&(ty, count)| {
                vk::DescriptorPoolSize::builder()
                    .ty(ty)
                    .descriptor_count(count)
                    .build()
            })
            .collect();
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&sizes);
        let pool = unsafe {
            device
                .handle()
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, pool })
    }

    /// Allocate one set; exhaustion is recoverable and returns `None`
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> Option<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        match unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets.into_iter().next(),
            Err(e) => {
                log::warn!("descriptor set allocation failed: {e:?}");
                None
            }
        }
    }

    /// Free all allocated sets
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(self.pool, None);
        }
    }
}

enum BindingInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// Accumulates bindings against a layout, then writes or pushes them
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    bindings: Vec<(u32, BindingInfo)>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start writing against `layout`
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout,
            bindings: Vec::new(),
        }
    }

    /// Bind a buffer range to a slot
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.bindings.push((binding, BindingInfo::Buffer(info)));
        self
    }

    /// Bind an image + sampler to a slot
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.bindings.push((binding, BindingInfo::Image(info)));
        self
    }

    fn assemble(&self, dst_set: vk::DescriptorSet) -> Vec<vk::WriteDescriptorSet> {
        self.bindings
            .iter()
            .filter_map(|(slot, info)| {
                let Some(layout_binding) = self.layout.binding(*slot) else {
                    log::warn!("descriptor write to unknown binding slot {slot}, skipped");
                    return None;
                };
                let mut write = vk::WriteDescriptorSet::builder()
                    .dst_set(dst_set)
                    .dst_binding(*slot)
                    .dst_array_element(0)
                    .descriptor_type(layout_binding.descriptor_type);
                write = match info {
                    BindingInfo::Buffer(buffer_info) => {
                        write.buffer_info(std::slice::from_ref(buffer_info))
                    }
                    BindingInfo::Image(image_info) => {
                        write.image_info(std::slice::from_ref(image_info))
                    }
                };
                Some(write.build())
            })
            .collect()
    }

    /// Allocate a persistent set from `pool` and write all bindings into it
    ///
    /// Returns `None` on allocation failure; the caller degrades gracefully.
    pub fn build(self, device: &Device, pool: &DescriptorPool) -> Option<vk::DescriptorSet> {
        let set = pool.allocate(self.layout)?;
        let writes = self.assemble(set);
        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }
        Some(set)
    }

    /// Push all bindings directly into a command buffer, without pool allocation
    pub fn push(
        self,
        device: &Device,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        set_index: u32,
    ) {
        let writes = self.assemble(vk::DescriptorSet::null());
        unsafe {
            device.push_descriptor_loader().cmd_push_descriptor_set(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                set_index,
                &writes,
            );
        }
    }
}
