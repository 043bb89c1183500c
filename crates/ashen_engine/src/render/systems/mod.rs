//! Render systems
//!
//! Each system owns its pipeline and descriptor layout and records draws for
//! one slice of the scene: one-off surfaces, instanced surface groups, or
//! light billboards. Systems share the per-frame camera and lighting uniform
//! buffers through [`FrameUniforms`].

mod forward;
mod instanced;
mod lights;

pub use forward::ForwardRenderSystem;
pub use instanced::{build_instance_batches, InstanceBatch, InstancedRenderSystem};
pub use lights::{collect_billboards, LightBillboard, LightRenderSystem};

use ash::vk;

/// Descriptor infos for the uniform buffers of the frame being recorded
#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms {
    /// Camera matrices block
    pub camera: vk::DescriptorBufferInfo,
    /// Scene lighting block
    pub lights: vk::DescriptorBufferInfo,
}
