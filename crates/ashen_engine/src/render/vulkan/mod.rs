//! Vulkan backend
//!
//! RAII wrappers over the raw API. Construction failures at this layer are
//! unrecoverable for the resource being built and surface as
//! [`VulkanError`]; callers propagate them to the application boundary.

pub mod buffer;
pub mod descriptors;
pub mod device;
pub mod mesh;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod texture;

pub use buffer::Buffer;
pub use descriptors::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
pub use device::Device;
pub use mesh::{Mesh, MeshData, Vertex};
pub use pipeline::{GraphicsPipeline, PipelineConfig, ShaderModule};
pub use renderer::{Frame, Renderer};
pub use swapchain::Swapchain;
pub use texture::Texture;

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan bootstrap failed
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested properties
    #[error("no suitable memory type found")]
    NoSuitableMemoryType,

    /// No candidate format satisfies the requested features
    #[error("no supported format among candidates")]
    NoSupportedFormat,

    /// Invalid operation attempted
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
