//! Rendering: Vulkan backend, resources, uniform packing and render systems

pub mod config;
pub mod context;
pub mod frame;
pub mod resources;
pub mod std140;
pub mod systems;
pub mod ubo;
pub mod vulkan;
pub mod window;

pub use config::{ConfigError, RendererConfig};
pub use context::{RenderContext, UiHook};
pub use frame::FrameInfo;
pub use resources::{MeshHandle, ResourceRegistry, TextureHandle};
pub use vulkan::{MeshData, Vertex, VulkanError, VulkanResult};
pub use window::WindowSource;
