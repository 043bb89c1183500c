//! Ashen: a real-time 3D rendering engine built on Vulkan
//!
//! The engine is organized in three layers:
//!
//! - [`foundation`]: math types and logging setup shared by everything else
//! - [`scene`]: the CPU-side world — named objects with surfaces, three
//!   categories of lights, and the active camera
//! - [`render`]: the Vulkan backend, GPU resource registries, and the render
//!   systems that turn a scene into draw calls each frame
//!
//! A typical application creates a [`render::RenderContext`] over a window,
//! loads meshes and textures through it, populates a [`scene::Scene`], and
//! calls [`render::RenderContext::make_frame`] once per tick:
//!
//! ```no_run
//! # use ashen_engine::render::{RenderContext, RendererConfig, WindowSource};
//! # use ashen_engine::scene::Scene;
//! # fn run(window: &dyn WindowSource) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RendererConfig::new("demo").with_shader_dir("shaders");
//! let mut context = RenderContext::new(window, &config)?;
//! let mut scene = Scene::new();
//! loop {
//!     context.make_frame(window, &mut scene, 0.016, None)?;
//! }
//! # }
//! ```

pub mod foundation;
pub mod render;
pub mod scene;

pub use render::{RenderContext, RendererConfig, VulkanError, VulkanResult};
pub use scene::Scene;
