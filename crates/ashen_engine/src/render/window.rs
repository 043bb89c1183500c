//! Window/surface provider boundary
//!
//! Window creation and input live in the application shell; the engine only
//! needs a surface to render into and the shell's framebuffer geometry. The
//! [`WindowSource`] trait is that contract. Shells built on any windowing
//! library can implement it with the `raw-window-handle` helpers below.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Contract the application shell's window must satisfy
pub trait WindowSource {
    /// Current framebuffer size in pixels
    fn framebuffer_extent(&self) -> vk::Extent2D;

    /// Whether the window is currently minimized (zero-sized framebuffer)
    fn is_minimized(&self) -> bool;

    /// Instance extensions the platform requires for surface creation
    fn required_extensions(&self) -> VulkanResult<Vec<std::ffi::CString>>;

    /// Create a presentable surface for this window
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> VulkanResult<vk::SurfaceKHR>;
}

/// Enumerate required instance extensions for a raw display handle
///
/// Helper for [`WindowSource`] implementors backed by `raw-window-handle`.
pub fn required_extensions_for(
    window: &(impl HasRawDisplayHandle + ?Sized),
) -> VulkanResult<Vec<std::ffi::CString>> {
    let names = ash_window::enumerate_required_extensions(window.raw_display_handle())
        .map_err(VulkanError::Api)?;
    Ok(names
        .iter()
        .map(|&ptr| unsafe { std::ffi::CStr::from_ptr(ptr) }.to_owned())
        .collect())
}

/// Create a Vulkan surface from raw window/display handles
///
/// Helper for [`WindowSource`] implementors backed by `raw-window-handle`.
pub fn create_surface_for(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &(impl HasRawDisplayHandle + HasRawWindowHandle + ?Sized),
) -> VulkanResult<vk::SurfaceKHR> {
    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
            None,
        )
        .map_err(VulkanError::Api)
    }
}
