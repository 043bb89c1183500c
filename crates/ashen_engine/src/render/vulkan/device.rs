//! Device bootstrap: instance, physical device selection, logical device,
//! queues and the shared command pool
//!
//! The [`Device`] is the root resource owner; every other Vulkan wrapper in
//! this crate holds an `Arc<Device>` so the device is destroyed strictly
//! last. Construction failures here surface as [`VulkanError`] and end
//! bootstrap.

use std::collections::HashSet;
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{PushDescriptor, Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Entry, Instance};

use crate::render::config::RendererConfig;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::render::window::WindowSource;

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Swapchain-related capabilities of a physical device for a surface
pub struct SwapchainSupport {
    /// Surface capabilities (image counts, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Selected physical device and its queue families
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

/// Owner of the GPU handle, queues and the reusable command pool
pub struct Device {
    entry: Entry,
    instance: Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface: vk::SurfaceKHR,
    surface_loader: SurfaceLoader,
    physical: PhysicalDeviceInfo,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
    push_descriptor_loader: PushDescriptor,
    command_pool: vk::CommandPool,
}

impl Device {
    /// Bootstrap the full device stack for the given window
    pub fn new(window: &dyn WindowSource, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("failed to load Vulkan: {e:?}"))
        })?;

        let validation = config.validation_enabled();
        let instance = Self::create_instance(&entry, window, &config.application_name, validation)?;
        let debug_utils = if validation {
            match Self::create_debug_messenger(&entry, &instance) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    log::warn!("debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = SurfaceLoader::new(&entry, &instance);
        let surface = window.create_surface(&entry, &instance)?;

        let physical = Self::select_physical_device(&instance, surface, &surface_loader)?;
        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(physical.properties.device_name.as_ptr()).to_string_lossy()
        });

        let (device, graphics_queue, present_queue) =
            Self::create_logical_device(&instance, &physical)?;
        let swapchain_loader = SwapchainLoader::new(&instance, &device);
        let push_descriptor_loader = PushDescriptor::new(&instance, &device);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(physical.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Device created (graphics family {})", physical.graphics_family);
        Ok(Self {
            entry,
            instance,
            debug_utils,
            surface,
            surface_loader,
            physical,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
            push_descriptor_loader,
            command_pool,
        })
    }

    fn create_instance(
        entry: &Entry,
        window: &dyn WindowSource,
        app_name: &str,
        validation: bool,
    ) -> VulkanResult<Instance> {
        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("invalid app name".to_string()))?;
        let engine_name = CString::new("ashen_engine").expect("static name");
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extension_names = window.required_extensions()?;
        if validation {
            extension_names.push(DebugUtils::name().to_owned());
        }
        let extension_ptrs: Vec<*const i8> =
            extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let layer_names = if validation {
            vec![CString::new(VALIDATION_LAYER).expect("static name")]
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    fn create_debug_messenger(
        entry: &Entry,
        instance: &Instance,
    ) -> VulkanResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok((debug_utils, messenger))
    }

    fn select_physical_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
    ) -> VulkanResult<PhysicalDeviceInfo> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };
        log::debug!("Found {} physical device(s)", devices.len());

        for device in devices {
            match Self::evaluate_device(instance, device, surface, surface_loader) {
                Ok(info) => return Ok(info),
                Err(e) => log::debug!("Skipping device: {e}"),
            }
        }
        Err(VulkanError::InitializationFailed(
            "no suitable GPU found".to_string(),
        ))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &SurfaceLoader,
    ) -> VulkanResult<PhysicalDeviceInfo> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
                graphics_family = Some(index);
            }
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if present_support && present_family.is_none() {
                present_family = Some(index);
            }
            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }
        let graphics_family = graphics_family.ok_or_else(|| {
            VulkanError::InitializationFailed("no graphics queue family".to_string())
        })?;
        let present_family = present_family.ok_or_else(|| {
            VulkanError::InitializationFailed("no present queue family".to_string())
        })?;

        let available = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        for required in Self::required_device_extensions() {
            let found = available.iter().any(|ext| {
                (unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }) == required
            });
            if !found {
                return Err(VulkanError::InitializationFailed(format!(
                    "missing device extension {required:?}"
                )));
            }
        }

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "surface has no formats or present modes".to_string(),
            ));
        }

        Ok(PhysicalDeviceInfo {
            device,
            properties,
            features,
            graphics_family,
            present_family,
        })
    }

    fn required_device_extensions() -> [&'static CStr; 2] {
        [SwapchainLoader::name(), PushDescriptor::name()]
    }

    fn create_logical_device(
        instance: &Instance,
        physical: &PhysicalDeviceInfo,
    ) -> VulkanResult<(ash::Device, vk::Queue, vk::Queue)> {
        let unique_families: HashSet<u32> = [physical.graphics_family, physical.present_family]
            .iter()
            .copied()
            .collect();
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_ptrs: Vec<*const i8> = Self::required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical.features.sampler_anisotropy == vk::TRUE);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };
        let graphics_queue = unsafe { device.get_device_queue(physical.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.present_family, 0) };
        Ok((device, graphics_queue, present_queue))
    }

    /// Find a memory type index matching `type_bits` and `properties`
    ///
    /// `None` means no compatible memory exists; the allocation in progress
    /// cannot proceed.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        let mem_properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical.device)
        };
        (0..mem_properties.memory_type_count).find(|&i| {
            (type_bits & (1 << i)) != 0
                && mem_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
    }

    /// Find the first candidate format supporting `features` under `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|&format| {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical.device, format)
            };
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                _ => props.optimal_tiling_features.contains(features),
            }
        })
    }

    /// Query current swapchain support for the device surface
    pub fn swapchain_support(&self) -> VulkanResult<SwapchainSupport> {
        unsafe {
            Ok(SwapchainSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(self.physical.device, self.surface)
                    .map_err(VulkanError::Api)?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(self.physical.device, self.surface)
                    .map_err(VulkanError::Api)?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(self.physical.device, self.surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }

    /// Begin a single-use command buffer from the shared pool
    pub fn begin_single_time_commands(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(command_buffer)
    }

    /// Submit a single-use command buffer, wait for completion and free it
    pub fn end_single_time_commands(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
            let buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
            self.device
                .queue_submit(self.graphics_queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(VulkanError::Api)?;
            self.device.free_command_buffers(self.command_pool, &buffers);
        }
        Ok(())
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    /// Raw logical device handle
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Selected physical device info
    pub fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Device properties and limits
    pub fn limits(&self) -> vk::PhysicalDeviceLimits {
        self.physical.properties.limits
    }

    /// Presentation surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Push descriptor extension loader
    pub fn push_descriptor_loader(&self) -> &PushDescriptor {
        &self.push_descriptor_loader
    }

    /// Shared command pool
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // Reverse construction order; wait for outstanding GPU work first.
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Forward validation-layer messages through the log facade
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }
    vk::FALSE
}
