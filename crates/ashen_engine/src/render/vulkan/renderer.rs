//! Frame orchestration over the swapchain
//!
//! `begin_frame` hands out a [`Frame`] token; render pass control and
//! `end_frame` consume it, so a caller cannot record outside an active frame
//! or end a frame twice. Misuse of the sequence is a programming error and
//! panics; swapchain staleness is recoverable and surfaces as `Ok(None)`.

use std::sync::Arc;

use ash::vk;

use crate::render::vulkan::{Device, Swapchain, VulkanError, VulkanResult};
use crate::render::window::WindowSource;

/// Proof that a frame is being recorded
///
/// Not `Clone`: exactly one live frame exists between `begin_frame` and
/// `end_frame`.
pub struct Frame {
    command_buffer: vk::CommandBuffer,
    image_index: u32,
    frame_index: usize,
}

impl Frame {
    /// Command buffer being recorded this frame
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Which of the in-flight frame slots this frame occupies
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }
}

/// Owns the swapchain, per-frame command buffers and the frame cursor
pub struct Renderer {
    device: Arc<Device>,
    swapchain: Option<Swapchain>,
    command_buffers: Vec<vk::CommandBuffer>,
    current_frame: usize,
    frame_started: bool,
    resize_requested: bool,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Create a renderer paced at `max_frames_in_flight`
    pub fn new(
        device: Arc<Device>,
        window: &dyn WindowSource,
        max_frames_in_flight: usize,
        clear_color: [f32; 4],
    ) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(
            device.clone(),
            window.framebuffer_extent(),
            max_frames_in_flight,
        )?;
        let command_buffers = allocate_command_buffers(&device, max_frames_in_flight)?;
        Ok(Self {
            device,
            swapchain: Some(swapchain),
            command_buffers,
            current_frame: 0,
            frame_started: false,
            resize_requested: false,
            clear_color,
        })
    }

    /// Begin recording a frame
    ///
    /// `Ok(None)` means no image could be acquired this tick (stale swapchain
    /// or minimized window); the caller skips rendering and tries again next
    /// tick. Calling while a frame is already open panics.
    pub fn begin_frame(&mut self, window: &dyn WindowSource) -> VulkanResult<Option<Frame>> {
        assert!(
            !self.frame_started,
            "begin_frame called while a frame is already in progress"
        );

        if self.resize_requested {
            if !self.recreate_swapchain(window)? {
                return Ok(None);
            }
        }

        let image_index = match self.swapchain().acquire_next_image(self.current_frame)? {
            Some((index, suboptimal)) => {
                // A suboptimal image still renders; rebuild before next frame.
                if suboptimal {
                    self.resize_requested = true;
                }
                index
            }
            None => {
                self.resize_requested = true;
                return Ok(None);
            }
        };

        let command_buffer = self.command_buffers[self.current_frame];
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            let begin_info = vk::CommandBufferBeginInfo::builder();
            self.device
                .handle()
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.frame_started = true;
        Ok(Some(Frame {
            command_buffer,
            image_index,
            frame_index: self.current_frame,
        }))
    }

    /// Begin the swapchain render pass with clear color and depth, and set
    /// the viewport and scissor to the full extent
    pub fn begin_swapchain_render_pass(&self, frame: &Frame) {
        let swapchain = self.swapchain();
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let extent = swapchain.extent();
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(swapchain.render_pass())
            .framebuffer(swapchain.framebuffer(frame.image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                frame.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
            self.device
                .handle()
                .cmd_set_viewport(frame.command_buffer, 0, std::slice::from_ref(&viewport));
            self.device
                .handle()
                .cmd_set_scissor(frame.command_buffer, 0, std::slice::from_ref(&scissor));
        }
    }

    /// End the swapchain render pass
    pub fn end_swapchain_render_pass(&self, frame: &Frame) {
        unsafe {
            self.device.handle().cmd_end_render_pass(frame.command_buffer);
        }
    }

    /// Finish recording, submit and present, then advance the frame cursor
    pub fn end_frame(&mut self, frame: Frame) -> VulkanResult<()> {
        assert!(self.frame_started, "end_frame called without begin_frame");

        unsafe {
            self.device
                .handle()
                .end_command_buffer(frame.command_buffer)
                .map_err(VulkanError::Api)?;
        }

        let stale = self.swapchain().submit_and_present(
            frame.command_buffer,
            frame.image_index,
            frame.frame_index,
        )?;
        if stale {
            self.resize_requested = true;
        }

        self.frame_started = false;
        self.current_frame = (self.current_frame + 1) % self.max_frames_in_flight();
        Ok(())
    }

    /// Flag that the surface size changed; the swapchain is rebuilt lazily on
    /// the next `begin_frame`
    pub fn note_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Render pass used by all swapchain-targeting pipelines
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain().render_pass()
    }

    /// Current swapchain aspect ratio
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain().aspect_ratio()
    }

    /// Frames that may be in flight concurrently
    pub fn max_frames_in_flight(&self) -> usize {
        self.swapchain().max_frames_in_flight()
    }

    /// Replace the clear color used by subsequent render passes
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn swapchain(&self) -> &Swapchain {
        // Only None transiently inside recreate_swapchain.
        self.swapchain.as_ref().unwrap_or_else(|| {
            panic!("swapchain accessed during recreation")
        })
    }

    /// Rebuild the swapchain for the current window size
    ///
    /// Returns `false` while the window is minimized; rendering pauses until
    /// it has a nonzero extent again.
    fn recreate_swapchain(&mut self, window: &dyn WindowSource) -> VulkanResult<bool> {
        if window.is_minimized() {
            return Ok(false);
        }
        let extent = window.framebuffer_extent();
        if extent.width == 0 || extent.height == 0 {
            return Ok(false);
        }
        self.device.wait_idle()?;
        let old = self.swapchain.take().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "swapchain missing during recreation".to_string(),
        })?;
        self.swapchain = Some(old.recreate(extent)?);
        self.resize_requested = false;
        log::info!("swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(true)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("device wait failed during renderer teardown: {e}");
        }
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.device.command_pool(), &self.command_buffers);
        }
    }
}

fn allocate_command_buffers(
    device: &Device,
    count: usize,
) -> VulkanResult<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(device.command_pool())
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count as u32);
    unsafe {
        device
            .handle()
            .allocate_command_buffers(&alloc_info)
            .map_err(VulkanError::Api)
    }
}
