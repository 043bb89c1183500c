//! Per-frame data handed to render systems

use ash::vk;

/// Everything a render system needs to record into the current frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Command buffer being recorded
    pub command_buffer: vk::CommandBuffer,
    /// In-flight frame slot, indexes per-frame uniform buffers
    pub frame_index: usize,
    /// Seconds since the previous frame
    pub delta_time: f32,
}
