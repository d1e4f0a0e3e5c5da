use crate::pacer::FrameSlotHandle;

/// Represents a single acquired frame.
///
/// This object is short-lived and must be finalized promptly via `Gpu::submit`.
/// Holding it keeps both the surface texture and a frame slot claimed.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
    pub(crate) slot: FrameSlotHandle,
}

impl GpuFrame {
    /// Index of the frame slot this frame records into.
    ///
    /// Per-frame resources (uniform buffers, staging memory) should be indexed by it.
    pub fn slot_index(&self) -> usize {
        self.slot.index()
    }

    /// How many times the slot has been handed out, including this frame.
    pub fn slot_generation(&self) -> u64 {
        self.slot.generation()
    }
}
