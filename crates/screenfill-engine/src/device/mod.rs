//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the Surface (swapchain)
//! - pacing frames: a frame slot is acquired before each surface texture and
//!   released from the queue's completion callback once the GPU is done with it

mod error;
mod frame;
mod gpu;

pub use error::{FrameError, SurfaceErrorAction};
pub use frame::GpuFrame;
pub use gpu::{Gpu, GpuInit};
