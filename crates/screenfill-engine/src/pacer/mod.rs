//! Frame pacing.
//!
//! Bounds the number of frames in flight (submitted to the GPU but not yet
//! confirmed complete) with a fixed pool of frame slots and a counting permit
//! store.
//!
//! Intended usage, once per display tick:
//! - `FramePacer::acquire_slot()` blocks until the next slot is free
//! - the renderer fills the per-frame resources indexed by `FrameSlotHandle::index()`
//! - the handle is moved into the GPU completion callback, which calls `release()`
//!
//! Slots are handed out round-robin, so reuse order equals submission order.

mod config;
mod error;
mod frame_pacer;

pub use config::{PacerConfig, ProtocolPolicy};
pub use error::PacerError;
pub use frame_pacer::{FramePacer, FrameSlotHandle, PacerStats};
