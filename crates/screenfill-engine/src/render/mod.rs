//! Per-frame rendering handles.
//!
//! Renderers receive a `RenderCtx` describing the frame (device, queue, slot)
//! and a `RenderTarget` to record into. Per-frame mutable GPU state must be
//! indexed by `RenderCtx::slot_index`, never shared across slots.

mod ctx;

pub use ctx::{RenderCtx, RenderTarget};
