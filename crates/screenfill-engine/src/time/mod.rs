//! Time subsystem.
//!
//! Provides frame timing utilities without coupling to the runtime.
//! Intended usage:
//! - one `FrameClock` per window (or per render loop)
//! - call `tick()` once per display tick to obtain `FrameTime`
//! - read `FrameTime::fps` for pacing diagnostics

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
