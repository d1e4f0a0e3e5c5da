//! Window + display loop.
//!
//! Owns the `winit` EventLoop and Window, and turns redraw requests into
//! display ticks for the application.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
