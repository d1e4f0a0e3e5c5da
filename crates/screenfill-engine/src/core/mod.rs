//! Core engine-facing contracts.
//!
//! This module defines the interface between the runtime (display loop) and the
//! application drawing each frame. The application never touches the pacer
//! directly; `FrameCtx::render` acquires and releases frame slots on its behalf.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
