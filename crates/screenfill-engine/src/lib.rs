//! Screenfill engine crate.
//!
//! A bounded frame-pipeline synchronizer (`pacer`) plus the platform and GPU
//! glue that drives it once per display tick.

pub mod pacer;

pub mod device;
pub mod window;
pub mod time;
pub mod core;

pub mod logging;
pub mod render;
pub mod paint;
