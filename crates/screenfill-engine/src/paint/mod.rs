//! Colors used to fill frames.

pub mod color;

pub use color::Color;
