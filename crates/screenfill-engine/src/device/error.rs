use std::fmt;

use crate::pacer::PacerError;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Failure to begin a frame.
#[derive(Debug)]
pub enum FrameError {
    /// No frame slot could be acquired (timeout or shutdown).
    Pacer(PacerError),
    /// The surface texture could not be acquired.
    Surface(wgpu::SurfaceError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Pacer(e) => write!(f, "failed to acquire frame slot: {e}"),
            FrameError::Surface(e) => write!(f, "failed to acquire surface texture: {e}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Pacer(e) => Some(e),
            FrameError::Surface(e) => Some(e),
        }
    }
}

impl From<PacerError> for FrameError {
    fn from(e: PacerError) -> Self {
        FrameError::Pacer(e)
    }
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(e: wgpu::SurfaceError) -> Self {
        FrameError::Surface(e)
    }
}
