use std::fmt;

/// Errors reported by `FramePacer` and `FrameSlotHandle`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PacerError {
    /// Invalid slot count at construction. Fatal.
    Config { frames_in_flight: usize },

    /// Release without a matching acquisition (double release or stale handle).
    /// Indicates a caller bug.
    Protocol { slot: usize, generation: u64 },

    /// Bounded wait exceeded. The caller drops or retries the frame.
    Timeout,

    /// The pacer was shut down while (or before) waiting. The caller exits its loop.
    Shutdown,
}

impl fmt::Display for PacerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacerError::Config { frames_in_flight } => {
                write!(f, "invalid frame pacer config: frames_in_flight = {frames_in_flight}, expected >= 1")
            }
            PacerError::Protocol { slot, generation } => {
                write!(f, "unbalanced release of frame slot {slot} (generation {generation})")
            }
            PacerError::Timeout => write!(f, "timed out waiting for a free frame slot"),
            PacerError::Shutdown => write!(f, "frame pacer shut down"),
        }
    }
}

impl std::error::Error for PacerError {}
