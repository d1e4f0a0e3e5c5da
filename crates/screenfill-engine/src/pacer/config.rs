use std::time::Duration;

/// Response to an unbalanced release.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProtocolPolicy {
    /// Panic on the offending call. Default in debug builds.
    Panic,
    /// Log at error level and return `PacerError::Protocol`. Default in release builds.
    Log,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ProtocolPolicy::Panic
        } else {
            ProtocolPolicy::Log
        }
    }
}

/// Pacer configuration.
#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Number of frame slots (N). Must be at least 1.
    ///
    /// 2 is double buffering, 3 triple buffering. Worst-case input-to-display
    /// latency grows with this value.
    pub frames_in_flight: usize,

    /// Upper bound for `FramePacer::acquire_slot`.
    ///
    /// `None` blocks until a slot is released or the pacer shuts down.
    pub acquire_timeout: Option<Duration>,

    pub protocol_policy: ProtocolPolicy,
}

impl PacerConfig {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            ..Self::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn with_protocol_policy(mut self, policy: ProtocolPolicy) -> Self {
        self.protocol_policy = policy;
        self
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            acquire_timeout: None,
            protocol_policy: ProtocolPolicy::default(),
        }
    }
}
