use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds (clamped).
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,

    /// Frames per second over the last completed averaging window, if any.
    pub fps: Option<f32>,
}

/// Frame clock producing `FrameTime` snapshots and a smoothed frame rate.
///
/// Delta time is clamped to avoid pathological values when the application is paused
/// by the debugger, minimized, or stalls waiting for the GPU.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,

    rate_window: Duration,
    rate_start: Instant,
    rate_frames: u32,
    fps: Option<f32>,
}

impl FrameClock {
    /// Default rate averaging window.
    pub const RATE_WINDOW: Duration = Duration::from_millis(500);

    /// Creates a new clock with default clamps (0.1 ms to 250 ms).
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self {
            last: now,
            frame_index: 0,
            dt_min,
            dt_max,
            rate_window: Self::RATE_WINDOW,
            rate_start: now,
            rate_frames: 0,
            fps: None,
        }
    }

    /// Resets the clock baseline and discards the frame rate estimate.
    ///
    /// Useful after surface reconfigure events or when resuming from suspension.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last = now;
        self.rate_start = now;
        self.rate_frames = 0;
        self.fps = None;
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Advances the clock to `now`.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);
        self.last = now;

        self.rate_frames += 1;
        let window = now.saturating_duration_since(self.rate_start);
        if window >= self.rate_window {
            self.fps = Some(self.rate_frames as f32 / window.as_secs_f32());
            self.rate_frames = 0;
            self.rate_start = now;
        }

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
            fps: self.fps,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn frame_index_is_monotonic() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        let idx: Vec<u64> = (1..=3).map(|i| clock.tick_at(start + MS * 16 * i).frame_index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn dt_is_clamped() {
        let mut clock = FrameClock::with_clamps(MS, MS * 100);
        let start = clock.last;

        assert!((clock.tick_at(start).dt - 0.001).abs() < 1e-6);
        assert!((clock.tick_at(start + MS * 10_000).dt - 0.1).abs() < 1e-6);
        assert!((clock.tick_at(start + MS * 10_016).dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn frame_rate_reported_after_window() {
        let mut clock = FrameClock::new();
        let start = clock.rate_start;

        // 60 Hz for 30 frames = 500 ms.
        let mut last = None;
        for i in 1..=30u32 {
            let ft = clock.tick_at(start + Duration::from_micros(16_667) * i);
            if i < 30 {
                assert_eq!(ft.fps, None);
            }
            last = ft.fps;
        }

        let fps = last.unwrap();
        assert!((fps - 60.0).abs() < 0.5, "fps = {fps}");

        let next = clock.tick_at(start + Duration::from_micros(16_667) * 31);
        assert_eq!(next.fps, Some(fps));
    }

    #[test]
    fn reset_discards_rate() {
        let mut clock = FrameClock::new();
        let start = clock.rate_start;
        assert!(clock.tick_at(start + Duration::from_secs(1)).fps.is_some());

        clock.reset();
        let after = clock.last + MS * 16;
        assert_eq!(clock.tick_at(after).fps, None);
    }
}
