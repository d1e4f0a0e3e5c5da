use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use screenfill_engine::core::{App, AppControl, FrameCtx};
use screenfill_engine::device::GpuInit;
use screenfill_engine::logging::{init_logging, LoggingConfig};
use screenfill_engine::paint::Color;
use screenfill_engine::window::{Runtime, RuntimeConfig};

/// Overrides `GpuInit::frames_in_flight`.
const FRAMES_IN_FLIGHT_VAR: &str = "SCREENFILL_FRAMES_IN_FLIGHT";

const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Fills the whole surface every tick.
///
/// The hue sweeps with time; the brightness bands by frame slot so slot reuse
/// order is visible on screen (and in the periodic report).
struct ScreenFill {
    started: Instant,
    last_report: Instant,
    slot_hits: Vec<u64>,
}

impl ScreenFill {
    fn new(frames_in_flight: usize) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_report: now,
            slot_hits: vec![0; frames_in_flight],
        }
    }

    fn report(&mut self, ctx: &FrameCtx<'_, '_>) {
        let now = ctx.time.now;
        if now.saturating_duration_since(self.last_report) < REPORT_INTERVAL {
            return;
        }
        self.last_report = now;

        let stats = ctx.gpu.pacer().stats();
        let fps = ctx
            .time
            .fps
            .map_or_else(|| "n/a".to_string(), |f| format!("{f:.1}"));
        log::info!(
            "frame {}: {fps} fps, dt {:.2} ms, in flight {}/{}, acquired {}, released {}, per-slot {:?}",
            ctx.time.frame_index,
            ctx.time.dt * 1000.0,
            stats.in_flight,
            stats.capacity,
            stats.acquired_total,
            stats.released_total,
            self.slot_hits
        );
        if stats.protocol_violations > 0 {
            log::warn!("{} unbalanced slot release(s) so far", stats.protocol_violations);
        }
    }
}

impl App for ScreenFill {
    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let hue = self.started.elapsed().as_secs_f32() * 45.0;
        let hits = &mut self.slot_hits;
        let slots = hits.len();

        // The clear pass is the fill; nothing else is drawn.
        let control = ctx.render(
            |rctx| {
                if let Some(h) = hits.get_mut(rctx.slot_index) {
                    *h += 1;
                }
                slot_fill(hue, rctx.slot_index, slots)
            },
            |_, _| {},
        );

        self.report(ctx);
        control
    }

    fn on_exit(&mut self) {
        log::info!("screen fill finished; per-slot frame counts {:?}", self.slot_hits);
    }
}

/// Fill color for a frame: `hue` in degrees, brightness banded by `slot` out of `slots`.
fn slot_fill(hue: f32, slot: usize, slots: usize) -> Color {
    let band = (slot + 1) as f32 / slots.max(1) as f32;
    Color::from_hsv(hue, 0.8, 0.4 + 0.6 * band)
}

fn frames_in_flight() -> Result<usize> {
    match std::env::var(FRAMES_IN_FLIGHT_VAR) {
        Ok(v) => {
            let n: usize = v
                .trim()
                .parse()
                .with_context(|| format!("{FRAMES_IN_FLIGHT_VAR}={v:?} is not a number"))?;
            anyhow::ensure!(n >= 1, "{FRAMES_IN_FLIGHT_VAR} must be at least 1");
            Ok(n)
        }
        Err(_) => Ok(GpuInit::default().frames_in_flight),
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let frames_in_flight = frames_in_flight()?;
    log::info!("screen fill test: {frames_in_flight} frame(s) in flight");

    let gpu_init = GpuInit {
        frames_in_flight,
        present_mode: wgpu::PresentMode::Fifo,
        ..GpuInit::default()
    };

    Runtime::run(
        RuntimeConfig {
            title: "Screen Filling Test".to_string(),
            ..RuntimeConfig::default()
        },
        gpu_init,
        ScreenFill::new(frames_in_flight),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_fill_bands_brightness_by_slot() {
        let fills: Vec<Color> = (0..3).map(|slot| slot_fill(0.0, slot, 3)).collect();

        assert!(fills[0].r < fills[1].r && fills[1].r < fills[2].r);
        assert!((fills[2].r - 1.0).abs() < 1e-5);
        assert!(fills.iter().all(|c| c.a == 1.0));
    }

    #[test]
    fn slot_fill_hue_follows_time() {
        let red = slot_fill(0.0, 0, 1);
        let green = slot_fill(120.0, 0, 1);
        assert!(red.r > red.g);
        assert!(green.g > green.r);
    }
}
