use winit::window::{Window, WindowId};

use crate::device::{FrameError, Gpu, SurfaceErrorAction};
use crate::pacer::PacerError;
use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id:     WindowId,
    pub window: &'a Window,
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window:  WindowCtx<'a>,
    pub gpu:     &'a mut Gpu<'w>,
    pub time:    FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires a frame slot, clears the surface with the color returned by
    /// `clear`, calls `draw` with a ready [`RenderCtx`] and [`RenderTarget`], then
    /// submits and presents.
    ///
    /// `clear` sees the `RenderCtx`, so the fill can depend on the slot in use.
    ///
    /// The slot is released when the GPU reports the submission complete.
    ///
    /// Outcomes:
    /// - slot acquisition timed out: the frame is dropped, the loop continues
    /// - pacer shut down: `AppControl::Exit`
    /// - fatal surface error: `AppControl::Exit`
    pub fn render<C, F>(&mut self, clear: C, draw: F) -> AppControl
    where
        C: FnOnce(&RenderCtx<'_>) -> Color,
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(FrameError::Surface(err)) => {
                let action = self.gpu.handle_surface_error(err);
                if action == SurfaceErrorAction::Fatal {
                    log::error!("fatal surface error; exiting");
                    return AppControl::Exit;
                }
                return AppControl::Continue;
            }
            Err(FrameError::Pacer(PacerError::Timeout)) => {
                log::warn!("frame {} dropped: no frame slot became free", self.time.frame_index);
                return AppControl::Continue;
            }
            Err(FrameError::Pacer(PacerError::Shutdown)) => {
                log::info!("frame pacer shut down; exiting");
                return AppControl::Exit;
            }
            Err(err) => {
                log::error!("{err}");
                return AppControl::Exit;
            }
        };

        let rctx = RenderCtx {
            device:          self.gpu.device(),
            queue:           self.gpu.queue(),
            surface_format:  self.gpu.surface_format(),
            size:            self.gpu.size(),
            slot_index:      frame.slot_index(),
            slot_generation: frame.slot_generation(),
        };

        // RenderTarget borrows frame.encoder; dropped before submit() takes frame.
        {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
            target.clear("screenfill clear", clear(&rctx));
            draw(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}
