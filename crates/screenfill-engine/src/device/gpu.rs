use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::pacer::{FramePacer, FrameSlotHandle, PacerConfig, PacerError};

use super::error::{FrameError, SurfaceErrorAction};
use super::frame::GpuFrame;

/// Completion callbacks only run while the device is polled, so a blocked
/// acquisition wakes up at this interval to poll.
const COMPLETION_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound for draining in-flight frames when the `Gpu` is dropped.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Initialization parameters for the GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// sRGB is typically required for correct UI color output.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    ///
    /// FIFO is broadly supported and ties the frame rate to the display refresh.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Number of frames that may be in flight at once.
    ///
    /// Sizes the frame pacer and is passed to the surface as its desired maximum
    /// frame latency (a hint; support depends on platform/backend).
    pub frames_in_flight: usize,

    /// How long `Gpu::begin_frame` waits for a free frame slot before giving up
    /// with `PacerError::Timeout`. `None` waits indefinitely.
    pub acquire_timeout: Option<Duration>,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            frames_in_flight: 2,
            acquire_timeout: Some(Duration::from_secs(1)),
        }
    }
}

/// Owns wgpu core objects and the surface configuration.
///
/// This type is the low-level rendering context:
/// - creates Instance/Adapter and stores Device/Queue
/// - creates and configures the Surface (swapchain)
/// - paces frames and provides an encoder + view for rendering
pub struct Gpu<'w> {
    /// Surface bound to the window.
    ///
    /// Surface lifetime is tied to the window; architecture must ensure the window
    /// outlives the `Gpu` instance.
    surface: wgpu::Surface<'w>,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,

    /// Bounds the number of frames in flight.
    pacer: FramePacer,

    acquire_timeout: Option<Duration>,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu. Fails if
    /// `init.frames_in_flight` is zero.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        // The acquire timeout is applied per frame by `acquire_slot`, not by the pacer.
        let pacer = FramePacer::with_config(PacerConfig::new(init.frames_in_flight))
            .context("invalid frame pacing configuration")?;

        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Surface lifetime is tied to `window` via `'w`.
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("screenfill device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&surface_caps, init.prefer_srgb)
            .context("no supported surface formats")?;

        let alpha_mode = init
            .alpha_mode
            .filter(|m| surface_caps.alpha_modes.contains(m))
            .unwrap_or_else(|| {
                surface_caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
            });

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: u32::try_from(init.frames_in_flight)
                .context("frames_in_flight does not fit the surface latency hint")?,
        };

        surface.configure(&device, &config);

        log::info!(
            "gpu ready: {} ({:?}), format {:?}, {} frame(s) in flight",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            init.frames_in_flight
        );

        Ok(Gpu {
            surface,
            device,
            queue,
            config,
            size,
            pacer,
            acquire_timeout: init.acquire_timeout,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the frame pacer guarding per-frame resources.
    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// Reconfigures the surface after a resize.
    ///
    /// wgpu does not support configuring a surface with a 0x0 size; in that case,
    /// only internal state is updated and configuration is deferred.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            self.size = new_size;
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Acquires a frame slot, then the next surface texture, and creates an encoder.
    ///
    /// Blocks while all frame slots are in flight. The slot is released by the
    /// completion callback registered in `submit`.
    pub fn begin_frame(&self) -> std::result::Result<GpuFrame, FrameError> {
        let slot = self.acquire_slot()?;

        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                // Nothing was recorded into the slot; hand it straight back.
                let _ = slot.release();
                return Err(FrameError::Surface(err));
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("screenfill frame encoder"),
            });

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
            slot,
        })
    }

    /// Submits the recorded commands for the given frame.
    ///
    /// The frame slot moves into the queue's completion callback and is released
    /// there. Presentation occurs when `surface_texture` is dropped after submission.
    pub fn submit(&self, frame: GpuFrame) {
        let GpuFrame {
            surface_texture,
            view,
            encoder,
            slot,
        } = frame;

        self.queue.submit(std::iter::once(encoder.finish()));

        let index = slot.index();
        self.queue.on_submitted_work_done(move || {
            if let Err(e) = slot.release() {
                log::error!("completion callback for frame slot {index}: {e}");
            }
        });

        drop(view);
        drop(surface_texture);
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if self.size.width > 0 && self.size.height > 0 {
                    self.surface.configure(&self.device, &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}

impl Gpu<'_> {
    /// Runs pending completion callbacks without blocking.
    fn poll_completions(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("device poll failed: {e}");
        }
    }

    /// Waits for a frame slot, polling the device so completion callbacks fire.
    fn acquire_slot(&self) -> std::result::Result<FrameSlotHandle, PacerError> {
        let deadline = self.acquire_timeout.map(|t| Instant::now() + t);

        loop {
            self.poll_completions();

            let step = Instant::now() + COMPLETION_POLL_INTERVAL;
            let until = deadline.map_or(step, |d| d.min(step));

            match self.pacer.acquire_slot_until(until) {
                Err(PacerError::Timeout) if deadline.is_none_or(|d| Instant::now() < d) => {
                    continue;
                }
                Err(PacerError::Timeout) => {
                    log::warn!(
                        "no frame slot released within {:?} ({} in flight)",
                        self.acquire_timeout.unwrap_or_default(),
                        self.pacer.in_flight()
                    );
                    return Err(PacerError::Timeout);
                }
                other => return other,
            }
        }
    }
}

impl Drop for Gpu<'_> {
    fn drop(&mut self) {
        // Drain in-flight frames before the device and per-frame resources go away.
        let deadline = Instant::now() + TEARDOWN_TIMEOUT;
        loop {
            self.poll_completions();
            match self.pacer.wait_idle(COMPLETION_POLL_INTERVAL) {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {}
                Err(_) => {
                    log::warn!(
                        "dropping gpu with {} frame(s) still in flight",
                        self.pacer.in_flight()
                    );
                    break;
                }
            }
        }

        self.pacer.shutdown();
    }
}

fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if caps.formats.is_empty() {
        return None;
    }

    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        for f in preferred {
            if caps.formats.contains(&f) {
                return Some(f);
            }
        }
    }

    Some(caps.formats[0])
}