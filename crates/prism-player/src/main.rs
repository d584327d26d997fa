//! Test-pattern player for the prism video output.
//!
//! Opens a window, renders an animated synthetic frame with a subtitle bar
//! and forwards window geometry changes to the output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use prism_vout::backend::wgpu::{WgpuBackend, WgpuOptions, WgpuSurface};
use prism_vout::config::VoutConfig;
use prism_vout::format::{
    ChromaLocation, ColorSystem, Picture, PixelFormat, Primaries, Subpicture, SubpictureRegion,
    Transfer, VideoFormat,
};
use prism_vout::logging::{LoggingConfig, init_logging};
use prism_vout::{ControlRequest, Display, DisplayConfig, FrameOutcome};

#[derive(Debug, Parser)]
#[command(name = "prism-player", about = "Render a test pattern through prism-vout")]
struct Args {
    /// JSON video output configuration.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log filter in env_logger syntax.
    #[arg(long)]
    log: Option<String>,

    /// Log per-frame compositor decisions.
    #[arg(long)]
    trace_frames: bool,

    /// Video width in pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Video height in pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Source pixel format (rgba, bgra, grey, i420, i422, i444, nv12, yuva420).
    #[arg(long, default_value = "i420", value_parser = parse_format)]
    format: PixelFormat,
}

fn parse_format(s: &str) -> Result<PixelFormat, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown pixel format {s:?}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        trace_frames: args.trace_frames,
        ..LoggingConfig::default()
    });

    let config = match &args.config {
        Some(path) => VoutConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => VoutConfig::default(),
    };

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut player = Player::new(args, config);
    event_loop
        .run_app(&mut player)
        .context("winit event loop terminated with error")?;

    player.error.map_or(Ok(()), Err)
}

// ── player ────────────────────────────────────────────────────────────────

struct Output {
    window: Arc<Window>,
    display: Display<WgpuBackend>,
    picture: Picture,
    subtitle: Subpicture,
    display_cfg: DisplayConfig,
}

struct Player {
    args: Args,
    config: VoutConfig,
    output: Option<Output>,
    started: Instant,
    frames: u64,
    error: Option<anyhow::Error>,
}

impl Player {
    fn new(args: Args, config: VoutConfig) -> Self {
        Self {
            args,
            config,
            output: None,
            started: Instant::now(),
            frames: 0,
            error: None,
        }
    }

    fn open(&self, event_loop: &ActiveEventLoop) -> Result<Output> {
        let attrs = Window::default_attributes()
            .with_title("prism")
            .with_inner_size(LogicalSize::new(self.args.width as f64, self.args.height as f64));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let size = window.inner_size();
        let surface = WgpuSurface::new(window.clone(), size.width, size.height);
        let options = WgpuOptions::default().with_adapter(self.config.gpu.clone());

        let mut source = VideoFormat::new(self.args.format, self.args.width, self.args.height);
        if source.chroma.is_yuv() {
            source.primaries = Primaries::Bt709;
            source.transfer = Transfer::Bt1886;
            source.space = ColorSystem::Bt709;
            source.chroma_location = ChromaLocation::Left;
        }

        let display_cfg = DisplayConfig {
            width: size.width,
            height: size.height,
            is_display_filled: true,
            ..DisplayConfig::default()
        };

        let (display, format) =
            Display::<WgpuBackend>::open(Some(surface), &options, &source, display_cfg, &self.config)?;
        if format.chroma != source.chroma {
            log::info!("source converted to {:?}", format.chroma);
        }

        Ok(Output {
            window,
            display,
            picture: Picture::new(format),
            subtitle: subtitle_bar(),
            display_cfg,
        })
    }

    fn redraw(&mut self) {
        let t = self.started.elapsed().as_secs_f32();
        let Some(out) = self.output.as_mut() else {
            return;
        };

        paint_pattern(&mut out.picture, t);
        let report = out.display.render(&out.picture, Some(&out.subtitle));
        if let FrameOutcome::Failed { stage, error } = &report.outcome {
            log::warn!("frame {} failed during {stage}: {error}", self.frames);
        }
        if report.submitted() {
            out.display.display();
        }

        self.frames += 1;
        if self.frames % 600 == 0 {
            log::debug!("{} frames, {:.1} fps", self.frames, self.frames as f32 / t.max(1e-3));
        }
        out.window.request_redraw();
    }

    fn key(&mut self, event_loop: &ActiveEventLoop, key: KeyCode) {
        if matches!(key, KeyCode::Escape | KeyCode::KeyQ) {
            self.close(event_loop);
            return;
        }
        let Some(out) = self.output.as_mut() else {
            return;
        };

        let request = match key {
            KeyCode::KeyF => {
                out.display_cfg.is_display_filled = !out.display_cfg.is_display_filled;
                ControlRequest::DisplayFilled(out.display_cfg.is_display_filled)
            }
            KeyCode::KeyZ => {
                let zoom = if out.display_cfg.zoom.num == 1 { 2 } else { 1 };
                out.display_cfg.zoom.num = zoom;
                ControlRequest::Zoom { num: zoom, den: 1 }
            }
            _ => return,
        };

        if let Err(e) = out.display.control(request) {
            log::warn!("{e}");
        }
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(out) = self.output.take() {
            out.display.close();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for Player {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.output.is_some() {
            return;
        }

        match self.open(event_loop) {
            Ok(out) => {
                out.window.request_redraw();
                self.output = Some(out);
            }
            Err(e) => {
                log::error!("failed to open video output: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(out) = self.output.as_mut() {
                    out.display_cfg.width = size.width;
                    out.display_cfg.height = size.height;
                    let request = ControlRequest::DisplaySize {
                        width: size.width,
                        height: size.height,
                    };
                    if let Err(e) = out.display.control(request) {
                        log::warn!("{e}");
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.key(event_loop, code),
            _ => {}
        }
    }
}

// ── synthetic content ─────────────────────────────────────────────────────

/// Fills every plane with a moving gradient, whatever the layout.
fn paint_pattern(picture: &mut Picture, t: f32) {
    let chroma = picture.format.chroma;
    let (width, height) = (picture.format.width, picture.format.height);
    let yuv = chroma.is_yuv();

    for (i, plane) in picture.planes.iter_mut().enumerate() {
        let Some(layout) = chroma.plane_layout(i) else {
            continue;
        };
        let (w, h) = layout.plane_size(width, height);
        let texel = layout.texel_bytes();
        let bytes = layout.component_bytes as usize;

        for y in 0..h.min(plane.lines) as usize {
            let start = y * plane.pitch;
            let Some(row) = plane.data.get_mut(start..start + w as usize * texel) else {
                break;
            };
            let v = y as f32 / h as f32;
            for x in 0..w as usize {
                let u = x as f32 / w as f32;
                for c in 0..layout.components as usize {
                    let value = pattern(layout.component_map[c], u, v, t, yuv);
                    let at = x * texel + c * bytes;
                    if bytes == 2 {
                        // 10 significant bits, little endian.
                        let wide = (value as u16) << 2;
                        row[at..at + 2].copy_from_slice(&wide.to_le_bytes());
                    } else {
                        row[at] = value;
                    }
                }
            }
        }
    }
}

fn pattern(channel: u8, u: f32, v: f32, t: f32, yuv: bool) -> u8 {
    let wave = |phase: f32| 0.5 + 0.5 * phase.sin();
    let level = match (yuv, channel) {
        (_, 3) => 1.0,
        (true, 0) => (16.0 + 219.0 * u) / 255.0,
        (true, 1) => (128.0 + 96.0 * (2.0 * wave(t + v * 6.3) - 1.0)) / 255.0,
        (true, 2) => (128.0 + 96.0 * (2.0 * wave(0.7 * t + u * 6.3) - 1.0)) / 255.0,
        (false, 0) => wave(t + u * 6.3),
        (false, 1) => wave(0.8 * t + v * 6.3),
        (false, _) => u * v,
        (true, _) => unreachable!("component_map channels are 0..=3"),
    };
    (level.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A translucent bar near the top-left corner of the picture.
fn subtitle_bar() -> Subpicture {
    let mut picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 320, 48));
    for plane in &mut picture.planes {
        for px in plane.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[20, 20, 20, 160]);
        }
    }

    Subpicture {
        regions: vec![SubpictureRegion {
            x: 32,
            y: 32,
            picture,
        }],
    }
}
