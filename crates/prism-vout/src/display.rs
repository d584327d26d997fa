//! Public video output entry points.

use std::sync::{Mutex, PoisonError};

use crate::backend::GpuBackend;
use crate::compositor::{self, FrameInput, FrameOutcome, FrameReport};
use crate::config::VoutConfig;
use crate::control::{ControlRequest, Geometry};
use crate::error::{VoutError, VoutResult};
use crate::format::{ChromaLocation, PixelFormat, Picture, SUBPICTURE_FORMATS, Subpicture, VideoFormat};
use crate::params::RenderParameterSet;
use crate::resources::LoadOutcome;
use crate::session::Session;

/// A rational number, used for aspect ratios and zoom.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ratio {
    pub num: u32,
    pub den: u32,
}

impl Ratio {
    pub const ONE: Self = Self { num: 1, den: 1 };

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::ONE
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
}

/// Display surface geometry and user placement preferences.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Surface size in pixels.
    pub width: u32,
    pub height: u32,
    /// Sample aspect ratio of the display's pixels.
    pub sar: Ratio,
    /// Scale the picture to the surface instead of its natural size.
    pub is_display_filled: bool,
    pub zoom: Ratio,
    pub align: Alignment,
}

/// A video output bound to one display surface.
///
/// All methods take `&self`; GPU work is serialized on the session lock and
/// geometry changes may come from any thread.
pub struct Display<B: GpuBackend> {
    session: Session<B>,
    geometry: Mutex<Geometry>,
    params: RenderParameterSet,
    format: VideoFormat,
}

impl<B: GpuBackend> Display<B> {
    /// Opens the output on `surface` for frames of `source`.
    ///
    /// Returns the display together with the format frames must be delivered
    /// in, which may differ from `source` when the backend cannot take it.
    pub fn open(
        surface: Option<B::Surface>,
        options: &B::Options,
        source: &VideoFormat,
        display: DisplayConfig,
        config: &VoutConfig,
    ) -> VoutResult<(Self, VideoFormat)> {
        let config = config.clone().clamped();
        let session = Session::<B>::open(surface, options)?;

        let format = {
            let cur = session
                .acquire()
                .map_err(|e| VoutError::init(format!("making backend current: {e}")))?;
            negotiate_format(source, |f| cur.backend.supports_format(f))
        };

        let params = RenderParameterSet::from_config(&config);
        log::debug!("active render groups: {:?}", params.active_groups());

        let this = Self {
            session,
            geometry: Mutex::new(Geometry {
                source: format.clone(),
                display,
            }),
            params,
            format: format.clone(),
        };

        // Resource failures are not fatal at open.
        if let Err(e) = this.set_lut_file(&config.color.lut_file) {
            log::error!("{e}");
        }
        if let Err(e) = this.set_user_shader(&config.user_shader) {
            log::error!("{e}");
        }

        log::info!(
            "video output opened: {:?} {}x{}",
            format.chroma,
            format.visible_width,
            format.visible_height
        );
        Ok((this, format))
    }

    /// Format negotiated at open.
    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    pub fn params(&self) -> &RenderParameterSet {
        &self.params
    }

    /// Subtitle/OSD region formats accepted by [`Display::render`].
    pub fn subpicture_formats(&self) -> &'static [PixelFormat] {
        SUBPICTURE_FORMATS
    }

    /// Renders `picture` and `subpicture` into the next swap-chain image and
    /// submits it. Errors are contained in the returned report.
    pub fn render(&self, picture: &Picture, subpicture: Option<&Subpicture>) -> FrameReport {
        let geometry = self.geometry().clone();

        let mut cur = match self.session.acquire() {
            Ok(cur) => cur,
            Err(e) => {
                log::error!("cannot render, backend not current: {e}");
                return FrameReport::new(FrameOutcome::Skipped);
            }
        };

        compositor::render_frame(
            &mut cur,
            &self.params,
            &FrameInput {
                picture,
                subpicture,
                source: &geometry.source,
                display: &geometry.display,
            },
        )
    }

    /// Presents the last submitted image.
    pub fn display(&self) {
        match self.session.acquire() {
            Ok(mut cur) => cur.backend.swap_buffers(),
            Err(e) => log::error!("cannot present, backend not current: {e}"),
        }
    }

    /// Handles a geometry change notification.
    pub fn control(&self, request: ControlRequest) -> VoutResult<()> {
        let resize = self.geometry().apply(request)?;

        if let Some((width, height)) = resize {
            match self.session.acquire() {
                Ok(mut cur) => match cur.backend.resize(width, height) {
                    Ok(actual) if actual != (width, height) => {
                        log::debug!(
                            "swap-chain resized to {}x{} instead of {width}x{height}",
                            actual.0,
                            actual.1
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log::debug!("swap-chain resize failed: {e}"),
                },
                Err(e) => log::debug!("skipping swap-chain resize: {e}"),
            }
        }
        Ok(())
    }

    /// Loads the lookup table at `path`; an empty path unloads it.
    pub fn set_lut_file(&self, path: &str) -> VoutResult<LoadOutcome> {
        let mut cur = self
            .session
            .acquire()
            .map_err(|e| VoutError::ResourceLoad {
                kind: "lookup table",
                path: path.into(),
                message: e.message,
            })?;
        let state = &mut *cur;
        let backend = &mut state.backend;
        state.lut.load(path, |bytes| backend.parse_lut(bytes))
    }

    /// Loads the custom shader at `path`; an empty path unloads it.
    pub fn set_user_shader(&self, path: &str) -> VoutResult<LoadOutcome> {
        let mut cur = self
            .session
            .acquire()
            .map_err(|e| VoutError::ResourceLoad {
                kind: "custom shader",
                path: path.into(),
                message: e.message,
            })?;
        let state = &mut *cur;
        let backend = &mut state.backend;
        state.hook.load(path, |bytes| backend.parse_hook(bytes))
    }

    /// Releases every GPU resource. Dropping the display does the same.
    pub fn close(self) {
        self.session.close();
        log::info!("video output closed");
    }

    fn geometry(&self) -> std::sync::MutexGuard<'_, Geometry> {
        self.geometry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Picks the format frames are delivered in: `source` when supported, else
/// the first supported fallback, else RGBA.
fn negotiate_format(source: &VideoFormat, supported: impl Fn(PixelFormat) -> bool) -> VideoFormat {
    let chroma = std::iter::once(source.chroma)
        .chain(source.chroma.fallbacks().iter().copied())
        .find(|f| supported(*f))
        .unwrap_or_else(|| {
            log::warn!("no supported format for {:?}, falling back to RGBA", source.chroma);
            PixelFormat::Rgba
        });

    if chroma != source.chroma {
        log::debug!("converting {:?} to {chroma:?}", source.chroma);
    }

    let mut format = source.clone();
    format.chroma = chroma;
    if !chroma.is_yuv() {
        format.chroma_location = ChromaLocation::Unknown;
        format.full_range = true;
    }
    format
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend, MockConfig, MockHandle, MockSurface};
    use crate::params::DitherMode;

    fn open_with(
        mock: MockConfig,
        source: &VideoFormat,
        config: &VoutConfig,
    ) -> (Display<MockBackend>, VideoFormat, MockHandle) {
        let (surface, handle) = MockSurface::new(mock);
        let display = DisplayConfig {
            width: 640,
            height: 480,
            is_display_filled: true,
            ..DisplayConfig::default()
        };
        let (d, fmt) = Display::open(Some(surface), &(), source, display, config).unwrap();
        handle.clear_calls();
        (d, fmt, handle)
    }

    fn temp_file(name: &str, contents: &str) -> String {
        let dir = std::env::temp_dir().join(format!("prism-vout-display-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn display_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<Display<MockBackend>>();
    }

    #[test]
    fn open_without_surface_is_init_error() {
        let src = VideoFormat::new(PixelFormat::I420, 64, 64);
        let res = Display::<MockBackend>::open(
            None,
            &(),
            &src,
            DisplayConfig::default(),
            &VoutConfig::default(),
        );
        assert!(matches!(res.err().unwrap(), VoutError::Init { .. }));
    }

    #[test]
    fn format_negotiation_walks_fallbacks() {
        let src = VideoFormat::new(PixelFormat::I420P10, 64, 64);
        let mock = MockConfig {
            unsupported: vec![PixelFormat::I420P10, PixelFormat::I420],
            ..Default::default()
        };
        let (_d, fmt, _h) = open_with(mock, &src, &VoutConfig::default());
        assert_eq!(fmt.chroma, PixelFormat::Nv12);
    }

    #[test]
    fn format_negotiation_falls_back_to_rgba() {
        let mut src = VideoFormat::new(PixelFormat::Nv12, 64, 64);
        src.chroma_location = ChromaLocation::Left;
        let fmt = negotiate_format(&src, |f| f == PixelFormat::Rgba || f == PixelFormat::Bgra);
        assert_eq!(fmt.chroma, PixelFormat::Rgba);
        assert_eq!(fmt.chroma_location, ChromaLocation::Unknown);

        let fmt = negotiate_format(&src, |_| false);
        assert_eq!(fmt.chroma, PixelFormat::Rgba);

        let kept = negotiate_format(&src, |_| true);
        assert_eq!(kept.chroma_location, ChromaLocation::Left);
    }

    #[test]
    fn render_then_display() {
        let src = VideoFormat::new(PixelFormat::Rgba, 640, 480);
        let mut cfg = VoutConfig::default();
        cfg.scaling.sigmoid = false;
        cfg.peak_detect.period = 0.0;
        cfg.dither.method = DitherMode::Disabled;
        let (d, fmt, handle) = open_with(MockConfig::default(), &src, &cfg);

        let report = d.render(&Picture::new(fmt), None);
        assert!(report.is_rendered());
        d.display();

        let calls = handle.calls();
        let submit = calls.iter().position(|c| *c == Call::Submit).unwrap();
        let swap = calls.iter().position(|c| *c == Call::Swap).unwrap();
        assert!(submit < swap);
        assert!(!handle.state().current);
    }

    #[test]
    fn render_without_current_backend_skips_frame() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let (d, fmt, handle) = open_with(MockConfig::default(), &src, &VoutConfig::default());
        handle.clear_calls();
        handle.configure(|c| c.fail_make_current = true);
        let report = d.render(&Picture::new(fmt), None);
        assert!(matches!(report.outcome, FrameOutcome::Skipped));
        assert_eq!(report.failed_stage(), None);
        assert!(report.submit.is_none());
        assert!(handle.calls().iter().all(|c| !matches!(
            c,
            Call::StartFrame | Call::Clear(_) | Call::Submit
        )));
    }

    #[test]
    fn display_size_resizes_eagerly() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let (d, _fmt, handle) = open_with(
            MockConfig {
                resize_to: Some((799, 600)),
                ..Default::default()
            },
            &src,
            &VoutConfig::default(),
        );
        d.control(ControlRequest::DisplaySize { width: 800, height: 600 })
            .unwrap();
        assert!(handle.calls().contains(&Call::Resize(800, 600)));
        assert_eq!(d.geometry().display.width, 800);
    }

    #[test]
    fn display_size_succeeds_without_current_backend() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let (d, _fmt, handle) = open_with(MockConfig::default(), &src, &VoutConfig::default());
        handle.configure(|c| c.fail_make_current = true);
        assert!(d.control(ControlRequest::DisplaySize { width: 10, height: 10 }).is_ok());
        assert_eq!(d.geometry().display.height, 10);
    }

    #[test]
    fn geometry_requests_do_not_touch_the_backend() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let (d, _fmt, handle) = open_with(MockConfig::default(), &src, &VoutConfig::default());
        d.control(ControlRequest::Zoom { num: 2, den: 1 }).unwrap();
        d.control(ControlRequest::DisplayFilled(false)).unwrap();
        assert!(handle.calls().is_empty());

        let err = d.control(ControlRequest::ResetPictures).unwrap_err();
        assert!(matches!(err, VoutError::UnsupportedRequest { .. }));
    }

    #[test]
    fn source_crop_changes_next_frame() {
        let src = VideoFormat::new(PixelFormat::Rgba, 640, 480);
        let (d, fmt, handle) = open_with(MockConfig::default(), &src, &VoutConfig::default());
        d.control(ControlRequest::SourceCrop { x: 0, y: 0, width: 320, height: 240 })
            .unwrap();
        d.render(&Picture::new(fmt), None);
        let snap = &handle.renders()[0];
        assert_eq!(snap.crop.x1, 320.0);
        assert_eq!(snap.target_crop.x1, 640.0);
    }

    #[test]
    fn lut_reload_is_path_keyed() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let path = temp_file("display.cube", "LUT_3D_SIZE 2");
        let mut cfg = VoutConfig::default();
        cfg.color.lut_file = path.clone();
        let (d, _fmt, handle) = open_with(MockConfig::default(), &src, &cfg);

        assert_eq!(d.set_lut_file(&path).unwrap(), LoadOutcome::Unchanged);
        assert_eq!(handle.count(|c| *c == Call::ParseLut), 0);
        assert_eq!(d.set_lut_file("").unwrap(), LoadOutcome::Cleared);
    }

    #[test]
    fn failed_lut_reload_keeps_previous_table() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let first = temp_file("keep-first.cube", "LUT_3D_SIZE 2");
        let second = temp_file("keep-second.cube", "LUT_3D_SIZE 3");
        let mut cfg = VoutConfig::default();
        cfg.color.lut_file = first.clone();
        cfg.color.lut_mode = crate::params::LutMode::Decoding;
        let (d, fmt, handle) = open_with(MockConfig::default(), &src, &cfg);

        handle.configure(|c| c.fail_parse = true);
        let err = d.set_lut_file(&second).unwrap_err();
        assert!(matches!(err, VoutError::ResourceLoad { kind: "lookup table", .. }));
        assert_eq!(handle.count(|c| *c == Call::ParseLut), 1);

        d.render(&Picture::new(fmt), None);
        let snap = &handle.renders()[0];
        assert_eq!(snap.source_lut.as_deref(), Some(b"LUT_3D_SIZE 2".as_slice()));

        // The kept table is still keyed by its own path.
        assert_eq!(d.set_lut_file(&first).unwrap(), LoadOutcome::Unchanged);
    }

    #[test]
    fn failed_shader_at_open_is_not_fatal() {
        let src = VideoFormat::new(PixelFormat::Rgba, 64, 64);
        let mut cfg = VoutConfig::default();
        cfg.user_shader = "/nonexistent/prism/shader.hook".into();
        let (d, _fmt, _handle) = open_with(MockConfig::default(), &src, &cfg);

        let hook = temp_file("display.hook", "//!HOOK MAIN");
        assert_eq!(d.set_user_shader(&hook).unwrap(), LoadOutcome::Loaded);
    }

    #[test]
    fn close_releases_gpu_objects() {
        let src = VideoFormat::new(PixelFormat::I420, 64, 64);
        let (d, fmt, handle) = open_with(MockConfig::default(), &src, &VoutConfig::default());
        d.render(&Picture::new(fmt), None);
        assert_eq!(handle.state().live_textures.len(), 3);
        d.close();
        assert!(handle.state().live_textures.is_empty());
        assert_eq!(handle.count(|c| *c == Call::DestroyRenderer), 1);
    }
}
