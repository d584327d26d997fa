//! Recording backend for tests.
//!
//! Every call is appended to a shared log that the test keeps through a
//! [`MockHandle`]. Failure knobs in [`MockConfig`] drive the error paths.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{GpuBackend, RenderParams, SourceImage, SwapchainFrame, TargetFrame};
use crate::coords::Rect2Df;
use crate::error::BackendError;
use crate::format::{ColorRepr, ColorSpace, PixelFormat, PlaneData, Rotation};
use crate::params::LutType;

#[derive(Debug, Clone)]
pub(crate) struct MockConfig {
    pub fail_create: bool,
    pub fail_make_current: bool,
    pub fail_renderer: bool,
    /// Zero-based index of the upload call (counted since creation) to fail.
    pub fail_upload_at: Option<usize>,
    pub fail_render: bool,
    pub fail_submit: bool,
    pub fail_parse: bool,
    pub not_ready: bool,
    pub flipped: bool,
    pub frame_size: (u32, u32),
    /// Size reported by `resize` regardless of the request.
    pub resize_to: Option<(u32, u32)>,
    pub unsupported: Vec<PixelFormat>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_create: false,
            fail_make_current: false,
            fail_renderer: false,
            fail_upload_at: None,
            fail_render: false,
            fail_submit: false,
            fail_parse: false,
            not_ready: false,
            flipped: false,
            frame_size: (640, 480),
            resize_to: None,
            unsupported: Vec::new(),
        }
    }
}

/// What the renderer saw in one `render_image` call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderSnapshot {
    pub planes: usize,
    pub shifts: Vec<(f32, f32)>,
    pub crop: Rect2Df,
    pub rotation: Rotation,
    pub target_crop: Rect2Df,
    pub target_color: ColorSpace,
    pub target_repr: ColorRepr,
    pub overlays: Vec<Rect2Df>,
    pub source_lut: Option<Vec<u8>>,
    pub target_lut: Option<Vec<u8>>,
    pub params_lut: Option<(Vec<u8>, LutType)>,
    pub hook: Option<Vec<u8>>,
    pub active_groups: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Create,
    MakeCurrent,
    ReleaseCurrent,
    CreateRenderer,
    DestroyRenderer,
    Upload { texture: u32, created: bool },
    DestroyTexture(u32),
    StartFrame,
    Clear([f32; 4]),
    Render(Box<RenderSnapshot>),
    Submit,
    Swap,
    Resize(u32, u32),
    ParseLut,
    ParseHook,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub config: MockConfig,
    pub calls: Vec<Call>,
    pub current: bool,
    pub live_textures: BTreeSet<u32>,
    uploads: usize,
    next_texture: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn configure(&self, f: impl FnOnce(&mut MockConfig)) {
        f(&mut self.state().config);
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn renders(&self) -> Vec<RenderSnapshot> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Render(snap) => Some((**snap).clone()),
                _ => None,
            })
            .collect()
    }
}

pub(crate) struct MockSurface(MockHandle);

impl MockSurface {
    pub fn new(config: MockConfig) -> (Self, MockHandle) {
        let handle = MockHandle(Arc::new(Mutex::new(MockState {
            config,
            ..Default::default()
        })));
        (Self(handle.clone()), handle)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MockTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub texel_bytes: usize,
}

pub(crate) struct MockRenderer;

pub(crate) struct MockBackend {
    handle: MockHandle,
}

impl MockBackend {
    fn log(&self, call: Call) {
        self.handle.state().calls.push(call);
    }

    fn config(&self) -> MockConfig {
        self.handle.state().config.clone()
    }
}

impl GpuBackend for MockBackend {
    type Surface = MockSurface;
    type Options = ();
    type Texture = MockTexture;
    type Renderer = MockRenderer;
    type Lut = Vec<u8>;
    type Hook = Vec<u8>;

    fn create(surface: MockSurface, _options: &()) -> Result<Self, BackendError> {
        let handle = surface.0;
        handle.state().calls.push(Call::Create);
        if handle.state().config.fail_create {
            return Err(BackendError::new("mock create failure"));
        }
        Ok(Self { handle })
    }

    fn make_current(&mut self) -> Result<(), BackendError> {
        self.log(Call::MakeCurrent);
        let mut st = self.handle.state();
        if st.config.fail_make_current {
            return Err(BackendError::new("mock make current failure"));
        }
        assert!(!st.current, "make_current while already current");
        st.current = true;
        Ok(())
    }

    fn release_current(&mut self) {
        self.log(Call::ReleaseCurrent);
        self.handle.state().current = false;
    }

    fn supports_format(&self, format: PixelFormat) -> bool {
        !self.handle.state().config.unsupported.contains(&format)
    }

    fn create_renderer(&mut self) -> Result<MockRenderer, BackendError> {
        self.log(Call::CreateRenderer);
        if self.config().fail_renderer {
            return Err(BackendError::new("mock renderer failure"));
        }
        Ok(MockRenderer)
    }

    fn destroy_renderer(&mut self, _renderer: MockRenderer) {
        self.log(Call::DestroyRenderer);
    }

    fn upload_plane(
        &mut self,
        slot: &mut Option<MockTexture>,
        data: &PlaneData<'_>,
    ) -> Result<(), BackendError> {
        let mut st = self.handle.state();
        assert!(st.current, "upload while not current");
        let index = st.uploads;
        st.uploads += 1;
        if st.config.fail_upload_at == Some(index) {
            return Err(BackendError::new(format!("mock upload {index} failure")));
        }

        let reusable = slot.as_ref().is_some_and(|t| {
            t.width == data.width && t.height == data.height && t.texel_bytes == data.texel_bytes()
        });
        let created = !reusable;
        if created {
            if let Some(old) = slot.take() {
                st.live_textures.remove(&old.id);
                st.calls.push(Call::DestroyTexture(old.id));
            }
            let id = st.next_texture;
            st.next_texture += 1;
            st.live_textures.insert(id);
            *slot = Some(MockTexture {
                id,
                width: data.width,
                height: data.height,
                texel_bytes: data.texel_bytes(),
            });
        }

        let texture = slot.as_ref().map_or(0, |t| t.id);
        st.calls.push(Call::Upload { texture, created });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: MockTexture) {
        let mut st = self.handle.state();
        assert!(st.current, "destroy while not current");
        st.live_textures.remove(&texture.id);
        st.calls.push(Call::DestroyTexture(texture.id));
    }

    fn start_frame(&mut self) -> Option<SwapchainFrame> {
        self.log(Call::StartFrame);
        let cfg = self.config();
        if cfg.not_ready {
            return None;
        }
        Some(SwapchainFrame {
            width: cfg.frame_size.0,
            height: cfg.frame_size.1,
            flipped: cfg.flipped,
            color: ColorSpace::SRGB,
            repr: ColorRepr::RGB8,
        })
    }

    fn clear_frame(&mut self, rgba: [f32; 4]) {
        self.log(Call::Clear(rgba));
    }

    fn render_image(
        &mut self,
        _renderer: &mut MockRenderer,
        image: &SourceImage<'_, MockTexture, Vec<u8>>,
        target: &TargetFrame<'_, MockTexture, Vec<u8>>,
        params: &RenderParams<'_, Vec<u8>, Vec<u8>>,
    ) -> Result<(), BackendError> {
        let snapshot = RenderSnapshot {
            planes: image.plane_count(),
            shifts: image.planes().map(|p| (p.shift_x, p.shift_y)).collect(),
            crop: image.crop,
            rotation: image.rotation,
            target_crop: target.crop,
            target_color: target.color,
            target_repr: target.repr,
            overlays: target.overlays.iter().map(|(o, _)| o.rect).collect(),
            source_lut: image.lut.cloned(),
            target_lut: target.lut.cloned(),
            params_lut: params.lut.as_ref().map(|b| (b.lut.clone(), b.kind)),
            hook: params.hook.cloned(),
            active_groups: params.set.active_groups(),
        };
        self.log(Call::Render(Box::new(snapshot)));

        if self.config().fail_render {
            return Err(BackendError::new("mock render failure"));
        }
        Ok(())
    }

    fn submit_frame(&mut self) -> Result<(), BackendError> {
        self.log(Call::Submit);
        if self.config().fail_submit {
            return Err(BackendError::new("mock submit failure"));
        }
        Ok(())
    }

    fn swap_buffers(&mut self) {
        self.log(Call::Swap);
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(u32, u32), BackendError> {
        self.log(Call::Resize(width, height));
        let mut st = self.handle.state();
        let size = st.config.resize_to.unwrap_or((width, height));
        st.config.frame_size = size;
        Ok(size)
    }

    fn parse_lut(&mut self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        self.log(Call::ParseLut);
        if self.config().fail_parse {
            return Err(BackendError::new("mock lut parse failure"));
        }
        Ok(data.to_vec())
    }

    fn parse_hook(&mut self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        self.log(Call::ParseHook);
        if self.config().fail_parse {
            return Err(BackendError::new("mock hook parse failure"));
        }
        Ok(data.to_vec())
    }
}
