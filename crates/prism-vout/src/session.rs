//! GPU session: exclusive owner of the backend and every GPU object.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::GpuBackend;
use crate::error::{BackendError, VoutError, VoutResult};
use crate::resources::{ResourceCache, ResourceKind};
use crate::textures::{OverlayPool, PlaneTextures};

pub(crate) struct SessionState<B: GpuBackend> {
    pub renderer: Option<B::Renderer>,
    pub planes: PlaneTextures<B::Texture>,
    pub overlays: OverlayPool<B::Texture>,
    pub lut: ResourceCache<B::Lut>,
    pub hook: ResourceCache<B::Hook>,
    closed: bool,
    // Dropped last: everything above may reference backend memory.
    pub backend: B,
}

impl<B: GpuBackend> SessionState<B> {
    /// Releases every GPU object. The backend must be current.
    fn teardown(&mut self) {
        for texture in self.planes.drain() {
            self.backend.destroy_texture(texture);
        }
        for texture in self.overlays.drain() {
            self.backend.destroy_texture(texture);
        }
        if let Some(renderer) = self.renderer.take() {
            self.backend.destroy_renderer(renderer);
        }
        self.lut.clear();
        self.hook.clear();
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.backend.make_current() {
            Ok(()) => {
                self.teardown();
                self.backend.release_current();
            }
            Err(e) => {
                // Dropping the backend still frees its device.
                log::warn!("closing without a current backend: {e}");
            }
        }
        log::debug!("gpu session closed");
    }
}

pub(crate) struct Session<B: GpuBackend> {
    state: Mutex<SessionState<B>>,
}

impl<B: GpuBackend> Session<B> {
    /// Creates the backend and its renderer on `surface`.
    pub fn open(surface: Option<B::Surface>, options: &B::Options) -> VoutResult<Self> {
        let surface = surface.ok_or_else(|| VoutError::init("no display surface"))?;

        let mut backend = B::create(surface, options)
            .map_err(|e| VoutError::init(format!("creating backend: {e}")))?;

        backend
            .make_current()
            .map_err(|e| VoutError::init(format!("making backend current: {e}")))?;

        let renderer = backend.create_renderer();
        backend.release_current();
        let renderer = renderer.map_err(|e| VoutError::init(format!("creating renderer: {e}")))?;

        log::debug!("gpu session opened");

        Ok(Self {
            state: Mutex::new(SessionState {
                renderer: Some(renderer),
                planes: PlaneTextures::new(),
                overlays: OverlayPool::new(),
                lut: ResourceCache::new(ResourceKind::Lut),
                hook: ResourceCache::new(ResourceKind::Shader),
                closed: false,
                backend,
            }),
        })
    }

    /// Makes the backend current for the lifetime of the returned guard.
    ///
    /// Blocks while another thread holds the session.
    pub fn acquire(&self) -> Result<Current<'_, B>, BackendError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(BackendError::new("session is closed"));
        }
        state.backend.make_current()?;
        Ok(Current { state })
    }

    /// Releases all GPU objects. Safe to call more than once.
    pub fn close(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

impl<B: GpuBackend> Drop for Session<B> {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

/// Exclusive access to a current session. Dropping releases it.
pub(crate) struct Current<'a, B: GpuBackend> {
    state: MutexGuard<'a, SessionState<B>>,
}

impl<B: GpuBackend> Deref for Current<'_, B> {
    type Target = SessionState<B>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<B: GpuBackend> DerefMut for Current<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

impl<B: GpuBackend> Drop for Current<'_, B> {
    fn drop(&mut self) {
        self.state.backend.release_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend, MockConfig, MockSurface};
    use crate::format::{PixelFormat, Picture, VideoFormat};

    fn open(config: MockConfig) -> (VoutResult<Session<MockBackend>>, crate::backend::mock::MockHandle) {
        let (surface, handle) = MockSurface::new(config);
        (Session::open(Some(surface), &()), handle)
    }

    #[test]
    fn open_without_surface_fails() {
        let err = Session::<MockBackend>::open(None, &()).err().unwrap();
        assert!(matches!(err, VoutError::Init { .. }));
    }

    #[test]
    fn open_failures_are_init_errors() {
        for cfg in [
            MockConfig { fail_create: true, ..Default::default() },
            MockConfig { fail_make_current: true, ..Default::default() },
            MockConfig { fail_renderer: true, ..Default::default() },
        ] {
            let (res, handle) = open(cfg);
            assert!(matches!(res.err().unwrap(), VoutError::Init { .. }));
            assert!(!handle.state().current);
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let (session, handle) = open(MockConfig::default());
        let session = session.unwrap();
        {
            let _cur = session.acquire().unwrap();
            assert!(handle.state().current);
        }
        assert!(!handle.state().current);
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn fails_midway(session: &Session<MockBackend>) -> Result<(), BackendError> {
            let _cur = session.acquire()?;
            Err(BackendError::new("bail"))
        }

        let (session, handle) = open(MockConfig::default());
        let session = session.unwrap();
        assert!(fails_midway(&session).is_err());
        assert!(!handle.state().current);
    }

    #[test]
    fn acquire_failure_is_recoverable() {
        let (session, handle) = open(MockConfig::default());
        let session = session.unwrap();
        handle.configure(|c| c.fail_make_current = true);
        assert!(session.acquire().is_err());
        handle.configure(|c| c.fail_make_current = false);
        assert!(session.acquire().is_ok());
    }

    #[test]
    fn close_destroys_everything_once() {
        let (session, handle) = open(MockConfig::default());
        let session = session.unwrap();
        {
            let mut cur = session.acquire().unwrap();
            let pic = Picture::new(VideoFormat::new(PixelFormat::I420, 16, 16));
            let state = &mut *cur;
            for i in 0..3 {
                let data = pic.plane_data(i).unwrap();
                state.backend.upload_plane(state.planes.slot_mut(i), &data).unwrap();
            }
            state.overlays.begin_frame(2);
            let slot = state.overlays.next_slot().unwrap();
            state.backend.upload_plane(slot, &pic.plane_data(0).unwrap()).unwrap();
        }
        assert_eq!(handle.state().live_textures.len(), 4);

        session.close();
        session.close();
        drop(session);

        assert!(handle.state().live_textures.is_empty());
        assert_eq!(handle.count(|c| *c == Call::DestroyRenderer), 1);
        assert!(!handle.state().current);
    }

    #[test]
    fn acquire_after_close_fails() {
        let (session, _handle) = open(MockConfig::default());
        let session = session.unwrap();
        session.close();
        assert!(session.acquire().is_err());
    }
}
