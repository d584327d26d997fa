//! Texture slots owned by the session.

use crate::backend::{Overlay, OverlayView};

/// One texture slot per picture plane.
pub(crate) struct PlaneTextures<T> {
    slots: [Option<T>; 4],
}

impl<T> PlaneTextures<T> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    #[inline]
    pub fn slot_mut(&mut self, plane: usize) -> &mut Option<T> {
        &mut self.slots[plane]
    }

    #[inline]
    pub fn get(&self, plane: usize) -> Option<&T> {
        self.slots.get(plane).and_then(Option::as_ref)
    }

    /// Takes every live texture out of the slots.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}

/// Overlay textures and placements, reused across frames.
///
/// Storage only grows; `count` is the number of overlays valid for the
/// current frame.
pub(crate) struct OverlayPool<T> {
    textures: Vec<Option<T>>,
    overlays: Vec<Overlay>,
    count: usize,
}

impl<T> OverlayPool<T> {
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            overlays: Vec::new(),
            count: 0,
        }
    }

    /// Number of slots backed by storage.
    pub fn capacity(&self) -> usize {
        self.textures.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    /// Grows storage to at least `n` slots and resets the logical count.
    ///
    /// New slots start without a texture so the first upload creates one.
    pub fn begin_frame(&mut self, n: usize) {
        if n > self.textures.len() {
            log::trace!("growing overlay pool {} -> {n}", self.textures.len());
            self.textures.resize_with(n, || None);
            self.overlays.resize(n, Overlay::default());
        }
        self.count = 0;
    }

    /// Texture slot for the next overlay, or `None` when storage is full.
    pub fn next_slot(&mut self) -> Option<&mut Option<T>> {
        self.textures.get_mut(self.count)
    }

    /// Commits the overlay whose texture was just uploaded to `next_slot`.
    pub fn push(&mut self, overlay: Overlay) {
        if let Some(slot) = self.overlays.get_mut(self.count) {
            *slot = overlay;
            self.count += 1;
        }
    }

    pub fn view(&self) -> OverlayView<'_, T> {
        OverlayView {
            overlays: &self.overlays[..self.count],
            textures: &self.textures[..self.count],
        }
    }

    /// Takes every live texture and releases the storage.
    pub fn drain(&mut self) -> Vec<T> {
        self.count = 0;
        self.overlays = Vec::new();
        std::mem::take(&mut self.textures)
            .into_iter()
            .flatten()
            .collect()
    }
}
