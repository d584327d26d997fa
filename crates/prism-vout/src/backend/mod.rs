//! Rendering backend abstraction.
//!
//! The pipeline never touches GPU objects directly. Everything goes through
//! [`GpuBackend`], whose implementations own the device, the swap-chain and
//! the shading code. The descriptors in this module are what a frame looks
//! like from the backend's point of view: a source image made of plane
//! textures, a target frame with overlays, and the render parameters.

#[cfg(test)]
pub(crate) mod mock;
pub mod wgpu;

use crate::coords::Rect2Df;
use crate::error::BackendError;
use crate::format::{ColorRepr, ColorSpace, PixelFormat, PlaneData, Rotation};
use crate::params::{LutType, RenderParameterSet};

/// Swap-chain image acquired for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SwapchainFrame {
    pub width: u32,
    pub height: u32,
    /// The surface delivers frames upside down (bottom-left origin).
    pub flipped: bool,
    pub color: ColorSpace,
    pub repr: ColorRepr,
}

/// One uploaded plane of the source image.
#[derive(Debug)]
pub struct ImagePlane<'a, T> {
    pub texture: &'a T,
    pub components: u8,
    pub component_map: [u8; 4],
    /// Chroma siting correction in plane texels.
    pub shift_x: f32,
    pub shift_y: f32,
}

/// The decoded frame as handed to the renderer.
#[derive(Debug)]
pub struct SourceImage<'a, T, L> {
    pub planes: [Option<ImagePlane<'a, T>>; 4],
    pub color: ColorSpace,
    pub repr: ColorRepr,
    /// Source region in frame pixels. Swapped corners mean a flip.
    pub crop: Rect2Df,
    pub rotation: Rotation,
    /// Pre-conversion lookup table.
    pub lut: Option<&'a L>,
}

impl<'a, T, L> SourceImage<'a, T, L> {
    pub fn planes(&self) -> impl Iterator<Item = &ImagePlane<'a, T>> {
        self.planes.iter().flatten()
    }

    pub fn plane_count(&self) -> usize {
        self.planes().count()
    }
}

/// Placement and colorimetry of one overlay region.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Destination on the target surface.
    pub rect: Rect2Df,
    pub color: ColorSpace,
    pub repr: ColorRepr,
}

/// Overlays of the current frame, paired with their textures.
#[derive(Debug)]
pub struct OverlayView<'a, T> {
    pub(crate) overlays: &'a [Overlay],
    pub(crate) textures: &'a [Option<T>],
}

impl<'a, T> OverlayView<'a, T> {
    pub fn empty() -> Self {
        Self {
            overlays: &[],
            textures: &[],
        }
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a Overlay, &'a T)> {
        let textures = self.textures;
        self.overlays
            .iter()
            .zip(textures.iter())
            .filter_map(|(o, t)| t.as_ref().map(|t| (o, t)))
    }
}

/// The swap-chain image as a render target.
#[derive(Debug)]
pub struct TargetFrame<'a, T, L> {
    /// Placement of the image on the surface. Negative height on flipped
    /// surfaces.
    pub crop: Rect2Df,
    pub color: ColorSpace,
    pub repr: ColorRepr,
    pub overlays: OverlayView<'a, T>,
    /// Post-conversion lookup table.
    pub lut: Option<&'a L>,
}

/// A lookup table bound into the render parameters.
#[derive(Debug)]
pub struct LutBinding<'a, L> {
    pub lut: &'a L,
    pub kind: LutType,
}

/// Parameters of one render call.
#[derive(Debug)]
pub struct RenderParams<'a, L, H> {
    pub set: &'a RenderParameterSet,
    pub lut: Option<LutBinding<'a, L>>,
    pub hook: Option<&'a H>,
}

/// A GPU rendering backend.
///
/// All methods except `create` are only called while the backend is current
/// (between `make_current` and `release_current`) on the calling thread.
pub trait GpuBackend: Send + Sized {
    /// Native display surface the backend presents to.
    type Surface;
    /// Backend-specific creation options.
    type Options;

    type Texture: Send;
    type Renderer: Send;
    type Lut: Send;
    type Hook: Send;

    fn create(surface: Self::Surface, options: &Self::Options) -> Result<Self, BackendError>;

    fn make_current(&mut self) -> Result<(), BackendError>;
    fn release_current(&mut self);

    /// Returns `true` when frames of `format` can be uploaded as is.
    fn supports_format(&self, format: PixelFormat) -> bool;

    fn create_renderer(&mut self) -> Result<Self::Renderer, BackendError>;
    fn destroy_renderer(&mut self, renderer: Self::Renderer);

    /// Uploads one plane into `slot`, creating or recreating the texture when
    /// the slot is empty or its size/format does not match.
    fn upload_plane(
        &mut self,
        slot: &mut Option<Self::Texture>,
        data: &PlaneData<'_>,
    ) -> Result<(), BackendError>;
    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Acquires the next swap-chain image. `None` means "not ready": the
    /// caller skips the frame.
    fn start_frame(&mut self) -> Option<SwapchainFrame>;
    /// Clears the whole acquired image.
    fn clear_frame(&mut self, rgba: [f32; 4]);
    fn render_image(
        &mut self,
        renderer: &mut Self::Renderer,
        image: &SourceImage<'_, Self::Texture, Self::Lut>,
        target: &TargetFrame<'_, Self::Texture, Self::Lut>,
        params: &RenderParams<'_, Self::Lut, Self::Hook>,
    ) -> Result<(), BackendError>;
    /// Finishes the acquired image. The image is presented by `swap_buffers`.
    fn submit_frame(&mut self) -> Result<(), BackendError>;
    fn swap_buffers(&mut self);

    /// Resizes the swap-chain, returning the size actually achieved.
    fn resize(&mut self, width: u32, height: u32) -> Result<(u32, u32), BackendError>;

    fn parse_lut(&mut self, data: &[u8]) -> Result<Self::Lut, BackendError>;
    fn parse_hook(&mut self, data: &[u8]) -> Result<Self::Hook, BackendError>;
}
