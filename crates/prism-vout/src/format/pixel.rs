use serde::{Deserialize, Serialize};

/// Pixel formats understood by the pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Packed 8-bit RGBA.
    Rgba,
    /// Packed 8-bit BGRA.
    Bgra,
    /// Single 8-bit grey channel.
    Grey,
    /// Planar 8-bit YUV 4:2:0.
    I420,
    /// Planar 8-bit YUV 4:2:2.
    I422,
    /// Planar 8-bit YUV 4:4:4.
    I444,
    /// 8-bit luma plane plus interleaved 4:2:0 chroma plane.
    Nv12,
    /// Planar 8-bit YUV 4:2:0 with a full resolution alpha plane.
    Yuva420,
    /// Planar 10-bit YUV 4:2:0 stored in 16-bit little-endian samples.
    I420P10,
}

/// Formats accepted for subtitle/OSD regions (packed, single plane).
pub const SUBPICTURE_FORMATS: &[PixelFormat] =
    &[PixelFormat::Rgba, PixelFormat::Bgra, PixelFormat::Grey];

/// Memory layout of one plane of a format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Number of components stored per texel.
    pub components: u8,
    /// Storage size of one component in bytes.
    pub component_bytes: u8,
    /// Logical channel of each stored component (0..=2 color, 3 alpha).
    pub component_map: [u8; 4],
    /// Horizontal subsampling as a power of two.
    pub log2_width: u8,
    /// Vertical subsampling as a power of two.
    pub log2_height: u8,
}

impl PlaneLayout {
    const fn packed(components: u8, map: [u8; 4]) -> Self {
        Self {
            components,
            component_bytes: 1,
            component_map: map,
            log2_width: 0,
            log2_height: 0,
        }
    }

    const fn single(channel: u8, bytes: u8, log2_width: u8, log2_height: u8) -> Self {
        Self {
            components: 1,
            component_bytes: bytes,
            component_map: [channel, 0, 0, 0],
            log2_width,
            log2_height,
        }
    }

    /// Bytes occupied by one texel of this plane.
    #[inline]
    pub fn texel_bytes(self) -> usize {
        self.components as usize * self.component_bytes as usize
    }

    /// Dimensions of this plane for a frame of `width x height` luma pixels.
    #[inline]
    pub fn plane_size(self, width: u32, height: u32) -> (u32, u32) {
        let w = (width + (1 << self.log2_width) - 1) >> self.log2_width;
        let h = (height + (1 << self.log2_height) - 1) >> self.log2_height;
        (w, h)
    }
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            Self::Rgba | Self::Bgra | Self::Grey => 1,
            Self::Nv12 => 2,
            Self::I420 | Self::I422 | Self::I444 | Self::I420P10 => 3,
            Self::Yuva420 => 4,
        }
    }

    /// Layout of plane `index`, or `None` past the last plane.
    pub fn plane_layout(self, index: usize) -> Option<PlaneLayout> {
        if index >= self.plane_count() {
            return None;
        }

        let layout = match (self, index) {
            (Self::Rgba, _) => PlaneLayout::packed(4, [0, 1, 2, 3]),
            (Self::Bgra, _) => PlaneLayout::packed(4, [2, 1, 0, 3]),
            (Self::Grey, _) => PlaneLayout::packed(1, [0, 0, 0, 0]),

            (Self::Nv12, 0) => PlaneLayout::single(0, 1, 0, 0),
            (Self::Nv12, _) => PlaneLayout {
                components: 2,
                component_bytes: 1,
                component_map: [1, 2, 0, 0],
                log2_width: 1,
                log2_height: 1,
            },

            (Self::I420P10, 0) => PlaneLayout::single(0, 2, 0, 0),
            (Self::I420P10, i) => PlaneLayout::single(i as u8, 2, 1, 1),

            (_, 0) => PlaneLayout::single(0, 1, 0, 0),
            (Self::Yuva420, 3) => PlaneLayout::single(3, 1, 0, 0),
            (fmt, i) => {
                let (lw, lh) = fmt.chroma_subsampling();
                PlaneLayout::single(i as u8, 1, lw, lh)
            }
        };

        Some(layout)
    }

    pub fn is_yuv(self) -> bool {
        !matches!(self, Self::Rgba | Self::Bgra | Self::Grey)
    }

    /// Chroma subsampling as powers of two `(horizontal, vertical)`.
    pub fn chroma_subsampling(self) -> (u8, u8) {
        match self {
            Self::I420 | Self::Nv12 | Self::Yuva420 | Self::I420P10 => (1, 1),
            Self::I422 => (1, 0),
            _ => (0, 0),
        }
    }

    pub fn is_subsampled(self) -> bool {
        self.chroma_subsampling() != (0, 0)
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba | Self::Bgra | Self::Yuva420)
    }

    /// Storage bits per component.
    pub fn sample_depth(self) -> u8 {
        match self {
            Self::I420P10 => 16,
            _ => 8,
        }
    }

    /// Significant bits per component.
    pub fn color_depth(self) -> u8 {
        match self {
            Self::I420P10 => 10,
            _ => 8,
        }
    }

    /// Formats an upstream converter can produce instead of `self`, in order
    /// of preference.
    pub fn fallbacks(self) -> &'static [PixelFormat] {
        use PixelFormat::*;
        match self {
            Rgba => &[Bgra],
            Bgra => &[Rgba],
            Grey => &[I420, Rgba],
            I420 => &[Nv12, I422, I444, Rgba],
            I422 => &[I444, I420, Rgba],
            I444 => &[I422, I420, Rgba],
            Nv12 => &[I420, Rgba],
            Yuva420 => &[I420, Rgba],
            I420P10 => &[I420, Nv12, Rgba],
        }
    }
}
