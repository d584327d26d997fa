use crate::coords::Rect2Df;

use super::{
    AlphaMode, BitEncoding, ChromaLocation, ColorRepr, ColorSpace, ColorSystem, Levels, Light,
    Orientation, PixelFormat, Primaries, Transfer,
};

/// Description of a video stream's frames.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFormat {
    pub chroma: PixelFormat,

    /// Allocated size in luma pixels.
    pub width: u32,
    pub height: u32,

    /// Visible region inside the allocated size.
    pub x_offset: u32,
    pub y_offset: u32,
    pub visible_width: u32,
    pub visible_height: u32,

    /// Sample aspect ratio.
    pub sar_num: u32,
    pub sar_den: u32,

    pub orientation: Orientation,

    pub primaries: Primaries,
    pub transfer: Transfer,
    pub space: ColorSystem,
    pub full_range: bool,
    pub chroma_location: ChromaLocation,
}

impl VideoFormat {
    /// Fully visible frame with square samples and unknown colorimetry.
    pub fn new(chroma: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            chroma,
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            visible_width: width,
            visible_height: height,
            sar_num: 1,
            sar_den: 1,
            orientation: Orientation::Normal,
            primaries: Primaries::Unknown,
            transfer: Transfer::Unknown,
            space: ColorSystem::Unknown,
            full_range: !chroma.is_yuv(),
            chroma_location: ChromaLocation::Unknown,
        }
    }

    pub fn with_visible(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.x_offset = x;
        self.y_offset = y;
        self.visible_width = width;
        self.visible_height = height;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Visible region as a crop rectangle in frame pixels.
    pub fn visible_rect(&self) -> Rect2Df {
        Rect2Df::new(
            self.x_offset as f32,
            self.y_offset as f32,
            self.x_offset.saturating_add(self.visible_width) as f32,
            self.y_offset.saturating_add(self.visible_height) as f32,
        )
    }

    /// Format as seen after the orientation is applied: visible dimensions
    /// and sample aspect are swapped for quarter-turn orientations.
    pub fn oriented(&self) -> Self {
        let mut out = self.clone();
        if self.orientation.swaps_dimensions() {
            std::mem::swap(&mut out.width, &mut out.height);
            std::mem::swap(&mut out.x_offset, &mut out.y_offset);
            std::mem::swap(&mut out.visible_width, &mut out.visible_height);
            std::mem::swap(&mut out.sar_num, &mut out.sar_den);
        }
        out.orientation = Orientation::Normal;
        out
    }

    pub fn color_space(&self) -> ColorSpace {
        let light = match self.transfer {
            Transfer::Hlg => Light::SceneHlg,
            Transfer::Unknown => Light::Unknown,
            _ => Light::Display,
        };
        ColorSpace {
            primaries: self.primaries,
            transfer: self.transfer,
            light,
            sig_peak: 0.0,
            sig_avg: 0.0,
        }
    }

    pub fn color_repr(&self) -> ColorRepr {
        let system = if !self.chroma.is_yuv() {
            ColorSystem::Rgb
        } else if self.space != ColorSystem::Unknown {
            self.space
        } else if self.visible_height > 576 {
            ColorSystem::Bt709
        } else {
            ColorSystem::Bt601
        };

        let levels = if self.full_range {
            Levels::Full
        } else {
            Levels::Limited
        };

        let alpha = if self.chroma.has_alpha() {
            AlphaMode::Independent
        } else {
            AlphaMode::Unknown
        };

        ColorRepr {
            system,
            levels,
            alpha,
            bits: BitEncoding::new(
                self.chroma.sample_depth() as u32,
                self.chroma.color_depth() as u32,
            ),
        }
    }
}

/// CPU memory of one plane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaneBuffer {
    /// Bytes per row.
    pub pitch: usize,
    /// Number of rows.
    pub lines: u32,
    pub data: Vec<u8>,
}

/// A decoded frame: format plus one buffer per plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub format: VideoFormat,
    pub planes: Vec<PlaneBuffer>,
}

/// Borrowed view of one plane, ready for upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlaneData<'a> {
    /// Size in texels.
    pub width: u32,
    pub height: u32,
    /// Bytes between the start of consecutive rows.
    pub row_stride: usize,
    pub components: u8,
    pub component_bytes: u8,
    pub component_map: [u8; 4],
    pub pixels: &'a [u8],
}

impl PlaneData<'_> {
    #[inline]
    pub fn texel_bytes(&self) -> usize {
        self.components as usize * self.component_bytes as usize
    }

    /// Minimum number of bytes `pixels` must hold for the described plane.
    pub fn required_len(&self) -> usize {
        if self.height == 0 {
            return 0;
        }
        self.row_stride * (self.height as usize - 1) + self.width as usize * self.texel_bytes()
    }
}

impl Picture {
    /// Allocates zeroed planes for `format`.
    pub fn new(format: VideoFormat) -> Self {
        let planes = (0..format.chroma.plane_count())
            .filter_map(|i| format.chroma.plane_layout(i))
            .map(|layout| {
                let (w, h) = layout.plane_size(format.width, format.height);
                let pitch = w as usize * layout.texel_bytes();
                PlaneBuffer {
                    pitch,
                    lines: h,
                    data: vec![0; pitch * h as usize],
                }
            })
            .collect();

        Self { format, planes }
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Upload description of plane `index`.
    ///
    /// Returns `None` when the plane does not exist for the format or its
    /// buffer is too small for the format's dimensions.
    pub fn plane_data(&self, index: usize) -> Option<PlaneData<'_>> {
        let layout = self.format.chroma.plane_layout(index)?;
        let buffer = self.planes.get(index)?;
        let (width, height) = layout.plane_size(self.format.width, self.format.height);

        let data = PlaneData {
            width,
            height: height.min(buffer.lines),
            row_stride: buffer.pitch,
            components: layout.components,
            component_bytes: layout.component_bytes,
            component_map: layout.component_map,
            pixels: &buffer.data,
        };

        if buffer.pitch < width as usize * data.texel_bytes() || buffer.data.len() < data.required_len() {
            return None;
        }

        Some(data)
    }
}

/// One positioned subtitle/OSD image.
#[derive(Debug, Clone, PartialEq)]
pub struct SubpictureRegion {
    /// Offset of the region inside the placed picture.
    pub x: i32,
    pub y: i32,
    /// Single-plane image; its visible size is the region size.
    pub picture: Picture,
}

impl SubpictureRegion {
    pub fn visible_size(&self) -> (u32, u32) {
        (
            self.picture.format.visible_width,
            self.picture.format.visible_height,
        )
    }
}

/// Overlay attached to a frame, drawn in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subpicture {
    pub regions: Vec<SubpictureRegion>,
}
