//! Display geometry change notifications.

use std::fmt;

use crate::display::{DisplayConfig, Ratio};
use crate::error::{VoutError, VoutResult};
use crate::format::VideoFormat;

/// A request from the windowing side or the user.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ControlRequest {
    /// The display surface was resized.
    DisplaySize { width: u32, height: u32 },
    /// Fill the display, or keep the picture's natural size.
    DisplayFilled(bool),
    /// New source sample aspect ratio.
    SourceAspect { num: u32, den: u32 },
    /// New visible region of the source.
    SourceCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Zoom { num: u32, den: u32 },
    /// Drop and reallocate the picture pool.
    ResetPictures,
    /// 360° viewpoint change.
    Viewpoint {
        yaw: f32,
        pitch: f32,
        roll: f32,
        fov: f32,
    },
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplaySize { width, height } => write!(f, "display size {width}x{height}"),
            Self::DisplayFilled(filled) => write!(f, "display filled {filled}"),
            Self::SourceAspect { num, den } => write!(f, "source aspect {num}:{den}"),
            Self::SourceCrop {
                x,
                y,
                width,
                height,
            } => write!(f, "source crop {width}x{height}+{x}+{y}"),
            Self::Zoom { num, den } => write!(f, "zoom {num}/{den}"),
            Self::ResetPictures => f.write_str("reset pictures"),
            Self::Viewpoint { .. } => f.write_str("viewpoint"),
        }
    }
}

/// Shared display geometry, updated by control requests and read once per
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Geometry {
    pub source: VideoFormat,
    pub display: DisplayConfig,
}

impl Geometry {
    /// Applies a geometry request.
    ///
    /// Returns the new surface size when the swap-chain must be resized.
    /// Unsupported requests leave the geometry untouched.
    pub fn apply(&mut self, request: ControlRequest) -> VoutResult<Option<(u32, u32)>> {
        match request {
            ControlRequest::DisplaySize { width, height } => {
                self.display.width = width;
                self.display.height = height;
                return Ok(Some((width, height)));
            }
            ControlRequest::DisplayFilled(filled) => self.display.is_display_filled = filled,
            ControlRequest::SourceAspect { num, den } => {
                // Zero terms are treated as 1 by placement.
                self.source.sar_num = num;
                self.source.sar_den = den;
            }
            ControlRequest::SourceCrop {
                x,
                y,
                width,
                height,
            } => {
                let fits = |offset: u32, len: u32, total: u32| {
                    len > 0 && offset.checked_add(len).is_some_and(|end| end <= total)
                };
                if !fits(x, width, self.source.width) || !fits(y, height, self.source.height) {
                    return Err(VoutError::config(format!(
                        "{request} outside {}x{} frame",
                        self.source.width, self.source.height
                    )));
                }
                self.source = self.source.clone().with_visible(x, y, width, height);
            }
            ControlRequest::Zoom { num, den } => self.display.zoom = Ratio::new(num, den),
            ControlRequest::ResetPictures | ControlRequest::Viewpoint { .. } => {
                return Err(VoutError::unsupported(request.to_string()));
            }
        }
        Ok(None)
    }
}
