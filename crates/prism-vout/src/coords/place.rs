use super::{Rect2D, Rect2Df};

/// Destination of the picture on the display surface, in surface pixels.
///
/// `width`/`height` are signed: a negative height means the placement was
/// mirrored to match a surface that delivers vertically flipped frames.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Place {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Mirrors the placement inside a surface of `surface_height` rows.
    ///
    /// The y-coordinate becomes the distance from the bottom edge and the
    /// height is negated, so the normalized rectangle covers the mirrored
    /// area of the original one.
    #[inline]
    pub fn mirrored_vertically(self, surface_height: u32) -> Self {
        Self {
            x: self.x,
            y: surface_height as i32 - self.y,
            width: self.width,
            height: -self.height,
        }
    }

    #[inline]
    pub fn to_rect(self) -> Rect2D {
        Rect2D::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn to_crop(self) -> Rect2Df {
        self.to_rect().to_f32()
    }

    /// Returns `true` when the placement, once normalized, is exactly the
    /// `width x height` surface.
    #[inline]
    pub fn covers(self, width: u32, height: u32) -> bool {
        self.to_rect().normalized() == Rect2D::full(width, height)
    }
}
