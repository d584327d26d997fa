/// Floating-point rectangle given by two corners.
///
/// Used for source crops and destination crops. Corners are not required to be
/// ordered: `x1 < x0` mirrors horizontally, `y1 < y0` mirrors vertically.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect2Df {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect2Df {
    #[inline]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Signed width (`x1 - x0`).
    #[inline]
    pub fn width(self) -> f32 {
        self.x1 - self.x0
    }

    /// Signed height (`y1 - y0`).
    #[inline]
    pub fn height(self) -> f32 {
        self.y1 - self.y0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Swaps the horizontal corners (horizontal mirror).
    #[inline]
    pub fn swap_x(&mut self) {
        std::mem::swap(&mut self.x0, &mut self.x1);
    }

    /// Swaps the vertical corners (vertical mirror).
    #[inline]
    pub fn swap_y(&mut self) {
        std::mem::swap(&mut self.y0, &mut self.y1);
    }

    /// Orders the corners so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        Self::new(
            self.x0.min(self.x1),
            self.y0.min(self.y1),
            self.x0.max(self.x1),
            self.y0.max(self.y1),
        )
    }
}

/// Integer rectangle given by two corners.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Rect2D {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect2D {
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle covering a whole `width x height` surface.
    #[inline]
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub fn width(self) -> i32 {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(self) -> i32 {
        self.y1 - self.y0
    }

    /// Orders the corners so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        Self::new(
            self.x0.min(self.x1),
            self.y0.min(self.y1),
            self.x0.max(self.x1),
            self.y0.max(self.y1),
        )
    }

    #[inline]
    pub fn to_f32(self) -> Rect2Df {
        Rect2Df::new(self.x0 as f32, self.y0 as f32, self.x1 as f32, self.y1 as f32)
    }
}
