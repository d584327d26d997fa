use crate::coords::Rect2Df;

/// Clockwise rotation applied to the source before placement.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn quarter_turns(self) -> u8 {
        match self {
            Self::R0 => 0,
            Self::R90 => 1,
            Self::R180 => 2,
            Self::R270 => 3,
        }
    }

    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    /// Composes two rotations.
    pub fn rotate(self, by: Rotation) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + by.quarter_turns())
    }
}

/// Orientation tag carried by decoded frames (EXIF-style, eight values).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Normal,
    HFlipped,
    VFlipped,
    Rotated90,
    Rotated180,
    Rotated270,
    Transposed,
    AntiTransposed,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Self::Normal,
        Self::HFlipped,
        Self::VFlipped,
        Self::Rotated90,
        Self::Rotated180,
        Self::Rotated270,
        Self::Transposed,
        Self::AntiTransposed,
    ];

    /// Returns `true` when the displayed picture has width and height swapped.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Rotated90 | Self::Rotated270 | Self::Transposed | Self::AntiTransposed
        )
    }

    /// Applies the orientation to a source crop and rotation.
    ///
    /// Flips swap crop corners; rotations compose onto `rotation`. Transpose
    /// and anti-transpose are a quarter turn plus a vertical or horizontal
    /// corner swap respectively.
    pub fn apply(self, crop: &mut Rect2Df, rotation: &mut Rotation) {
        match self {
            Self::Normal => {}
            Self::HFlipped => crop.swap_x(),
            Self::VFlipped => crop.swap_y(),
            Self::Rotated90 => *rotation = rotation.rotate(Rotation::R90),
            Self::Rotated180 => *rotation = rotation.rotate(Rotation::R180),
            Self::Rotated270 => *rotation = rotation.rotate(Rotation::R270),
            Self::Transposed => {
                *rotation = rotation.rotate(Rotation::R90);
                crop.swap_y();
            }
            Self::AntiTransposed => {
                *rotation = rotation.rotate(Rotation::R90);
                crop.swap_x();
            }
        }
    }
}
