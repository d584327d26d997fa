use serde::{Deserialize, Serialize};

/// Siting of subsampled chroma samples relative to the luma grid.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaLocation {
    #[default]
    Unknown,
    /// MPEG-2/4, H.264 default.
    Left,
    /// MPEG-1, JPEG.
    Center,
    TopLeft,
    Top,
    BottomLeft,
    Bottom,
}

impl ChromaLocation {
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Sub-pixel offset of the chroma samples, in plane coordinates.
    ///
    /// Unknown and center siting need no correction.
    pub fn offset(self) -> (f32, f32) {
        let x = match self {
            Self::Left | Self::TopLeft | Self::BottomLeft => -0.5,
            _ => 0.0,
        };
        let y = match self {
            Self::TopLeft | Self::Top => -0.5,
            Self::BottomLeft | Self::Bottom => 0.5,
            _ => 0.0,
        };
        (x, y)
    }
}
