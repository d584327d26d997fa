use serde::{Deserialize, Serialize};

/// Color primaries. `Unknown` lets the backend infer them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primaries {
    #[default]
    Unknown,
    Bt601_525,
    Bt601_625,
    Bt709,
    Bt470m,
    Ebu3213,
    Bt2020,
    Apple,
    Adobe,
    ProPhoto,
    Cie1931,
    DciP3,
    DisplayP3,
    VGamut,
    SGamut,
}

/// Transfer characteristic. `Unknown` lets the backend infer it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transfer {
    #[default]
    Unknown,
    Bt1886,
    Srgb,
    Linear,
    Gamma18,
    Gamma22,
    Gamma28,
    ProPhoto,
    Pq,
    Hlg,
    VLog,
    SLog1,
    SLog2,
}

impl Transfer {
    pub fn is_hdr(self) -> bool {
        matches!(self, Self::Pq | Self::Hlg | Self::VLog | Self::SLog1 | Self::SLog2)
    }
}

/// Light classification of the signal, derived from the transfer function.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Light {
    #[default]
    Unknown,
    Display,
    SceneHlg,
    Scene709_1886,
    Scene1_2,
}

/// Colorimetry of a source or target.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorSpace {
    pub primaries: Primaries,
    pub transfer: Transfer,
    pub light: Light,
    /// Peak signal level relative to SDR white, 0 when unknown.
    pub sig_peak: f32,
    /// Average signal level relative to SDR white, 0 when unknown.
    pub sig_avg: f32,
}

impl ColorSpace {
    pub const SRGB: Self = Self {
        primaries: Primaries::Bt709,
        transfer: Transfer::Srgb,
        light: Light::Display,
        sig_peak: 1.0,
        sig_avg: 0.0,
    };
}

/// YUV/RGB encoding system.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSystem {
    #[default]
    Unknown,
    Bt601,
    Bt709,
    Smpte240m,
    Bt2020Nc,
    Bt2020C,
    Rgb,
    Xyz,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Levels {
    #[default]
    Unknown,
    Limited,
    Full,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AlphaMode {
    #[default]
    Unknown,
    Independent,
    Premultiplied,
}

/// How color values are stored in each sample.
///
/// `color_depth <= sample_depth`; the ratio between them is preserved when a
/// target depth override is applied.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BitEncoding {
    pub sample_depth: u32,
    pub color_depth: u32,
    pub bit_shift: u32,
}

impl BitEncoding {
    pub const fn new(sample_depth: u32, color_depth: u32) -> Self {
        Self {
            sample_depth,
            color_depth,
            bit_shift: 0,
        }
    }

    /// Overrides the sample depth, scaling the color depth by the same ratio.
    ///
    /// The encoding itself (ratio between significant and stored bits) is
    /// unchanged. A zero sample depth carries no ratio and both depths are set.
    pub fn with_sample_depth(self, depth: u32) -> Self {
        if self.sample_depth == 0 {
            return Self {
                sample_depth: depth,
                color_depth: depth,
                bit_shift: self.bit_shift,
            };
        }
        let scale = self.color_depth as f32 / self.sample_depth as f32;
        Self {
            sample_depth: depth,
            color_depth: (scale * depth as f32) as u32,
            bit_shift: self.bit_shift,
        }
    }
}

/// Representation of the color values (system, range, alpha, bit layout).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorRepr {
    pub system: ColorSystem,
    pub levels: Levels,
    pub alpha: AlphaMode,
    pub bits: BitEncoding,
}

impl ColorRepr {
    pub const RGB8: Self = Self {
        system: ColorSystem::Rgb,
        levels: Levels::Full,
        alpha: AlphaMode::Premultiplied,
        bits: BitEncoding::new(8, 8),
    };
}
