use serde::{Deserialize, Serialize};

/// Filter functions usable as scaler kernel or window.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterFunction {
    /// No function. As a kernel this disables the filter.
    None,
    #[default]
    Box,
    Triangle,
    Hann,
    Hamming,
    Welch,
    Kaiser,
    Blackman,
    Gaussian,
    Sinc,
    Jinc,
    Sphinx,
    Bcspline,
    CatmullRom,
    Mitchell,
    Robidoux,
    RobidouxSharp,
    Bicubic,
    Spline16,
    Spline36,
    Spline64,
}

/// Complete scaler description handed to the backend.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterConfig {
    pub kernel: FilterFunction,
    pub window: Option<FilterFunction>,
    /// Kernel radius, 0 for the kernel's natural radius.
    pub radius: f32,
    /// Negative lobe clamping, 0..=1.
    pub clamp: f32,
    /// Kernel stretch factor, 0 means 1.
    pub blur: f32,
    /// Flat center region width.
    pub taper: f32,
    /// Elliptic weighted average (2D) filter.
    pub polar: bool,
}

impl FilterConfig {
    const fn separable(kernel: FilterFunction) -> Self {
        Self {
            kernel,
            window: None,
            radius: 0.0,
            clamp: 0.0,
            blur: 0.0,
            taper: 0.0,
            polar: false,
        }
    }

    const fn windowed(kernel: FilterFunction, window: FilterFunction, radius: f32) -> Self {
        Self {
            window: Some(window),
            radius,
            ..Self::separable(kernel)
        }
    }

    const fn polar(self) -> Self {
        Self {
            polar: true,
            ..self
        }
    }
}

/// Named scaler presets.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerPreset {
    /// The backend's built-in bilinear sampling.
    #[default]
    Builtin,
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    Mitchell,
    CatmullRom,
    Spline16,
    Spline36,
    Spline64,
    Lanczos,
    EwaLanczos,
    EwaJinc,
    EwaGinseng,
    EwaHann,
    Robidoux,
    RobidouxSharp,
    EwaRobidoux,
    EwaRobidouxSharp,
    /// Built from the custom kernel options.
    Custom,
}

/// EWA Lanczos uses the third zero of the jinc function as radius.
const JINC_R3: f32 = 3.238_315_5;

impl ScalerPreset {
    /// Filter for a named preset.
    ///
    /// `Builtin` yields `None` (no filter group); `Custom` also yields `None`
    /// here and is resolved from options by the parameter set.
    pub fn filter(self) -> Option<FilterConfig> {
        use FilterFunction as F;
        let cfg = match self {
            Self::Builtin | Self::Custom => return None,
            Self::Nearest => FilterConfig {
                radius: 0.5,
                ..FilterConfig::separable(F::Box)
            },
            Self::Bilinear => FilterConfig::separable(F::Triangle),
            Self::Bicubic => FilterConfig::separable(F::Bicubic),
            Self::Gaussian => FilterConfig::separable(F::Gaussian),
            Self::Mitchell => FilterConfig::separable(F::Mitchell),
            Self::CatmullRom => FilterConfig::separable(F::CatmullRom),
            Self::Spline16 => FilterConfig::separable(F::Spline16),
            Self::Spline36 => FilterConfig::separable(F::Spline36),
            Self::Spline64 => FilterConfig::separable(F::Spline64),
            Self::Lanczos => FilterConfig::windowed(F::Sinc, F::Sinc, 3.0),
            Self::EwaLanczos => FilterConfig::windowed(F::Jinc, F::Jinc, JINC_R3).polar(),
            Self::EwaJinc => FilterConfig::separable(F::Jinc).polar(),
            Self::EwaGinseng => FilterConfig::windowed(F::Jinc, F::Sinc, JINC_R3).polar(),
            Self::EwaHann => FilterConfig::windowed(F::Jinc, F::Hann, JINC_R3).polar(),
            Self::Robidoux => FilterConfig::separable(F::Robidoux),
            Self::RobidouxSharp => FilterConfig::separable(F::RobidouxSharp),
            Self::EwaRobidoux => FilterConfig::separable(F::Robidoux).polar(),
            Self::EwaRobidouxSharp => FilterConfig::separable(F::RobidouxSharp).polar(),
        };
        Some(cfg)
    }
}
