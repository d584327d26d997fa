//! Render parameter set.
//!
//! A flat snapshot of the backend's processing options, translated once from
//! [`VoutConfig`] when the display opens. Every optional processing stage is a
//! tagged `Option`: a disabled group is `None`, never a default-valued group
//! with an "enabled" flag.

mod scaler;

pub use scaler::{FilterConfig, FilterFunction, ScalerPreset};

use serde::{Deserialize, Serialize};

use crate::config::{ScalerConfig, VoutConfig};
use crate::format::{ColorRepr, ColorSpace, Light, Primaries, Transfer};

// ── groups ────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DebandParams {
    pub iterations: u32,
    pub threshold: f32,
    pub radius: f32,
    pub grain: f32,
}

impl DebandParams {
    pub const DEFAULT: Self = Self {
        iterations: 1,
        threshold: 4.0,
        radius: 16.0,
        grain: 6.0,
    };
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SigmoidParams {
    pub center: f32,
    pub slope: f32,
}

impl SigmoidParams {
    pub const DEFAULT: Self = Self {
        center: 0.75,
        slope: 6.5,
    };
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingIntent {
    Perceptual,
    #[default]
    RelativeColorimetric,
    Saturation,
    AbsoluteColorimetric,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMappingAlgorithm {
    Clip,
    Mobius,
    Reinhard,
    Hable,
    Gamma,
    Linear,
    #[default]
    Bt2390,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorMapParams {
    pub intent: RenderingIntent,
    pub tone_mapping: ToneMappingAlgorithm,
    /// Algorithm-specific tuning, 0 for the algorithm default.
    pub tone_mapping_param: f32,
    pub desaturation_strength: f32,
    pub desaturation_exponent: f32,
    pub desaturation_base: f32,
    pub max_boost: f32,
    pub gamut_clipping: bool,
    pub gamut_warning: bool,
}

impl ColorMapParams {
    pub const DEFAULT: Self = Self {
        intent: RenderingIntent::RelativeColorimetric,
        tone_mapping: ToneMappingAlgorithm::Bt2390,
        tone_mapping_param: 0.0,
        desaturation_strength: 0.9,
        desaturation_exponent: 0.2,
        desaturation_base: 0.18,
        max_boost: 1.0,
        gamut_clipping: false,
        gamut_warning: false,
    };
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherMode {
    #[default]
    Disabled,
    BlueNoise,
    OrderedLut,
    OrderedFixed,
    WhiteNoise,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DitherMethod {
    BlueNoise,
    OrderedLut,
    OrderedFixed,
    WhiteNoise,
}

impl DitherMode {
    pub fn method(self) -> Option<DitherMethod> {
        match self {
            Self::Disabled => None,
            Self::BlueNoise => Some(DitherMethod::BlueNoise),
            Self::OrderedLut => Some(DitherMethod::OrderedLut),
            Self::OrderedFixed => Some(DitherMethod::OrderedFixed),
            Self::WhiteNoise => Some(DitherMethod::WhiteNoise),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DitherParams {
    pub method: DitherMethod,
    /// Size of the dither matrix as a power of two.
    pub lut_size: u32,
    pub temporal: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PeakDetectParams {
    pub smoothing_period: f32,
    pub scene_threshold_low: f32,
    pub scene_threshold_high: f32,
}

impl PeakDetectParams {
    pub const DEFAULT: Self = Self {
        smoothing_period: 100.0,
        scene_threshold_low: 5.5,
        scene_threshold_high: 10.0,
    };
}

/// How a loaded lookup table is bound into a frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutMode {
    #[default]
    Disabled,
    /// Applied to native (encoded) values.
    Native,
    /// Applied to normalized RGB.
    Normalized,
    /// Replaces the color conversion.
    Conversion,
    /// Pre-conversion, attached to the source image.
    Decoding,
    /// Post-conversion, attached to the target frame.
    Encoding,
}

/// Table interpretation for render-parameter LUTs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LutType {
    Native,
    Normalized,
    Conversion,
}

/// Where a LUT ends up for a given [`LutMode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LutPlacement {
    None,
    Params(LutType),
    Source,
    Target,
}

impl LutMode {
    pub fn placement(self) -> LutPlacement {
        match self {
            Self::Disabled => LutPlacement::None,
            Self::Native => LutPlacement::Params(LutType::Native),
            Self::Normalized => LutPlacement::Params(LutType::Normalized),
            Self::Conversion => LutPlacement::Params(LutType::Conversion),
            Self::Decoding => LutPlacement::Source,
            Self::Encoding => LutPlacement::Target,
        }
    }
}

/// Target color overrides. Only explicitly set fields replace the value
/// reported by the swap-chain.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct TargetOverrides {
    pub primaries: Option<Primaries>,
    pub transfer: Option<Transfer>,
    pub sig_avg: Option<f32>,
    pub dither_depth: Option<u32>,
}

impl TargetOverrides {
    pub fn apply(&self, color: &mut ColorSpace, repr: &mut ColorRepr) {
        if let Some(primaries) = self.primaries {
            color.primaries = primaries;
        }
        if let Some(transfer) = self.transfer {
            color.transfer = transfer;
            // Re-inferred by the backend from the new transfer.
            color.light = Light::Unknown;
        }
        if let Some(avg) = self.sig_avg {
            color.sig_avg = avg;
        }
        if let Some(depth) = self.dither_depth {
            repr.bits = repr.bits.with_sample_depth(depth);
        }
    }
}

// ── parameter set ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RenderParameterSet {
    pub deband: Option<DebandParams>,
    pub sigmoid: Option<SigmoidParams>,
    pub color_map: ColorMapParams,
    pub dither: Option<DitherParams>,
    pub peak_detect: Option<PeakDetectParams>,
    /// Only ever `true` together with `peak_detect`.
    pub allow_delayed_peak_detect: bool,

    pub upscaler: Option<FilterConfig>,
    pub downscaler: Option<FilterConfig>,
    pub lut_entries: u32,
    pub antiringing_strength: f32,
    pub polar_cutoff: f32,
    pub skip_anti_aliasing: bool,
    pub disable_overlay_sampling: bool,
    pub disable_linear_scaling: bool,
    pub disable_builtin_scalers: bool,

    pub target: TargetOverrides,
    pub lut_mode: LutMode,
}

impl RenderParameterSet {
    pub fn from_config(cfg: &VoutConfig) -> Self {
        let deband = cfg.deband.enabled && (cfg.deband.iterations > 0 || cfg.deband.grain > 0.0);
        let deband = deband.then(|| DebandParams {
            iterations: cfg.deband.iterations,
            threshold: cfg.deband.threshold,
            radius: cfg.deband.radius,
            grain: cfg.deband.grain,
        });

        let sigmoid = cfg.scaling.sigmoid.then(|| SigmoidParams {
            center: cfg.scaling.sigmoid_center,
            slope: cfg.scaling.sigmoid_slope,
        });

        let tm = &cfg.tone_mapping;
        let color_map = ColorMapParams {
            intent: cfg.color.intent,
            tone_mapping: tm.algorithm,
            tone_mapping_param: tm.param,
            desaturation_strength: tm.desat_strength,
            desaturation_exponent: tm.desat_exponent,
            desaturation_base: tm.desat_base,
            max_boost: tm.max_boost,
            gamut_clipping: tm.gamut_clipping,
            gamut_warning: tm.gamut_warning,
        };

        let dither = cfg.dither.method.method().map(|method| DitherParams {
            method,
            lut_size: cfg.dither.lut_size,
            temporal: cfg.dither.temporal,
        });

        let pd = &cfg.peak_detect;
        let peak_detect = (pd.period > 0.0).then(|| PeakDetectParams {
            smoothing_period: pd.period,
            scene_threshold_low: pd.scene_threshold_low,
            scene_threshold_high: pd.scene_threshold_high,
        });
        let allow_delayed_peak_detect = peak_detect.is_some() && pd.delayed;

        let target = TargetOverrides {
            primaries: Some(cfg.color.target_primaries).filter(|p| *p != Primaries::Unknown),
            transfer: Some(cfg.color.target_transfer).filter(|t| *t != Transfer::Unknown),
            sig_avg: Some(cfg.color.target_avg).filter(|avg| *avg > 0.0),
            dither_depth: Some(cfg.dither.depth).filter(|d| *d > 0),
        };

        let t = &cfg.tweaks;
        Self {
            deband,
            sigmoid,
            color_map,
            dither,
            peak_detect,
            allow_delayed_peak_detect,
            upscaler: resolve_scaler("upscaler", &cfg.scaling.upscaler),
            downscaler: resolve_scaler("downscaler", &cfg.scaling.downscaler),
            lut_entries: cfg.scaling.lut_entries,
            antiringing_strength: cfg.scaling.antiringing,
            polar_cutoff: t.polar_cutoff,
            skip_anti_aliasing: t.skip_aa,
            disable_overlay_sampling: t.overlay_direct,
            disable_linear_scaling: t.disable_linear,
            disable_builtin_scalers: t.force_general,
            target,
            lut_mode: cfg.color.lut_mode,
        }
    }

    /// Names of the optional groups that are present, in a stable order.
    pub fn active_groups(&self) -> Vec<&'static str> {
        [
            ("deband", self.deband.is_some()),
            ("sigmoid", self.sigmoid.is_some()),
            ("dither", self.dither.is_some()),
            ("peak_detect", self.peak_detect.is_some()),
            ("upscaler", self.upscaler.is_some()),
            ("downscaler", self.downscaler.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

fn resolve_scaler(which: &str, cfg: &ScalerConfig) -> Option<FilterConfig> {
    if cfg.preset != ScalerPreset::Custom {
        return cfg.preset.filter();
    }

    if cfg.kernel == FilterFunction::None {
        log::warn!("custom {which} has no kernel, falling back to the built-in scaler");
        return None;
    }

    Some(FilterConfig {
        kernel: cfg.kernel,
        window: Some(cfg.window).filter(|w| *w != FilterFunction::None),
        radius: cfg.radius,
        clamp: cfg.clamp,
        blur: cfg.blur,
        taper: cfg.taper,
        polar: cfg.polar,
    })
}
