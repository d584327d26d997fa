//! User-facing video output configuration.
//!
//! Every group is `#[serde(default)]` so a JSON file only needs the fields it
//! changes. [`VoutConfig::clamped`] brings out-of-range values back into their
//! documented ranges.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VoutResult;
use crate::format::{Primaries, Transfer};
use crate::params::{
    ColorMapParams, DebandParams, DitherMode, FilterFunction, LutMode, PeakDetectParams,
    RenderingIntent, ScalerPreset, SigmoidParams, ToneMappingAlgorithm,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoutConfig {
    /// Substring of the adapter name to prefer. Empty picks the default.
    pub gpu: String,

    /// Path to a custom shader (`//!HOOK` format). Empty disables it.
    pub user_shader: String,

    pub scaling: ScalingConfig,
    pub deband: DebandConfig,
    pub color: ColorConfig,
    pub tone_mapping: ToneMappingConfig,
    pub peak_detect: PeakDetectConfig,
    pub dither: DitherConfig,
    pub tweaks: TweakConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub upscaler: ScalerConfig,
    pub downscaler: ScalerConfig,

    /// Entries of the scaler weight tables (16..=256).
    pub lut_entries: u32,
    /// Anti-ringing strength (0..=1).
    pub antiringing: f32,

    pub sigmoid: bool,
    pub sigmoid_center: f32,
    pub sigmoid_slope: f32,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            upscaler: ScalerConfig::default(),
            downscaler: ScalerConfig::default(),
            lut_entries: 64,
            antiringing: 0.0,
            sigmoid: true,
            sigmoid_center: SigmoidParams::DEFAULT.center,
            sigmoid_slope: SigmoidParams::DEFAULT.slope,
        }
    }
}

/// One scaler: a named preset, or the custom fields when the preset is
/// `custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub preset: ScalerPreset,
    pub kernel: FilterFunction,
    pub window: FilterFunction,
    pub radius: f32,
    pub clamp: f32,
    pub blur: f32,
    pub taper: f32,
    pub polar: bool,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            preset: ScalerPreset::Builtin,
            kernel: FilterFunction::Box,
            window: FilterFunction::None,
            radius: 0.0,
            clamp: 0.0,
            blur: 0.0,
            taper: 0.0,
            polar: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebandConfig {
    pub enabled: bool,
    pub iterations: u32,
    pub threshold: f32,
    pub radius: f32,
    pub grain: f32,
}

impl Default for DebandConfig {
    fn default() -> Self {
        let d = DebandParams::DEFAULT;
        Self {
            enabled: false,
            iterations: d.iterations,
            threshold: d.threshold,
            radius: d.radius,
            grain: d.grain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub intent: RenderingIntent,
    /// Target primaries override; `unknown` keeps the display's.
    pub target_primaries: Primaries,
    /// Target transfer override; `unknown` keeps the display's.
    pub target_transfer: Transfer,
    /// Target average signal level (0.25 by default); 0 keeps the
    /// display's.
    pub target_avg: f32,

    /// Path to a `.cube` lookup table. Empty disables it.
    pub lut_file: String,
    pub lut_mode: LutMode,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            intent: RenderingIntent::default(),
            target_primaries: Primaries::Unknown,
            target_transfer: Transfer::Unknown,
            target_avg: 0.25,
            lut_file: String::new(),
            lut_mode: LutMode::Disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingConfig {
    pub algorithm: ToneMappingAlgorithm,
    pub param: f32,
    pub desat_strength: f32,
    pub desat_exponent: f32,
    pub desat_base: f32,
    pub max_boost: f32,
    pub gamut_clipping: bool,
    pub gamut_warning: bool,
}

impl Default for ToneMappingConfig {
    fn default() -> Self {
        let c = ColorMapParams::DEFAULT;
        Self {
            algorithm: c.tone_mapping,
            param: c.tone_mapping_param,
            desat_strength: c.desaturation_strength,
            desat_exponent: c.desaturation_exponent,
            desat_base: c.desaturation_base,
            max_boost: c.max_boost,
            gamut_clipping: c.gamut_clipping,
            gamut_warning: c.gamut_warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectConfig {
    /// Smoothing period in frames. 0 disables peak detection.
    pub period: f32,
    pub scene_threshold_low: f32,
    pub scene_threshold_high: f32,
    /// Allow one frame of delay in the detected peak.
    pub delayed: bool,
}

impl Default for PeakDetectConfig {
    fn default() -> Self {
        let p = PeakDetectParams::DEFAULT;
        Self {
            period: p.smoothing_period,
            scene_threshold_low: p.scene_threshold_low,
            scene_threshold_high: p.scene_threshold_high,
            delayed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DitherConfig {
    pub method: DitherMode,
    /// Dither matrix size as a power of two (1..=8).
    pub lut_size: u32,
    pub temporal: bool,
    /// Target depth override in bits, 0 keeps the display's (0..=16).
    pub depth: u32,
}

impl Default for DitherConfig {
    fn default() -> Self {
        Self {
            method: DitherMode::Disabled,
            lut_size: 6,
            temporal: false,
            depth: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweakConfig {
    pub skip_aa: bool,
    /// Cutoff for polar filter weights (0..=1).
    pub polar_cutoff: f32,
    pub overlay_direct: bool,
    pub disable_linear: bool,
    pub force_general: bool,
}

impl Default for TweakConfig {
    fn default() -> Self {
        Self {
            skip_aa: false,
            polar_cutoff: 0.001,
            overlay_direct: false,
            disable_linear: false,
            force_general: false,
        }
    }
}

impl VoutConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> VoutResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_json(&text)?;
        log::debug!("loaded video output config from {}", path.display());
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> VoutResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns a copy with every ranged option clamped into its range.
    pub fn clamped(mut self) -> Self {
        let s = &mut self.scaling;
        clamp_u32("scaling.lut_entries", &mut s.lut_entries, 16, 256);
        clamp_f32("scaling.antiringing", &mut s.antiringing, 0.0, 1.0);
        clamp_f32("scaling.sigmoid_center", &mut s.sigmoid_center, 0.0, 1.0);
        clamp_f32("scaling.sigmoid_slope", &mut s.sigmoid_slope, 1.0, 20.0);
        for (name, sc) in [("upscaler", &mut s.upscaler), ("downscaler", &mut s.downscaler)] {
            clamp_f32(name, &mut sc.clamp, 0.0, 1.0);
            clamp_f32(name, &mut sc.blur, 0.0, 100.0);
            clamp_f32(name, &mut sc.taper, 0.0, 10.0);
            clamp_f32(name, &mut sc.radius, 0.0, 16.0);
        }

        let d = &mut self.deband;
        clamp_u32("deband.iterations", &mut d.iterations, 0, 16);
        clamp_f32("deband.threshold", &mut d.threshold, 0.0, 1000.0);
        clamp_f32("deband.radius", &mut d.radius, 0.0, 1000.0);
        clamp_f32("deband.grain", &mut d.grain, 0.0, 1000.0);

        clamp_f32("color.target_avg", &mut self.color.target_avg, 0.0, 1.0);

        let t = &mut self.tone_mapping;
        clamp_f32("tone_mapping.param", &mut t.param, 0.0, 10.0);
        clamp_f32("tone_mapping.desat_strength", &mut t.desat_strength, 0.0, 1.0);
        clamp_f32("tone_mapping.desat_exponent", &mut t.desat_exponent, 0.0, 10.0);
        clamp_f32("tone_mapping.desat_base", &mut t.desat_base, 0.0, 10.0);
        clamp_f32("tone_mapping.max_boost", &mut t.max_boost, 1.0, 10.0);

        let p = &mut self.peak_detect;
        clamp_f32("peak_detect.period", &mut p.period, 0.0, 1000.0);
        clamp_f32("peak_detect.scene_threshold_low", &mut p.scene_threshold_low, 0.0, 100.0);
        clamp_f32("peak_detect.scene_threshold_high", &mut p.scene_threshold_high, 0.0, 100.0);

        clamp_u32("dither.lut_size", &mut self.dither.lut_size, 1, 8);
        clamp_u32("dither.depth", &mut self.dither.depth, 0, 16);

        clamp_f32("tweaks.polar_cutoff", &mut self.tweaks.polar_cutoff, 0.0, 1.0);

        self
    }
}

fn clamp_u32(name: &str, value: &mut u32, min: u32, max: u32) {
    let clamped = (*value).clamp(min, max);
    if clamped != *value {
        log::warn!("{name} = {value} out of range [{min}, {max}], using {clamped}");
        *value = clamped;
    }
}

fn clamp_f32(name: &str, value: &mut f32, min: f32, max: f32) {
    let clamped = if value.is_nan() { min } else { value.clamp(min, max) };
    if clamped != *value {
        log::warn!("{name} = {value} out of range [{min}, {max}], using {clamped}");
        *value = clamped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let cfg = VoutConfig::from_json("{}").unwrap();
        assert_eq!(cfg, VoutConfig::default());
        assert_eq!(cfg.dither.method, DitherMode::Disabled);
        assert_eq!(cfg.deband.iterations, DebandParams::DEFAULT.iterations);
        assert_eq!(cfg.scaling.lut_entries, 64);
        assert_eq!(cfg.tweaks.polar_cutoff, 0.001);
    }

    #[test]
    fn partial_groups_keep_other_defaults() {
        let cfg = VoutConfig::from_json(
            r#"{
                "scaling": { "upscaler": { "preset": "ewa_lanczos" } },
                "dither": { "method": "blue_noise", "depth": 8 },
                "color": { "lut_mode": "encoding", "target_transfer": "pq" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.scaling.upscaler.preset, ScalerPreset::EwaLanczos);
        assert_eq!(cfg.scaling.downscaler.preset, ScalerPreset::Builtin);
        assert!(cfg.scaling.sigmoid);
        assert_eq!(cfg.dither.method, DitherMode::BlueNoise);
        assert_eq!(cfg.dither.lut_size, 6);
        assert_eq!(cfg.dither.depth, 8);
        assert_eq!(cfg.color.lut_mode, LutMode::Encoding);
        assert_eq!(cfg.color.target_transfer, Transfer::Pq);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let err = VoutConfig::from_json(r#"{ "dither": { "method": "sparkle" } }"#);
        assert!(matches!(err, Err(crate::VoutError::Json(_))));
    }

    #[test]
    fn clamping_pulls_values_into_range() {
        let mut cfg = VoutConfig::default();
        cfg.scaling.lut_entries = 4;
        cfg.scaling.antiringing = 3.0;
        cfg.tweaks.polar_cutoff = -1.0;
        cfg.dither.depth = 64;
        cfg.tone_mapping.max_boost = f32::NAN;
        cfg.scaling.upscaler.taper = 5.0;
        cfg.scaling.downscaler.taper = 12.0;

        let cfg = cfg.clamped();
        assert_eq!(cfg.scaling.lut_entries, 16);
        assert_eq!(cfg.scaling.antiringing, 1.0);
        assert_eq!(cfg.tweaks.polar_cutoff, 0.0);
        assert_eq!(cfg.dither.depth, 16);
        assert_eq!(cfg.tone_mapping.max_boost, 1.0);
        assert_eq!(cfg.scaling.upscaler.taper, 5.0);
        assert_eq!(cfg.scaling.downscaler.taper, 10.0);
    }

    #[test]
    fn defaults_survive_clamping() {
        assert_eq!(VoutConfig::default().clamped(), VoutConfig::default());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = VoutConfig::load("/nonexistent/prism/vout.json");
        assert!(matches!(err, Err(crate::VoutError::Io(_))));
    }
}
