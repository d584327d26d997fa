use std::sync::Once;

use log::LevelFilter;

/// Graphics stack modules that flood `info` with per-frame noise.
const QUIET_MODULES: &[&str] = &["wgpu_core", "wgpu_hal", "naga"];

/// Logger configuration for binaries embedding the video output.
///
/// `env_filter` takes `env_logger` filter syntax (`"prism_vout=debug"`) and
/// wins over `RUST_LOG`. Without either, `default_level` applies and the
/// graphics stack is capped at `warn`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: LevelFilter,
    /// Per-frame diagnostics (skipped stages, overlay pool growth).
    pub trace_frames: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: LevelFilter::Info,
            trace_frames: false,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Resolves the effective filter string, consulting `RUST_LOG` only when
    /// no explicit filter was given.
    fn filter(&self, from_env: Option<String>) -> String {
        let mut filter = match self.env_filter.clone().or(from_env) {
            Some(explicit) => explicit,
            None => {
                let mut directives = vec![self.default_level.to_string().to_lowercase()];
                directives.extend(QUIET_MODULES.iter().map(|m| format!("{m}=warn")));
                directives.join(",")
            }
        };
        if self.trace_frames {
            filter.push_str(",prism_vout::compositor=trace,prism_vout::textures=trace");
        }
        filter
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger. Only the first call has an
/// effect; a logger already installed by the host is left alone.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = config.filter(std::env::var("RUST_LOG").ok());
        let installed = env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .try_init()
            .is_ok();

        if installed {
            log::debug!("logger installed with filter {filter:?}");
        }
    });
}
