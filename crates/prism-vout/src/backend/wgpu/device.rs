use anyhow::{Context, Result};

/// Creation options of the wgpu backend.
///
/// Keep this structure minimal. Add flags only when a concrete platform or
/// backend requirement exists.
#[derive(Debug, Clone)]
pub struct WgpuOptions {
    /// Case-insensitive substring of the preferred adapter's name. Empty
    /// accepts any adapter.
    pub adapter_name: String,

    /// Prefer an sRGB surface format.
    ///
    /// Video samples are already gamma encoded, so the default is a plain
    /// UNORM surface that stores them as is.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior). FIFO is broadly supported and paces
    /// presentation to the display.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference. Falls back to a supported mode.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for the surface. A hint only.
    pub desired_maximum_frame_latency: u32,
}

impl Default for WgpuOptions {
    fn default() -> Self {
        Self {
            adapter_name: String::new(),
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

impl WgpuOptions {
    /// Options derived from the `gpu` entry of the video output config.
    pub fn with_adapter(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = name.into();
        self
    }
}

/// Picks an adapter able to present to `surface`, preferring one whose name
/// contains `wanted`.
pub(super) async fn request_adapter(
    instance: &wgpu::Instance,
    surface: &wgpu::Surface<'_>,
    wanted: &str,
) -> Result<wgpu::Adapter> {
    let mut fallback = None;

    for power_preference in [
        wgpu::PowerPreference::HighPerformance,
        wgpu::PowerPreference::LowPower,
    ] {
        let Ok(adapter) = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
        else {
            continue;
        };

        let name = adapter.get_info().name;
        if wanted.is_empty() || name.to_lowercase().contains(&wanted.to_lowercase()) {
            return Ok(adapter);
        }
        log::debug!("skipping adapter {name:?}, looking for {wanted:?}");
        fallback.get_or_insert(adapter);
    }

    let adapter = fallback.context("failed to find a suitable GPU adapter")?;
    log::warn!(
        "no adapter matching {wanted:?}, using {:?}",
        adapter.get_info().name
    );
    Ok(adapter)
}

pub(super) async fn request_device(
    adapter: &wgpu::Adapter,
    options: &WgpuOptions,
) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("prism-vout device"),
            required_features: wgpu::Features::empty(),
            required_limits: options.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .context("failed to create wgpu device/queue")
}
