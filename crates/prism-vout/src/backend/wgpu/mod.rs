//! wgpu rendering backend.
//!
//! Presents to a window surface through a single-pass blitter. Color
//! conversion, overlays and 3D lookup tables are applied on the GPU; the
//! remaining render parameter groups are accepted and reported once as not
//! applied.

mod blit;
mod cube;
mod device;
mod hook;
mod surface;

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

pub use blit::BlitRenderer;
pub use cube::CubeLut;
pub use device::WgpuOptions;
pub use hook::{HookParam, HookPass, HookTexture, UserShader};
pub use surface::WgpuSurface;

use self::blit::{BlitCtx, BlitDraw, BlitUniform};
use self::surface::SurfaceErrorAction;
use super::{GpuBackend, RenderParams, SourceImage, SwapchainFrame, TargetFrame};
use crate::coords::Rect2Df;
use crate::error::BackendError;
use crate::format::{ColorRepr, ColorSpace, PixelFormat, PlaneData, Rotation};

/// A plane or overlay texture.
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    components: u8,
    component_map: [u8; 4],
}

impl WgpuTexture {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A 3D lookup table resident on the GPU.
pub struct WgpuLut {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    scale: [f32; 3],
    offset: [f32; 3],
}

/// Swap-chain image being recorded.
struct FrameInFlight {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct WgpuBackend {
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    current: bool,
    frame: Option<FrameInFlight>,
    /// Submitted image waiting for `swap_buffers`.
    pending: Option<wgpu::SurfaceTexture>,

    /// Features already reported as not applied.
    reported: BTreeSet<&'static str>,
}

impl WgpuBackend {
    async fn new(surface: WgpuSurface, options: &WgpuOptions) -> Result<Self> {
        let WgpuSurface {
            target,
            width,
            height,
        } = surface;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .context("failed to create wgpu surface")?;

        let adapter = device::request_adapter(&instance, &surface, &options.adapter_name).await?;
        let info = adapter.get_info();
        log::info!("using adapter {:?} ({:?})", info.name, info.backend);

        let (device, queue) = device::request_device(&adapter, options).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, options.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&caps, options.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: options.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: options.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);
        log::debug!("surface configured: {format:?} {}x{}", config.width, config.height);

        Ok(Self {
            _instance: instance,
            surface,
            adapter,
            device,
            queue,
            config,
            current: false,
            frame: None,
            pending: None,
            reported: BTreeSet::new(),
        })
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    fn report_once(&mut self, what: &'static str) {
        if self.reported.insert(what) {
            log::warn!("{what} is not applied by the wgpu renderer");
        }
    }

    fn report_unapplied(&mut self, params: &RenderParams<'_, WgpuLut, UserShader>) {
        for group in params.set.active_groups() {
            self.report_once(group);
        }
        if params.hook.is_some() {
            self.report_once("custom shader");
        }
    }
}

fn plane_format(data: &PlaneData<'_>) -> Result<wgpu::TextureFormat, BackendError> {
    if data.component_bytes != 1 {
        return Err(BackendError::new(format!(
            "{}-byte samples are not supported",
            data.component_bytes
        )));
    }
    match data.components {
        1 => Ok(wgpu::TextureFormat::R8Unorm),
        2 => Ok(wgpu::TextureFormat::Rg8Unorm),
        4 => Ok(wgpu::TextureFormat::Rgba8Unorm),
        n => Err(BackendError::new(format!("{n}-component planes are not supported"))),
    }
}

impl GpuBackend for WgpuBackend {
    type Surface = WgpuSurface;
    type Options = WgpuOptions;
    type Texture = WgpuTexture;
    type Renderer = BlitRenderer;
    type Lut = WgpuLut;
    type Hook = UserShader;

    fn create(surface: WgpuSurface, options: &WgpuOptions) -> Result<Self, BackendError> {
        Ok(pollster::block_on(Self::new(surface, options))?)
    }

    fn make_current(&mut self) -> Result<(), BackendError> {
        if self.current {
            return Err(BackendError::new("backend is already current"));
        }
        self.current = true;
        Ok(())
    }

    fn release_current(&mut self) {
        self.current = false;
    }

    fn supports_format(&self, format: PixelFormat) -> bool {
        format.sample_depth() == 8
    }

    fn create_renderer(&mut self) -> Result<BlitRenderer, BackendError> {
        Ok(BlitRenderer::new())
    }

    fn destroy_renderer(&mut self, renderer: BlitRenderer) {
        drop(renderer);
    }

    fn upload_plane(
        &mut self,
        slot: &mut Option<WgpuTexture>,
        data: &PlaneData<'_>,
    ) -> Result<(), BackendError> {
        if data.width == 0 || data.height == 0 {
            return Err(BackendError::new("empty plane"));
        }
        let format = plane_format(data)?;
        let len = data.required_len();
        let pixels = data
            .pixels
            .get(..len)
            .ok_or_else(|| BackendError::new(format!("plane needs {len} bytes")))?;

        let reusable = slot
            .as_ref()
            .is_some_and(|t| (t.width, t.height, t.format) == (data.width, data.height, format));
        if !reusable {
            if let Some(old) = slot.take() {
                old.texture.destroy();
            }
            let size = wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            };
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("prism plane"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            *slot = Some(WgpuTexture {
                texture,
                view,
                width: data.width,
                height: data.height,
                format,
                components: data.components,
                component_map: data.component_map,
            });
        }

        let Some(target) = slot.as_mut() else {
            return Err(BackendError::new("plane texture missing after allocation"));
        };
        target.components = data.components;
        target.component_map = data.component_map;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(data.row_stride as u32),
                rows_per_image: Some(data.height),
            },
            wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        texture.texture.destroy();
    }

    fn start_frame(&mut self) -> Option<SwapchainFrame> {
        // An image that was never swapped is shown now.
        if let Some(stale) = self.pending.take() {
            stale.present();
        }
        if self.frame.take().is_some() {
            log::debug!("dropping unsubmitted frame");
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                let action =
                    surface::map_surface_error(&self.surface, &self.device, &self.config, err.clone());
                match action {
                    SurfaceErrorAction::Reconfigured => log::debug!("surface reconfigured"),
                    SurfaceErrorAction::SkipFrame => log::debug!("surface not ready: {err}"),
                    SurfaceErrorAction::Fatal => log::error!("surface acquisition failed: {err}"),
                }
                return None;
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prism frame encoder"),
            });

        let frame = SwapchainFrame {
            width: surface_texture.texture.width(),
            height: surface_texture.texture.height(),
            flipped: false,
            color: ColorSpace::SRGB,
            repr: ColorRepr::RGB8,
        };
        self.frame = Some(FrameInFlight {
            surface_texture,
            view,
            encoder,
        });
        Some(frame)
    }

    fn clear_frame(&mut self, rgba: [f32; 4]) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let [r, g, b, a] = rgba.map(f64::from);
        frame
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("prism clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
    }

    fn render_image(
        &mut self,
        renderer: &mut BlitRenderer,
        image: &SourceImage<'_, WgpuTexture, WgpuLut>,
        target: &TargetFrame<'_, WgpuTexture, WgpuLut>,
        params: &RenderParams<'_, WgpuLut, UserShader>,
    ) -> Result<(), BackendError> {
        self.report_unapplied(params);

        let Some(frame) = self.frame.as_mut() else {
            return Err(BackendError::new("no frame in flight"));
        };
        let viewport = (
            frame.surface_texture.texture.width(),
            frame.surface_texture.texture.height(),
        );

        let Some(first) = image.planes().next() else {
            return Err(BackendError::new("source image has no planes"));
        };
        let crop = blit::normalized_crop(image.crop, first.texture.width, first.texture.height);
        let mut uniform = BlitUniform::new(target.crop, viewport, crop, image.rotation);
        let mut views = [None; 4];
        for (i, plane) in image.planes.iter().enumerate() {
            let Some(plane) = plane else { continue };
            let tex = plane.texture;
            let shift = [
                plane.shift_x / tex.width as f32,
                plane.shift_y / tex.height as f32,
            ];
            uniform.set_plane(i, plane.components, plane.component_map, shift);
            views[i] = Some(&tex.view);
        }
        uniform.set_conversion(image.repr, image.plane_count() == 1 && first.components == 1);

        // One lookup table stage, applied to the converted RGB signal.
        let lut = params.lut.as_ref().map(|b| b.lut).or(target.lut).or(image.lut);
        if let Some(lut) = lut {
            uniform.set_lut(lut.scale, lut.offset);
        }

        let mut draws = vec![BlitDraw {
            uniform,
            planes: views,
            lut: lut.map(|l| &l.view),
            blend: false,
        }];

        for (overlay, tex) in target.overlays.iter() {
            let mut uniform = BlitUniform::new(
                overlay.rect,
                viewport,
                Rect2Df::new(0.0, 0.0, 1.0, 1.0),
                Rotation::R0,
            );
            uniform.set_plane(0, tex.components, tex.component_map, [0.0; 2]);
            uniform.set_conversion(overlay.repr, tex.components == 1);
            uniform.set_alpha_mode(overlay.repr.alpha);
            draws.push(BlitDraw {
                uniform,
                planes: [Some(&tex.view), None, None, None],
                lut: None,
                blend: true,
            });
        }

        let ctx = BlitCtx {
            device: &self.device,
            queue: &self.queue,
            format: self.config.format,
        };
        renderer.render(&ctx, &mut frame.encoder, &frame.view, &draws);
        Ok(())
    }

    fn submit_frame(&mut self) -> Result<(), BackendError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| BackendError::new("no frame in flight"))?;
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);
        self.pending = Some(frame.surface_texture);
        Ok(())
    }

    fn swap_buffers(&mut self) {
        if let Some(texture) = self.pending.take() {
            texture.present();
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(u32, u32), BackendError> {
        // Reconfiguring invalidates images acquired from the old swap-chain.
        self.frame = None;
        self.pending = None;
        Ok(surface::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            width,
            height,
        ))
    }

    fn parse_lut(&mut self, data: &[u8]) -> Result<WgpuLut, BackendError> {
        let cube = CubeLut::parse(data)?;
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(cube.title.as_deref().unwrap_or("prism lut")),
                size: wgpu::Extent3d {
                    width: cube.size,
                    height: cube.size,
                    depth_or_array_layers: cube.size,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &cube.to_rgba8(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (scale, offset) = cube.coord_transform();
        log::debug!("lookup table uploaded: {}^3", cube.size);

        Ok(WgpuLut {
            _texture: texture,
            view,
            scale,
            offset,
        })
    }

    fn parse_hook(&mut self, data: &[u8]) -> Result<UserShader, BackendError> {
        let shader = UserShader::parse(data)?;
        log::debug!(
            "custom shader parsed: {} passes, {} textures",
            shader.passes.len(),
            shader.textures.len()
        );
        Ok(shader)
    }
}
