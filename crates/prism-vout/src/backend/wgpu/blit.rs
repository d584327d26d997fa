//! Single-pass image blitter.
//!
//! Each draw samples up to four plane textures, routes their components into
//! logical channels, converts to RGB and optionally applies a 3D lookup table.
//! Video frames and overlays go through the same shader; overlays use a
//! blending pipeline.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::Rect2Df;
use crate::format::{AlphaMode, ColorRepr, ColorSystem, Levels, Rotation};

// ── gpu types ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [0.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

type Mat4 = [[f32; 4]; 4];

const ZERO4: Mat4 = [[0.0; 4]; 4];

/// Matches `Blit` in `shaders/blit.wgsl`. Matrices are column-major.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(super) struct BlitUniform {
    pub dst: [f32; 4],
    pub viewport: [f32; 4],
    pub crop: [f32; 4],
    pub frame: [f32; 4],
    pub shift: [[f32; 4]; 4],
    pub planes: [Mat4; 4],
    pub convert: Mat4,
    pub lut_scale: [f32; 4],
    pub lut_offset: [f32; 4],
}

impl BlitUniform {
    pub fn new(dst: Rect2Df, viewport: (u32, u32), crop: Rect2Df, rotation: Rotation) -> Self {
        Self {
            dst: [dst.x0, dst.y0, dst.x1, dst.y1],
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32, 0.0, 0.0],
            crop: [crop.x0, crop.y0, crop.x1, crop.y1],
            frame: [rotation.quarter_turns() as f32, 0.0, 1.0, 0.0],
            shift: [[0.0; 4]; 4],
            planes: [ZERO4; 4],
            convert: identity(),
            lut_scale: [0.0; 4],
            lut_offset: [0.0; 4],
        }
    }

    /// Routes the components of plane `index` into logical channels.
    pub fn set_plane(&mut self, index: usize, components: u8, map: [u8; 4], shift: [f32; 2]) {
        self.planes[index] = plane_matrix(components, map);
        self.shift[index] = [shift[0], shift[1], 0.0, 0.0];
        let n = (components as usize).min(4);
        if map[..n].contains(&3) {
            self.frame[2] = 0.0;
        }
    }

    pub fn set_conversion(&mut self, repr: ColorRepr, grey: bool) {
        self.convert = conversion_matrix(repr, grey);
    }

    pub fn set_lut(&mut self, scale: [f32; 3], offset: [f32; 3]) {
        self.frame[1] = 1.0;
        self.lut_scale = [scale[0], scale[1], scale[2], 0.0];
        self.lut_offset = [offset[0], offset[1], offset[2], 0.0];
    }

    /// Straight-alpha sources are premultiplied in the shader before blending.
    pub fn set_alpha_mode(&mut self, mode: AlphaMode) {
        self.frame[3] = if mode == AlphaMode::Premultiplied { 0.0 } else { 1.0 };
    }
}

// ── matrices ──────────────────────────────────────────────────────────────

fn identity() -> Mat4 {
    let mut m = ZERO4;
    for (i, col) in m.iter_mut().enumerate() {
        col[i] = 1.0;
    }
    m
}

/// Column `i` routes stored component `i` to logical channel `map[i]`.
pub(super) fn plane_matrix(components: u8, map: [u8; 4]) -> Mat4 {
    let mut m = ZERO4;
    for (i, &channel) in map.iter().enumerate().take(components.min(4) as usize) {
        m[i][channel.min(3) as usize] = 1.0;
    }
    m
}

/// Luma coefficients `(kr, kb)` of a YUV system.
fn luma_coefficients(system: ColorSystem) -> Option<(f32, f32)> {
    match system {
        ColorSystem::Bt601 => Some((0.299, 0.114)),
        ColorSystem::Bt709 | ColorSystem::Unknown => Some((0.2126, 0.0722)),
        ColorSystem::Smpte240m => Some((0.212, 0.087)),
        ColorSystem::Bt2020Nc | ColorSystem::Bt2020C => Some((0.2627, 0.0593)),
        ColorSystem::Rgb | ColorSystem::Xyz => None,
    }
}

/// Affine map from logical channels to full range RGB.
///
/// Logical channels are Y/Cb/Cr for YUV systems and R/G/B otherwise. A grey
/// image carries only channel 0, which is replicated.
pub(super) fn conversion_matrix(repr: ColorRepr, grey: bool) -> Mat4 {
    let yuv = luma_coefficients(repr.system).filter(|_| !grey);
    let limited = repr.levels == Levels::Limited;

    // Range expansion: v' = (v - offset) * scale, per channel.
    let (scale, offset) = match (yuv.is_some(), limited) {
        (true, true) => (
            [255.0 / 219.0, 255.0 / 224.0, 255.0 / 224.0],
            [16.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0],
        ),
        (true, false) => ([1.0; 3], [0.0, 128.0 / 255.0, 128.0 / 255.0]),
        (false, true) => ([255.0 / 219.0; 3], [16.0 / 255.0; 3]),
        (false, false) => ([1.0; 3], [0.0; 3]),
    };

    // Rows of the 3x3 color matrix.
    let rows: [[f32; 3]; 3] = match yuv {
        Some((kr, kb)) => {
            let kg = 1.0 - kr - kb;
            [
                [1.0, 0.0, 2.0 * (1.0 - kr)],
                [
                    1.0,
                    -2.0 * kb * (1.0 - kb) / kg,
                    -2.0 * kr * (1.0 - kr) / kg,
                ],
                [1.0, 2.0 * (1.0 - kb), 0.0],
            ]
        }
        None if grey => [[1.0, 0.0, 0.0]; 3],
        None => [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    let mut m = ZERO4;
    for (r, row) in rows.iter().enumerate() {
        let mut t = 0.0;
        for c in 0..3 {
            let k = row[c] * scale[c];
            m[c][r] = k;
            t -= k * offset[c];
        }
        m[3][r] = t;
    }
    m[3][3] = 1.0;
    m
}

/// Pixel crop to normalized texture coordinates of a `width x height` plane.
pub(super) fn normalized_crop(crop: Rect2Df, width: u32, height: u32) -> Rect2Df {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    Rect2Df::new(crop.x0 / w, crop.y0 / h, crop.x1 / w, crop.y1 / h)
}

// ── draws ─────────────────────────────────────────────────────────────────

/// One quad to draw.
pub(super) struct BlitDraw<'a> {
    pub uniform: BlitUniform,
    pub planes: [Option<&'a wgpu::TextureView>; 4],
    pub lut: Option<&'a wgpu::TextureView>,
    pub blend: bool,
}

pub(super) struct BlitCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub format: wgpu::TextureFormat,
}

// ── renderer ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BlitRenderer {
    pipeline_format: Option<wgpu::TextureFormat>,
    image_pipeline: Option<wgpu::RenderPipeline>,
    overlay_pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    sampler: Option<wgpu::Sampler>,

    // bound in place of absent planes / lut
    dummy_plane: Option<wgpu::TextureView>,
    dummy_lut: Option<wgpu::TextureView>,

    quad_vbo: Option<wgpu::Buffer>,
    quad_ibo: Option<wgpu::Buffer>,

    // one uniform buffer per draw of a frame, reused across frames
    uniforms: Vec<wgpu::Buffer>,
}

impl BlitRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `draws` into one render pass that loads the existing contents
    /// of `view`.
    pub(super) fn render(
        &mut self,
        ctx: &BlitCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        draws: &[BlitDraw<'_>],
    ) {
        if draws.is_empty() {
            return;
        }

        self.ensure_pipelines(ctx);
        self.ensure_static_resources(ctx);
        self.ensure_uniforms(ctx, draws.len());

        for (buffer, draw) in self.uniforms.iter().zip(draws) {
            ctx.queue
                .write_buffer(buffer, 0, bytemuck::bytes_of(&draw.uniform));
        }

        let (
            Some(layout),
            Some(sampler),
            Some(dummy_plane),
            Some(dummy_lut),
            Some(image_pipeline),
            Some(overlay_pipeline),
            Some(quad_vbo),
            Some(quad_ibo),
        ) = (
            self.bind_group_layout.as_ref(),
            self.sampler.as_ref(),
            self.dummy_plane.as_ref(),
            self.dummy_lut.as_ref(),
            self.image_pipeline.as_ref(),
            self.overlay_pipeline.as_ref(),
            self.quad_vbo.as_ref(),
            self.quad_ibo.as_ref(),
        )
        else {
            return;
        };

        let bind_groups: Vec<wgpu::BindGroup> = draws
            .iter()
            .zip(&self.uniforms)
            .map(|(draw, ubo)| {
                let plane = |i: usize| draw.planes[i].unwrap_or(dummy_plane);
                ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("prism blit bind group"),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: ubo.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(plane(0)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(plane(1)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(plane(2)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::TextureView(plane(3)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: wgpu::BindingResource::TextureView(
                                draw.lut.unwrap_or(dummy_lut),
                            ),
                        },
                    ],
                })
            })
            .collect();

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("prism blit pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_vertex_buffer(0, quad_vbo.slice(..));
        rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        for (draw, bind_group) in draws.iter().zip(&bind_groups) {
            rpass.set_pipeline(if draw.blend { overlay_pipeline } else { image_pipeline });
            rpass.set_bind_group(0, bind_group, &[]);
            rpass.draw_indexed(0..6, 0, 0..1);
        }
    }

    // ── lazy-init helpers ──────────────────────────────────────────────────

    fn ensure_pipelines(&mut self, ctx: &BlitCtx<'_>) {
        if self.pipeline_format == Some(ctx.format) && self.image_pipeline.is_some() {
            return;
        }

        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("prism blit shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
            });

        let plane_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("prism blit bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<BlitUniform>() as u64,
                            ),
                        },
                        count: None,
                    },
                    plane_entry(1),
                    plane_entry(2),
                    plane_entry(3),
                    plane_entry(4),
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D3,
                            multisampled: false,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("prism blit pipeline layout"),
                bind_group_layouts: &[&bgl],
                immediate_size: 0,
            });

        let pipeline = |label: &'static str, blend: Option<wgpu::BlendState>| {
            ctx.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        compilation_options: Default::default(),
                        buffers: &[QuadVertex::layout()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs_main"),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: ctx.format,
                            blend,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
        };

        self.image_pipeline = Some(pipeline("prism image pipeline", None));
        self.overlay_pipeline = Some(pipeline(
            "prism overlay pipeline",
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        ));
        self.bind_group_layout = Some(bgl);
        self.pipeline_format = Some(ctx.format);
    }

    fn ensure_static_resources(&mut self, ctx: &BlitCtx<'_>) {
        if self.sampler.is_none() {
            self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("prism blit sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            }));
        }

        if self.dummy_plane.is_none() {
            let texture = ctx.device.create_texture_with_data(
                ctx.queue,
                &wgpu::TextureDescriptor {
                    label: Some("prism dummy plane"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[0, 0, 0, 0],
            );
            self.dummy_plane = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        }

        if self.dummy_lut.is_none() {
            let texture = ctx.device.create_texture_with_data(
                ctx.queue,
                &wgpu::TextureDescriptor {
                    label: Some("prism dummy lut"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D3,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[0, 0, 0, 255],
            );
            self.dummy_lut = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        }

        if self.quad_vbo.is_none() {
            self.quad_vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prism quad vbo"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            }));
        }

        if self.quad_ibo.is_none() {
            self.quad_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prism quad ibo"),
                contents: bytemuck::cast_slice(&QUAD_INDICES),
                usage: wgpu::BufferUsages::INDEX,
            }));
        }
    }

    fn ensure_uniforms(&mut self, ctx: &BlitCtx<'_>, count: usize) {
        while self.uniforms.len() < count {
            self.uniforms.push(ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("prism blit ubo"),
                size: std::mem::size_of::<BlitUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
    }
}
