//! wgpu Backend
//!
//! Production [`RenderBackend`] implementation over wgpu. Owns the device,
//! queue, optional window surface, the surface/mesh registries and a
//! lazily-populated pipeline cache keyed by (shader archetype, attachment
//! formats, sample count).
//!
//! # Pass Recording
//!
//! `begin_pass` does not open a wgpu render pass immediately. Draw batches
//! are recorded into a CPU-side [`PassRecording`] and the whole pass is
//! encoded at `end_pass`, once every pipeline and bind group it needs has
//! been created. This sidesteps the encoder/pass borrow entanglement and
//! keeps the trait surface free of lifetimes.

use glam::Mat4;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use crate::errors::{EmberError, Result};
use crate::gfx::backend::{
    BlitDestination, DrawCall, MeshData, MeshId, PassDescriptor, RenderBackend,
    SurfaceData, SurfaceDescriptor, SurfaceId, Technique, TechniqueParams,
};
use crate::gfx::{DepthFormat, PixelRect, SurfaceFormat, SurfaceSize};

// ─── Shader Sources ───────────────────────────────────────────────────────────

const MESH_GBUFFER_WGSL: &str = include_str!("shaders/mesh_gbuffer.wgsl");
const MESH_FORWARD_WGSL: &str = include_str!("shaders/mesh_forward.wgsl");
const MESH_DEPTH_WGSL: &str = include_str!("shaders/mesh_depth.wgsl");
const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");
const FULLSCREEN_DEPTH_WGSL: &str = include_str!("shaders/fullscreen_depth.wgsl");
const DOWNSAMPLE_WGSL: &str = include_str!("shaders/downsample.wgsl");
const BLIT_WGSL: &str = include_str!("shaders/blit.wgsl");

/// Shader archetypes. Every [`Technique`] maps onto one of these programs;
/// per-technique behavior is driven by the uniform block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum ShaderKind {
    /// Geometry into the G-Buffer MRT pair (linear depth + normals).
    MeshGBuffer,
    /// Geometry into a single color target.
    MeshForward,
    /// Depth-only geometry (shadow maps).
    MeshDepth,
    /// Fullscreen triangle, one color target.
    Fullscreen,
    /// Fullscreen triangle that also reconstructs hardware depth from the
    /// G-Buffer's linear depth via `frag_depth`.
    FullscreenDepth,
    /// Fullscreen triangle, two color targets (G-Buffer downsample).
    FullscreenMrt2,
    /// Plain surface copy used by [`RenderBackend::blit`].
    Blit,
}

impl ShaderKind {
    const fn for_technique(technique: Technique) -> Self {
        match technique {
            Technique::GBufferSimple
            | Technique::GBufferNormalMapped
            | Technique::GBufferParallax
            | Technique::GBufferSkinnedSimple
            | Technique::GBufferSkinnedNormalMapped
            | Technique::GBufferTransparent
            | Technique::GBufferTransparentSkinned => Self::MeshGBuffer,
            Technique::DownsampleGBuffer => Self::FullscreenMrt2,
            Technique::DepthReconstruct => Self::FullscreenDepth,
            Technique::AmbientLight
            | Technique::AmbientOcclusion
            | Technique::DirectionalLight
            | Technique::PointLight
            | Technique::SpotLight
            | Technique::PostProcess
            | Technique::GammaOverlay => Self::Fullscreen,
            Technique::ShadowDepth | Technique::ShadowDepthCube => Self::MeshDepth,
            _ => Self::MeshForward,
        }
    }

    const fn source(self) -> &'static str {
        match self {
            Self::MeshGBuffer => MESH_GBUFFER_WGSL,
            Self::MeshForward => MESH_FORWARD_WGSL,
            Self::MeshDepth => MESH_DEPTH_WGSL,
            Self::Fullscreen => FULLSCREEN_WGSL,
            Self::FullscreenDepth => FULLSCREEN_DEPTH_WGSL,
            Self::FullscreenMrt2 => DOWNSAMPLE_WGSL,
            Self::Blit => BLIT_WGSL,
        }
    }

    const fn has_vertex_input(self) -> bool {
        matches!(self, Self::MeshGBuffer | Self::MeshForward | Self::MeshDepth)
    }
}

// ─── Uniforms ─────────────────────────────────────────────────────────────────

/// Per-draw uniform block shared by all shader archetypes.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    world: [[f32; 4]; 4],
    camera_position: [f32; 4],
    color_intensity: [f32; 4],
    position_range: [f32; 4],
    direction_inner: [f32; 4],
    /// x = outer cone, y = exposure, z = bloom threshold, w = technique id.
    misc: [f32; 4],
}

/// Branch selector for the fullscreen uber-shader.
const fn technique_id(technique: Technique) -> f32 {
    match technique {
        Technique::AmbientLight => 1.0,
        Technique::AmbientOcclusion => 2.0,
        Technique::DirectionalLight => 3.0,
        Technique::PointLight => 4.0,
        Technique::SpotLight => 5.0,
        Technique::GammaOverlay => 6.0,
        _ => 0.0,
    }
}

impl DrawUniforms {
    fn new(params: &TechniqueParams, world: Mat4, technique: Technique) -> Self {
        Self {
            view: params.view.to_cols_array_2d(),
            projection: params.projection.to_cols_array_2d(),
            world: world.to_cols_array_2d(),
            camera_position: params.camera_position.extend(1.0).to_array(),
            color_intensity: params.color.extend(params.intensity).to_array(),
            position_range: params.position.extend(params.range).to_array(),
            direction_inner: params.direction.extend(params.inner_cone).to_array(),
            misc: [
                params.outer_cone,
                params.exposure,
                params.bloom_threshold,
                technique_id(technique),
            ],
        }
    }
}

// ─── Registries ───────────────────────────────────────────────────────────────

struct GpuSurface {
    desc: SurfaceDescriptor,
    /// Render attachment view. With MSAA this is the multi-sampled view.
    attachment_view: wgpu::TextureView,
    /// Single-sample view used when the surface is sampled or read back.
    /// Identical to `attachment_view` when MSAA is off.
    resolve_view: wgpu::TextureView,
    /// The texture behind `resolve_view`.
    resolve_texture: wgpu::Texture,
    depth_view: Option<wgpu::TextureView>,
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    parts: Vec<(u32, u32)>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct PipelineKey {
    kind: ShaderKind,
    color_formats: SmallVec<[wgpu::TextureFormat; 4]>,
    depth_format: Option<wgpu::TextureFormat>,
    sample_count: u32,
    blend: BlendKind,
    depth_write: bool,
    topology: wgpu::PrimitiveTopology,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum BlendKind {
    Replace,
    Alpha,
    Additive,
}

struct RecordedBatch {
    technique: Technique,
    params: TechniqueParams,
    calls: Vec<DrawCall>,
}

struct PassRecording {
    desc: PassDescriptor,
    batches: Vec<RecordedBatch>,
}

enum BackBufferKind {
    /// Window swap chain; a frame texture is acquired on demand and
    /// presented at submit.
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Headless stand-in: an internal RGBA8 surface.
    Offscreen(SurfaceId),
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// wgpu implementation of [`RenderBackend`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    surfaces: SlotMap<SurfaceId, GpuSurface>,
    meshes: SlotMap<MeshId, GpuMesh>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
    shaders: FxHashMap<ShaderKind, wgpu::ShaderModule>,

    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    dummy_view: wgpu::TextureView,

    back_buffer: BackBufferKind,
    frame_texture: Option<wgpu::SurfaceTexture>,
    encoder: Option<wgpu::CommandEncoder>,
    recording: Option<PassRecording>,
}

impl WgpuBackend {
    /// Creates a backend bound to a window surface.
    pub async fn new<W>(window: W, width: u32, height: u32, vsync: bool) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| EmberError::AdapterRequestFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EmberError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = Self::request_device(&adapter).await?;

        let mut config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| {
                EmberError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        config.present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        let back_buffer = BackBufferKind::Window { surface, config };
        let mut backend = Self::from_parts(device, queue, back_buffer);
        backend.init_shaders();
        Ok(backend)
    }

    /// Creates a backend without a window; the back buffer is an internal
    /// RGBA8 surface of the given size.
    pub async fn new_headless(size: SurfaceSize) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| EmberError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = Self::request_device(&adapter).await?;

        // Placeholder replaced right below, once `surfaces` exists.
        let mut backend = Self::from_parts(
            device,
            queue,
            BackBufferKind::Offscreen(SurfaceId::default()),
        );
        backend.init_shaders();

        let bb = backend.create_surface(&SurfaceDescriptor {
            size,
            format: SurfaceFormat::Rgba8,
            depth_format: None,
            antialiasing: crate::gfx::Antialiasing::Off,
            mipmap: false,
            label: "Headless Back Buffer",
        })?;
        backend.back_buffer = BackBufferKind::Offscreen(bb);
        Ok(backend)
    }

    async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
        let pair = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;
        Ok(pair)
    }

    fn from_parts(device: wgpu::Device, queue: wgpu::Queue, back_buffer: BackBufferKind) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
                // Bindings 2..=5: technique input textures (dummy-filled
                // when a slot is unused). Non-filterable so R32Float
                // G-Buffer depth can share the layout.
                Self::texture_entry(2),
                Self::texture_entry(3),
                Self::texture_entry(4),
                Self::texture_entry(5),
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Input Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let dummy_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Dummy Input Texture"),
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
        });
        // White, not zero: unused input slots must be multiplicative
        // identity (the ambient branch modulates by slot 2 unconditionally).
        queue.write_texture(
            dummy_texture.as_image_copy(),
            &[0xFF; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let dummy_view = dummy_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            device,
            queue,
            surfaces: SlotMap::with_key(),
            meshes: SlotMap::with_key(),
            pipelines: FxHashMap::default(),
            shaders: FxHashMap::default(),
            bind_group_layout,
            sampler,
            dummy_view,
            back_buffer,
            frame_texture: None,
            encoder: None,
            recording: None,
        }
    }

    const fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }
    }

    fn init_shaders(&mut self) {
        for kind in [
            ShaderKind::MeshGBuffer,
            ShaderKind::MeshForward,
            ShaderKind::MeshDepth,
            ShaderKind::Fullscreen,
            ShaderKind::FullscreenDepth,
            ShaderKind::FullscreenMrt2,
            ShaderKind::Blit,
        ] {
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Ember Shader"),
                    source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(kind.source())),
                });
            self.shaders.insert(kind, module);
        }
    }

    fn map_format(format: SurfaceFormat) -> wgpu::TextureFormat {
        match format {
            SurfaceFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            SurfaceFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            SurfaceFormat::R32Float => wgpu::TextureFormat::R32Float,
            SurfaceFormat::R8 => wgpu::TextureFormat::R8Unorm,
        }
    }

    fn map_depth_format(format: DepthFormat) -> wgpu::TextureFormat {
        match format {
            DepthFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            DepthFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }

    fn create_texture(
        device: &wgpu::Device,
        size: SurfaceSize,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        sample_count: u32,
        mip_level_count: u32,
        label: &str,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                })
        })
    }

    fn blend_kind(technique: Technique) -> BlendKind {
        if technique.is_additive() {
            BlendKind::Additive
        } else if matches!(
            technique,
            Technique::ForwardTransparent
                | Technique::ForwardTransparentSkinned
                | Technique::Particles
                | Technique::GammaOverlay
        ) {
            BlendKind::Alpha
        } else {
            BlendKind::Replace
        }
    }

    fn topology(technique: Technique) -> wgpu::PrimitiveTopology {
        if matches!(technique, Technique::DebugLines) {
            wgpu::PrimitiveTopology::LineList
        } else {
            wgpu::PrimitiveTopology::TriangleList
        }
    }

    fn depth_write(technique: Technique) -> bool {
        match ShaderKind::for_technique(technique) {
            ShaderKind::MeshGBuffer | ShaderKind::MeshDepth => true,
            ShaderKind::MeshForward => !matches!(
                technique,
                Technique::Skybox
                    | Technique::Skydome
                    | Technique::Particles
                    | Technique::GammaOverlay
            ),
            ShaderKind::Fullscreen => false,
            ShaderKind::FullscreenDepth => true,
            ShaderKind::FullscreenMrt2 | ShaderKind::Blit => false,
        }
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> wgpu::RenderPipeline {
        if let Some(p) = self.pipelines.get(key) {
            return p.clone();
        }

        let shader = &self.shaders[&key.kind];

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Draw Pipeline Layout"),
                bind_group_layouts: &[&self.bind_group_layout],
                immediate_size: 0,
            });

        let blend = match key.blend {
            BlendKind::Replace => Some(wgpu::BlendState::REPLACE),
            BlendKind::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            BlendKind::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_formats
            .iter()
            .map(|format| {
                // Float32 color targets are not blendable without an
                // optional feature; the G-Buffer writes them with REPLACE.
                let blend = if *format == wgpu::TextureFormat::R32Float {
                    None
                } else {
                    blend
                };
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<super::MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
        }];

        let fragment = if key.color_formats.is_empty() {
            None
        } else {
            Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            })
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Draw Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: if key.kind.has_vertex_input() {
                        &vertex_buffers
                    } else {
                        &[]
                    },
                    compilation_options: Default::default(),
                },
                fragment,
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    ..Default::default()
                },
                depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
                    format,
                    depth_write_enabled: key.depth_write,
                    depth_compare: if key.kind.has_vertex_input() {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: key.sample_count,
                    ..Default::default()
                },
                multiview_mask: None,
                cache: None,
            });

        self.pipelines.insert(key.clone(), pipeline.clone());
        pipeline
    }

    fn build_bind_group(&self, uniforms: &DrawUniforms, inputs: &[SurfaceId]) -> wgpu::BindGroup {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Draw Uniforms"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut views: SmallVec<[&wgpu::TextureView; 4]> = SmallVec::new();
        for slot in 0..4 {
            let view = inputs
                .get(slot)
                .and_then(|id| self.surfaces.get(*id))
                .map_or(&self.dummy_view, |s| &s.resolve_view);
            views.push(view);
        }

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw BindGroup"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(views[3]),
                },
            ],
        })
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<SurfaceId> {
        let format = Self::map_format(desc.format);
        let sample_count = desc.antialiasing.sample_count();
        let mip_level_count = if desc.mipmap {
            desc.size.width.max(desc.size.height).max(1).ilog2() + 1
        } else {
            1
        };

        let resolve_texture = Self::create_texture(
            &self.device,
            desc.size,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            1,
            mip_level_count,
            desc.label,
        );
        let resolve_view = resolve_texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });

        let attachment_view = if sample_count > 1 {
            let msaa = Self::create_texture(
                &self.device,
                desc.size,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
                sample_count,
                1,
                desc.label,
            );
            msaa.create_view(&wgpu::TextureViewDescriptor::default())
        } else {
            resolve_texture.create_view(&wgpu::TextureViewDescriptor {
                base_mip_level: 0,
                mip_level_count: Some(1),
                ..Default::default()
            })
        };

        let depth_view = desc.depth_format.map(|depth| {
            let texture = Self::create_texture(
                &self.device,
                desc.size,
                Self::map_depth_format(depth),
                wgpu::TextureUsages::RENDER_ATTACHMENT,
                sample_count,
                1,
                "Target Depth",
            );
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        });

        Ok(self.surfaces.insert(GpuSurface {
            desc: *desc,
            attachment_view,
            resolve_view,
            resolve_texture,
            depth_view,
        }))
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        self.surfaces.remove(id);
    }

    fn surface_descriptor(&self, id: SurfaceId) -> Option<SurfaceDescriptor> {
        self.surfaces.get(id).map(|s| s.desc)
    }

    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshId> {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertices"),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Indices"),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let parts = data
            .parts
            .iter()
            .map(|p| (p.index_start, p.index_count))
            .collect();
        Ok(self.meshes.insert(GpuMesh {
            vertex_buffer,
            index_buffer,
            parts,
        }))
    }

    fn destroy_mesh(&mut self, id: MeshId) {
        self.meshes.remove(id);
    }

    fn begin_pass(&mut self, desc: &PassDescriptor) -> Result<()> {
        if self.recording.is_some() {
            return Err(EmberError::TargetAlreadyActive(
                "begin_pass called while a pass is being recorded",
            ));
        }
        if desc.colors.is_empty() && !desc.use_depth {
            return Err(EmberError::PreconditionViolation {
                component: "WgpuBackend",
                message: "render pass has no attachments".to_string(),
            });
        }
        for attachment in &desc.colors {
            if !self.surfaces.contains_key(attachment.surface) {
                return Err(EmberError::InvalidTarget("WgpuBackend::begin_pass"));
            }
        }
        self.recording = Some(PassRecording {
            desc: desc.clone(),
            batches: Vec::new(),
        });
        Ok(())
    }

    fn draw(
        &mut self,
        technique: Technique,
        params: &TechniqueParams,
        calls: &[DrawCall],
    ) -> Result<()> {
        let Some(recording) = self.recording.as_mut() else {
            return Err(EmberError::PreconditionViolation {
                component: "WgpuBackend",
                message: "draw outside of begin_pass/end_pass".to_string(),
            });
        };
        recording.batches.push(RecordedBatch {
            technique,
            params: params.clone(),
            calls: calls.to_vec(),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        let Some(recording) = self.recording.take() else {
            return Err(EmberError::PreconditionViolation {
                component: "WgpuBackend",
                message: "end_pass without begin_pass".to_string(),
            });
        };

        let first_desc = recording
            .desc
            .colors
            .first()
            .and_then(|a| self.surfaces.get(a.surface))
            .map(|s| s.desc);
        let sample_count = first_desc.map_or(1, |d| d.antialiasing.sample_count());
        let depth_format = if recording.desc.use_depth {
            first_desc
                .and_then(|d| d.depth_format)
                .map(Self::map_depth_format)
        } else {
            None
        };
        let color_formats: SmallVec<[wgpu::TextureFormat; 4]> = recording
            .desc
            .colors
            .iter()
            .filter_map(|a| self.surfaces.get(a.surface))
            .map(|s| Self::map_format(s.desc.format))
            .collect();

        // Create every pipeline and bind group up front; the render pass
        // below then only needs shared borrows.
        struct Prepared {
            pipeline: wgpu::RenderPipeline,
            draws: Vec<(wgpu::BindGroup, Option<(MeshId, u32)>)>,
        }

        let mut prepared: Vec<Prepared> = Vec::with_capacity(recording.batches.len());
        for batch in &recording.batches {
            let key = PipelineKey {
                kind: ShaderKind::for_technique(batch.technique),
                color_formats: color_formats.clone(),
                depth_format,
                sample_count,
                blend: Self::blend_kind(batch.technique),
                depth_write: Self::depth_write(batch.technique),
                topology: Self::topology(batch.technique),
            };
            let pipeline = self.ensure_pipeline(&key);

            let mut draws = Vec::with_capacity(batch.calls.len().max(1));
            if batch.calls.is_empty() {
                let uniforms = DrawUniforms::new(&batch.params, Mat4::IDENTITY, batch.technique);
                draws.push((self.build_bind_group(&uniforms, &batch.params.inputs), None));
            } else {
                for call in &batch.calls {
                    let mut uniforms =
                        DrawUniforms::new(&batch.params, call.world, batch.technique);
                    uniforms.color_intensity =
                        [call.color.x, call.color.y, call.color.z, call.opacity];
                    draws.push((
                        self.build_bind_group(&uniforms, &batch.params.inputs),
                        Some((call.mesh, call.part)),
                    ));
                }
            }
            prepared.push(Prepared { pipeline, draws });
        }

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = recording
            .desc
            .colors
            .iter()
            .filter_map(|a| self.surfaces.get(a.surface).map(|s| (a, s)))
            .map(|(a, s)| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &s.attachment_view,
                    resolve_target: if s.desc.antialiasing.sample_count() > 1 {
                        Some(&s.resolve_view)
                    } else {
                        None
                    },
                    ops: wgpu::Operations {
                        load: a.clear.map_or(wgpu::LoadOp::Load, |c| {
                            wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(c.r),
                                g: f64::from(c.g),
                                b: f64::from(c.b),
                                a: f64::from(c.a),
                            })
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_stencil_attachment = if recording.desc.use_depth {
            recording
                .desc
                .colors
                .first()
                .and_then(|a| self.surfaces.get(a.surface))
                .and_then(|s| s.depth_view.as_ref())
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if recording.desc.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: depth_format
                        .filter(|f| *f == wgpu::TextureFormat::Depth24PlusStencil8)
                        .map(|_| wgpu::Operations {
                            load: if recording.desc.clear_depth {
                                wgpu::LoadOp::Clear(0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                })
        } else {
            None
        };

        let meshes = &self.meshes;
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                })
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(recording.desc.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(vp) = recording.desc.viewport {
                pass.set_viewport(
                    vp.x as f32,
                    vp.y as f32,
                    vp.width as f32,
                    vp.height as f32,
                    0.0,
                    1.0,
                );
            }

            for batch in &prepared {
                pass.set_pipeline(&batch.pipeline);
                for (bind_group, geometry) in &batch.draws {
                    pass.set_bind_group(0, bind_group, &[]);
                    match geometry {
                        None => pass.draw(0..3, 0..1),
                        Some((mesh_id, part)) => {
                            let Some(mesh) = meshes.get(*mesh_id) else {
                                continue;
                            };
                            let Some(&(start, count)) = mesh.parts.get(*part as usize) else {
                                continue;
                            };
                            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                            pass.set_index_buffer(
                                mesh.index_buffer.slice(..),
                                wgpu::IndexFormat::Uint32,
                            );
                            pass.draw_indexed(start..start + count, 0, 0..1);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn blit(
        &mut self,
        src: SurfaceId,
        dst: BlitDestination,
        viewport: Option<PixelRect>,
    ) -> Result<()> {
        if self.recording.is_some() {
            return Err(EmberError::PreconditionViolation {
                component: "WgpuBackend",
                message: "blit inside an open pass".to_string(),
            });
        }
        if !self.surfaces.contains_key(src) {
            return Err(EmberError::InvalidTarget("WgpuBackend::blit"));
        }

        // Resolve the destination without holding a borrow into the
        // registry; the view itself is looked up after pipeline creation.
        enum Dst {
            Surface(SurfaceId),
            Frame(wgpu::TextureView),
        }

        let (dst, dst_format) = match dst {
            BlitDestination::Surface(id) => {
                let surface = self
                    .surfaces
                    .get(id)
                    .ok_or(EmberError::InvalidTarget("WgpuBackend::blit"))?;
                (Dst::Surface(id), Self::map_format(surface.desc.format))
            }
            BlitDestination::BackBuffer => match &self.back_buffer {
                BackBufferKind::Offscreen(id) => {
                    let surface = self
                        .surfaces
                        .get(*id)
                        .ok_or(EmberError::InvalidTarget("WgpuBackend::blit"))?;
                    (Dst::Surface(*id), Self::map_format(surface.desc.format))
                }
                BackBufferKind::Window { surface, config } => {
                    let format = config.format;
                    if self.frame_texture.is_none() {
                        let frame = surface.get_current_texture().map_err(|e| {
                            EmberError::SurfaceCreationFailed(format!(
                                "failed to acquire back buffer: {e:?}"
                            ))
                        })?;
                        self.frame_texture = Some(frame);
                    }
                    let view = self
                        .frame_texture
                        .as_ref()
                        .expect("frame texture acquired above")
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    (Dst::Frame(view), format)
                }
            },
        };

        let key = PipelineKey {
            kind: ShaderKind::Blit,
            color_formats: SmallVec::from_slice(&[dst_format]),
            depth_format: None,
            sample_count: 1,
            blend: BlendKind::Replace,
            depth_write: false,
            topology: wgpu::PrimitiveTopology::TriangleList,
        };
        let pipeline = self.ensure_pipeline(&key);

        let uniforms = DrawUniforms::new(
            &TechniqueParams::default(),
            Mat4::IDENTITY,
            Technique::PostProcess,
        );
        let bind_group = self.build_bind_group(&uniforms, &[src]);

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                })
        });

        let view = match &dst {
            Dst::Surface(id) => {
                &self
                    .surfaces
                    .get(*id)
                    .ok_or(EmberError::InvalidTarget("WgpuBackend::blit"))?
                    .attachment_view
            }
            Dst::Frame(view) => view,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit"),
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
        if let Some(vp) = viewport {
            pass.set_viewport(
                vp.x as f32,
                vp.y as f32,
                vp.width as f32,
                vp.height as f32,
                0.0,
                1.0,
            );
        }
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }

    fn read_surface(&mut self, id: SurfaceId) -> Result<SurfaceData> {
        let Some(surface) = self.surfaces.get(id) else {
            return Err(EmberError::InvalidTarget("WgpuBackend::read_surface"));
        };
        if surface.desc.format != SurfaceFormat::Rgba8 {
            return Err(EmberError::Unsupported(
                "read_surface requires an Rgba8 surface".to_string(),
            ));
        }

        let size = surface.desc.size;
        let unpadded = size.width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size: u64::from(padded) * u64::from(size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let texture = &surface.resolve_texture;
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                })
        });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        self.flush();

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|e| EmberError::SurfaceCreationFailed(e.to_string()))?
            .map_err(|e| EmberError::SurfaceCreationFailed(e.to_string()))?;

        let mapped = slice.get_mapped_range();
        let mut rgba = Vec::with_capacity((unpadded * size.height) as usize);
        for row in 0..size.height {
            let start = (row * padded) as usize;
            rgba.extend_from_slice(&mapped[start..start + unpadded as usize]);
        }
        drop(mapped);
        staging.unmap();

        Ok(SurfaceData { size, rgba })
    }

    fn submit_frame(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(EmberError::PreconditionViolation {
                component: "WgpuBackend",
                message: "submit_frame with an open pass".to_string(),
            });
        }
        self.flush();
        if let Some(frame) = self.frame_texture.take() {
            frame.present();
        }
        Ok(())
    }
}
