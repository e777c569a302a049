pub mod program;
pub mod resources;
mod shaders;

use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::{Mat3, Mat4, Vec3};
use log::{debug, error, info, warn};
use uuid::Uuid;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::error::GfxError;
use crate::format::TextureType;
use crate::render::manifest::ShaderManifest;
use crate::render::program::ConvertedProgram;
use crate::render::resources::{AttributeObjectPtr, BufferPtr, BufferType, Texture, TexturePtr};
use crate::render::{RenderState, Renderer};
use crate::scene::{IndexFormat, MeshPart, TextureBinding};
use crate::vertex::{vertex_stride, VertexAttribute, VertexAttributeType};

use self::program::{stage_draw, FrameGlobals, LightRegister, WgpuProgram};
use self::resources::{GpuHandles, ProgramKey, WgpuAttributeObject, WgpuBuffer, WgpuTexture};

/// Renderer drawing converted shaders through wgpu into a window surface.
pub struct WgpuRenderer {
    surface: wgpu::Surface<'static>,
    gpu: GpuHandles,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    programs: HashMap<ProgramKey, ConvertedProgram<WgpuProgram>>,
    sampler: wgpu::Sampler,
    fallback: FallbackViews,
    blit: VideoBlit,
    textures: HashMap<Uuid, Weak<WgpuTexture>>,
    started: Instant,
    time: f32,
    state: RenderState,
}

impl WgpuRenderer {
    /// Initializes the GPU for `window` and compiles every converted shader
    /// found in `shader_directory`.
    pub async fn new(window: Arc<Window>, shader_directory: &Path) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let supports_bc = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC);
        let required_features = if supports_bc {
            wgpu::Features::TEXTURE_COMPRESSION_BC
        } else {
            wgpu::Features::empty()
        };

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("awe-device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| {
                    matches!(
                        mode,
                        wgpu::PresentMode::Mailbox | wgpu::PresentMode::Immediate
                    )
                })
                .unwrap_or(wgpu::PresentMode::Fifo),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        info!(
            "initialized {} ({:?}), surface format {surface_format:?}, BC textures: {supports_bc}",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let device = Arc::new(device);
        let queue = Arc::new(queue);
        let depth = DepthBuffer::create(&device, config.width, config.height);
        let programs = compile_programs(&device, shader_directory).await?;
        info!(
            "compiled {} program variants from {}",
            programs.len(),
            shader_directory.display()
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("awe-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let fallback = FallbackViews::create(&device, &queue);
        let blit = VideoBlit::create(&device, surface_format);

        Ok(Self {
            surface,
            gpu: GpuHandles {
                device,
                queue,
                supports_bc,
            },
            config,
            depth,
            programs,
            sampler,
            fallback,
            blit,
            textures: HashMap::new(),
            started: Instant::now(),
            time: 0.0,
            state: RenderState::default(),
        })
    }

    fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn frame_globals(&self) -> FrameGlobals {
        let (view, projection, camera_position) = match &self.state.camera {
            Some(camera) => (camera.view(), camera.projection(), camera.position()),
            None => (Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO),
        };
        FrameGlobals {
            view,
            projection,
            camera_position,
            ambiance: self.state.ambiance,
            time: self.time,
            lights: self
                .state
                .lights
                .live()
                .map(|light| LightRegister {
                    position: light.position(),
                    color: light.color(),
                    range: light.range(),
                })
                .collect(),
        }
    }

    /// Writes the uniforms of one draw and captures everything the pass
    /// needs. Returns `None` for parts that cannot be drawn yet.
    fn prepare(&mut self, part: &MeshPart, globals: &FrameGlobals, world: Mat4) -> Option<PreparedDraw> {
        let Some(object) = part
            .attribute_object
            .as_any()
            .downcast_ref::<WgpuAttributeObject>()
        else {
            error!("attribute object {} was not created by this renderer", part.attribute_object.label());
            return None;
        };
        let vertex = gpu_buffer(&object.vertex_buffer)?;
        let index = gpu_buffer(&part.index_buffer)?;
        let index_format = match part.index_format {
            IndexFormat::U16 => wgpu::IndexFormat::Uint16,
            IndexFormat::U32 => wgpu::IndexFormat::Uint32,
        };
        let indices = match draw_range(
            vertex.size(),
            object.offset as u64,
            index.size(),
            index_format,
            part.first_index,
            part.index_count,
        ) {
            Ok(indices) => indices,
            Err(reason) => {
                error!("{}: skipping draw, {reason}", object.label);
                return None;
            }
        };

        let program = self.programs.get_mut(&object.key)?;
        stage_draw(program, globals, world, &part.uniforms);

        let device = &self.gpu.device;
        let staging = program.program().staging();
        let vs_uniforms = uniform_buffer(device, staging.vertex(), "vs-uniforms");
        let ps_uniforms = uniform_buffer(device, staging.pixel(), "ps-uniforms");

        let layout = program.program().layout();
        let views = layout
            .samplers()
            .iter()
            .map(|sampler| {
                find_binding(&part.textures, program, &sampler.name)
                    .and_then(|binding| binding.texture.resolve())
                    .and_then(|texture| texture_view(&texture, sampler.texture_type))
                    .unwrap_or_else(|| self.fallback.view(sampler.texture_type))
            })
            .collect::<Vec<_>>();

        for binding in &part.textures {
            let known = layout.samplers().iter().any(|s| s.name == binding.sampler)
                || program.mappings().sampler(&binding.sampler).is_some();
            if !known {
                warn!(
                    "{}: program has no sampler {}",
                    object.label, binding.sampler
                );
            }
        }

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: vs_uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: ps_uniforms.as_entire_binding(),
            },
        ];
        for (sampler, view) in layout.samplers().iter().zip(&views) {
            entries.push(wgpu::BindGroupEntry {
                binding: sampler.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: sampler.binding + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&object.label),
            layout: &program.program().bind_group_layout,
            entries: &entries,
        });

        Some(PreparedDraw {
            pipeline: Arc::clone(&object.pipeline),
            bind_group,
            vertex,
            vertex_offset: object.offset as u64,
            index,
            index_format,
            indices,
        })
    }

    fn video_frame_view(&self) -> Option<Arc<wgpu::TextureView>> {
        let id = self.state.current_video_frame?;
        let texture = self.textures.get(&id)?.upgrade()?;
        if texture.texture_type() != TextureType::Texture2D {
            return None;
        }
        texture.view()
    }
}

impl Renderer for WgpuRenderer {
    fn state(&self) -> &RenderState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn create_texture(
        &mut self,
        texture_type: TextureType,
        label: &str,
    ) -> Result<TexturePtr, GfxError> {
        let texture = Arc::new(WgpuTexture::new(self.gpu.clone(), texture_type, label));
        self.textures.insert(texture.id(), Arc::downgrade(&texture));
        debug!("created {texture_type:?} texture {label} ({})", texture.id());
        Ok(texture)
    }

    fn create_buffer(
        &mut self,
        buffer_type: BufferType,
        modifiable: bool,
    ) -> Result<BufferPtr, GfxError> {
        debug!("created {buffer_type:?} buffer (modifiable: {modifiable})");
        Ok(Arc::new(WgpuBuffer::new(
            Arc::clone(&self.gpu.device),
            buffer_type,
            modifiable,
        )))
    }

    fn create_attribute_object(
        &mut self,
        shader: &str,
        stage: &str,
        properties: u32,
        attributes: &[VertexAttribute],
        vertex_buffer: BufferPtr,
        offset: u32,
        label: &str,
    ) -> Result<AttributeObjectPtr, GfxError> {
        let key = ProgramKey {
            shader: shader.to_string(),
            stage: stage.to_string(),
            properties,
        };
        let program = self
            .programs
            .get(&key)
            .ok_or_else(|| GfxError::UnknownProgram {
                shader: shader.to_string(),
                stage: stage.to_string(),
                properties,
            })?;

        let mut vertex_attributes = Vec::with_capacity(attributes.len());
        let mut attribute_offset = 0u64;
        for attribute in attributes {
            match program.get_attribute_location(attribute.component) {
                Some(location) => vertex_attributes.push(wgpu::VertexAttribute {
                    format: vertex_format(attribute.data_type),
                    offset: attribute_offset,
                    shader_location: location,
                }),
                None => warn!(
                    "{label}: {shader}/{stage} has no input for {:?}, skipping it",
                    attribute.component
                ),
            }
            attribute_offset += attribute.data_type.size() as u64;
        }

        let native = program.program();
        let pipeline = self
            .gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&native.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &native.module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: vertex_stride(attributes) as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &vertex_attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &native.module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.surface_format(),
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });
        debug!(
            "created attribute object {label} for {shader}/{stage}/{properties:#x} ({} of {} attributes bound)",
            vertex_attributes.len(),
            attributes.len()
        );

        Ok(Arc::new(WgpuAttributeObject {
            key,
            attributes: attributes.to_vec(),
            vertex_buffer,
            offset,
            label: label.to_string(),
            pipeline: Arc::new(pipeline),
        }))
    }

    fn get_uniform_index(
        &self,
        shader: &str,
        stage: &str,
        properties: u32,
        name: &str,
    ) -> Option<u32> {
        let key = ProgramKey {
            shader: shader.to_string(),
            stage: stage.to_string(),
            properties,
        };
        self.programs.get(&key)?.get_uniform_location(name)
    }

    fn update(&mut self) {
        let pruned = self.state.prune();
        let before = self.textures.len();
        self.textures.retain(|_, texture| texture.strong_count() > 0);
        let pruned = pruned + before - self.textures.len();
        if pruned > 0 {
            debug!("released {pruned} dropped scene objects and textures");
        }
        self.time = self.started.elapsed().as_secs_f32();
    }

    fn draw_frame(&mut self) -> Result<(), GfxError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost, reconfiguring");
                self.surface.configure(&self.gpu.device, &self.config);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let globals = self.frame_globals();
        let mut scene_draws = Vec::new();

        if let Some(sky) = self.state.sky.clone() {
            let sky_globals = FrameGlobals {
                view: Mat4::from_mat3(Mat3::from_mat4(globals.view)),
                ..globals.clone()
            };
            for part in sky.parts() {
                scene_draws.extend(self.prepare(&part, &sky_globals, Mat4::IDENTITY));
            }
        }

        let models = self.state.models.live().collect::<Vec<_>>();
        for model in models.iter().filter(|model| model.is_visible()) {
            let world = model.transform();
            for part in model.parts() {
                scene_draws.extend(self.prepare(&part, &globals, world));
            }
        }

        let gui_globals = FrameGlobals {
            view: Mat4::IDENTITY,
            projection: Mat4::orthographic_rh(
                0.0,
                self.config.width as f32,
                self.config.height as f32,
                0.0,
                -1.0,
                1.0,
            ),
            ..globals.clone()
        };
        let mut gui_draws = Vec::new();
        let elements = self.state.gui_elements.live().collect::<Vec<_>>();
        for element in elements.iter().filter(|element| element.is_visible()) {
            let world = Mat4::from_translation(element.position().extend(0.0));
            for part in element.parts() {
                gui_draws.extend(self.prepare(&part, &gui_globals, world));
            }
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("awe-frame-encoder"),
            });

        let sky = self.state.ambiance.sky_color;
        {
            let mut pass = begin_pass(
                &mut encoder,
                "scene-pass",
                &view,
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: sky.x as f64,
                    g: sky.y as f64,
                    b: sky.z as f64,
                    a: 1.0,
                }),
                Some(&self.depth.view),
            );
            for draw in &scene_draws {
                draw.record(&mut pass);
            }
        }
        {
            let mut pass = begin_pass(
                &mut encoder,
                "gui-pass",
                &view,
                wgpu::LoadOp::Load,
                Some(&self.depth.view),
            );
            for draw in &gui_draws {
                draw.record(&mut pass);
            }
        }
        if let Some(frame) = self.video_frame_view() {
            let bind_group = self.blit.bind_group(&self.gpu.device, &frame, &self.sampler);
            let mut pass = begin_pass(&mut encoder, "video-pass", &view, wgpu::LoadOp::Load, None);
            pass.set_pipeline(&self.blit.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.gpu.device, &self.config);
        self.depth = DepthBuffer::create(&self.gpu.device, width, height);
    }
}

async fn compile_programs(
    device: &wgpu::Device,
    shader_directory: &Path,
) -> Result<HashMap<ProgramKey, ConvertedProgram<WgpuProgram>>> {
    let mut programs = HashMap::new();
    for (path, manifest) in ShaderManifest::load_directory(shader_directory)? {
        let directory = path.parent().unwrap_or(shader_directory);
        for description in &manifest.programs {
            let source_path = directory.join(&description.source);
            let source = fs::read_to_string(&source_path)
                .with_context(|| format!("unable to read {}", source_path.display()))?;
            let label = format!(
                "{}/{}/{:#x}",
                manifest.name, description.stage, description.properties
            );

            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let program = WgpuProgram::new(device, description, &source, &label);
            if let Some(err) = device.pop_error_scope().await {
                return Err(anyhow!("failed to compile {label}: {err}"));
            }
            debug!("compiled program {label}");

            let key = ProgramKey {
                shader: manifest.name.clone(),
                stage: description.stage.clone(),
                properties: description.properties,
            };
            if programs
                .insert(key, ConvertedProgram::new(program, description.mappings()))
                .is_some()
            {
                warn!("{} redefines program {label}", path.display());
            }
        }
    }
    Ok(programs)
}

fn gpu_buffer(buffer: &BufferPtr) -> Option<Arc<wgpu::Buffer>> {
    buffer.as_any().downcast_ref::<WgpuBuffer>()?.gpu_buffer()
}

/// Index range of a draw, checked against the buffers it reads.
fn draw_range(
    vertex_size: u64,
    vertex_offset: u64,
    index_size: u64,
    index_format: wgpu::IndexFormat,
    first_index: u32,
    index_count: u32,
) -> Result<Range<u32>, String> {
    if vertex_offset >= vertex_size {
        return Err(format!(
            "vertex offset {vertex_offset} is outside the {vertex_size} byte vertex buffer"
        ));
    }
    let end = first_index
        .checked_add(index_count)
        .ok_or_else(|| format!("index range {first_index}+{index_count} overflows"))?;
    let stride: u64 = match index_format {
        wgpu::IndexFormat::Uint16 => 2,
        wgpu::IndexFormat::Uint32 => 4,
    };
    let needed = u64::from(end) * stride;
    if needed > index_size {
        return Err(format!(
            "indices {first_index}..{end} need {needed} bytes, index buffer holds {index_size}"
        ));
    }
    Ok(first_index..end)
}

fn uniform_buffer(device: &wgpu::Device, registers: &[[f32; 4]], label: &str) -> wgpu::Buffer {
    const EMPTY: [[f32; 4]; 1] = [[0.0; 4]];
    let registers = if registers.is_empty() { &EMPTY[..] } else { registers };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(registers),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

/// Binding for the native sampler `name`, matched by native name or by an
/// alias the program maps onto it.
fn find_binding<'a>(
    bindings: &'a [TextureBinding],
    program: &ConvertedProgram<WgpuProgram>,
    name: &str,
) -> Option<&'a TextureBinding> {
    bindings.iter().find(|binding| {
        binding.sampler == name || program.mappings().sampler(&binding.sampler) == Some(name)
    })
}

fn texture_view(texture: &TexturePtr, expected: TextureType) -> Option<Arc<wgpu::TextureView>> {
    let texture = texture.as_any().downcast_ref::<WgpuTexture>()?;
    if texture.texture_type() != expected {
        warn!(
            "texture {} is {:?}, sampler expects {expected:?}",
            texture.label(),
            texture.texture_type()
        );
        return None;
    }
    texture.view()
}

fn vertex_format(data_type: VertexAttributeType) -> wgpu::VertexFormat {
    match data_type {
        VertexAttributeType::Float32 => wgpu::VertexFormat::Float32,
        VertexAttributeType::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexAttributeType::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexAttributeType::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexAttributeType::Float16x2 => wgpu::VertexFormat::Float16x2,
        VertexAttributeType::Float16x4 => wgpu::VertexFormat::Float16x4,
        VertexAttributeType::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        VertexAttributeType::Uint8x4 => wgpu::VertexFormat::Uint8x4,
        VertexAttributeType::Snorm16x2 => wgpu::VertexFormat::Snorm16x2,
        VertexAttributeType::Snorm16x4 => wgpu::VertexFormat::Snorm16x4,
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    depth: Option<&wgpu::TextureView>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

struct PreparedDraw {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_group: wgpu::BindGroup,
    vertex: Arc<wgpu::Buffer>,
    vertex_offset: u64,
    index: Arc<wgpu::Buffer>,
    index_format: wgpu::IndexFormat,
    indices: Range<u32>,
}

impl PreparedDraw {
    fn record(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex.slice(self.vertex_offset..));
        pass.set_index_buffer(self.index.slice(..), self.index_format);
        pass.draw_indexed(self.indices.clone(), 0, 0..1);
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// White 1x1 textures bound to samplers whose texture is missing.
struct FallbackViews {
    d2: Arc<wgpu::TextureView>,
    d3: Arc<wgpu::TextureView>,
    cube: Arc<wgpu::TextureView>,
}

impl FallbackViews {
    fn create(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            d2: solid_view(device, queue, TextureType::Texture2D),
            d3: solid_view(device, queue, TextureType::Texture3D),
            cube: solid_view(device, queue, TextureType::Cubemap),
        }
    }

    fn view(&self, texture_type: TextureType) -> Arc<wgpu::TextureView> {
        Arc::clone(match texture_type {
            TextureType::Texture2D => &self.d2,
            TextureType::Texture3D => &self.d3,
            TextureType::Cubemap => &self.cube,
        })
    }
}

fn solid_view(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture_type: TextureType,
) -> Arc<wgpu::TextureView> {
    let layers = texture_type.layer_count() as u32;
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: layers,
    };
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("fallback-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: match texture_type {
                TextureType::Texture3D => wgpu::TextureDimension::D3,
                _ => wgpu::TextureDimension::D2,
            },
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &vec![0xff; 4 * layers as usize],
    );
    Arc::new(texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("fallback-view"),
        dimension: Some(program::view_dimension(texture_type)),
        ..Default::default()
    }))
}

/// Pipeline compositing the current video frame over the whole target.
struct VideoBlit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
}

impl VideoBlit {
    fn create(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("video-blit-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::VIDEO_BLIT.into()),
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("video-blit-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("video-blit-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("video-blit-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });
        Self { pipeline, layout }
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        frame: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("video-blit-bind-group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(frame),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}
