use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::ambiance::AmbianceState;
use crate::format::TextureType;
use crate::render::manifest::{ProgramDescription, SamplerDeclaration};
use crate::render::program::{
    ConvertedProgram, Location, Program, UniformValue, PIXEL_UNIFORM_ARRAY, VERTEX_UNIFORM_ARRAY,
};

/// Number of lights written into `g_vLightPosition`/`g_vLightColor`.
pub const MAX_LIGHTS: usize = 8;

/// Native reflection of a compiled program.
///
/// Locations are laid out as the vertex registers, then the pixel registers,
/// then one location per sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLayout {
    attributes: HashMap<String, Location>,
    vs_registers: u32,
    ps_registers: u32,
    samplers: Vec<SamplerDeclaration>,
}

impl ProgramLayout {
    pub fn from_description(description: &ProgramDescription) -> Self {
        Self {
            attributes: description
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.location))
                .collect(),
            vs_registers: description.vs_uniforms,
            ps_registers: description.ps_uniforms,
            samplers: description.samplers.clone(),
        }
    }

    pub fn attribute_location(&self, name: &str) -> Option<Location> {
        self.attributes.get(name).copied()
    }

    pub fn uniform_location(&self, name: &str) -> Option<Location> {
        if let Some(index) = array_index(name, VERTEX_UNIFORM_ARRAY) {
            return (index < self.vs_registers).then_some(index);
        }
        if let Some(index) = array_index(name, PIXEL_UNIFORM_ARRAY) {
            return (index < self.ps_registers).then_some(self.vs_registers + index);
        }
        self.samplers
            .iter()
            .position(|s| s.name == name)
            .map(|i| self.register_count() + i as Location)
    }

    pub fn register_count(&self) -> u32 {
        self.vs_registers + self.ps_registers
    }

    pub fn vs_registers(&self) -> u32 {
        self.vs_registers
    }

    pub fn samplers(&self) -> &[SamplerDeclaration] {
        &self.samplers
    }

    /// Sampler declared at `location`, if the location names one.
    pub fn sampler_at(&self, location: Location) -> Option<&SamplerDeclaration> {
        let index = location.checked_sub(self.register_count())?;
        self.samplers.get(index as usize)
    }
}

/// Parses `array[i]`, and the bare `array` as element 0.
fn array_index(name: &str, array: &str) -> Option<u32> {
    let rest = name.strip_prefix(array)?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

/// CPU copy of every vec4 register of a program.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformStaging {
    registers: Vec<[f32; 4]>,
    vs_registers: usize,
}

impl UniformStaging {
    pub fn new(layout: &ProgramLayout) -> Self {
        Self {
            registers: vec![[0.0; 4]; layout.register_count() as usize],
            vs_registers: layout.vs_registers() as usize,
        }
    }

    /// Writes one register. Sampler locations and out-of-range locations
    /// are ignored.
    pub fn set(&mut self, location: Location, value: Vec4) {
        if let Some(register) = self.registers.get_mut(location as usize) {
            *register = value.to_array();
        }
    }

    pub fn reset(&mut self) {
        self.registers.fill([0.0; 4]);
    }

    pub fn vertex(&self) -> &[[f32; 4]] {
        &self.registers[..self.vs_registers]
    }

    pub fn pixel(&self) -> &[[f32; 4]] {
        &self.registers[self.vs_registers..]
    }
}

/// A compiled wgpu program: shader module, bind layout, reflection and
/// staged register values.
pub struct WgpuProgram {
    layout: ProgramLayout,
    staging: UniformStaging,
    pub(crate) module: wgpu::ShaderModule,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) pipeline_layout: wgpu::PipelineLayout,
}

impl WgpuProgram {
    pub fn new(
        device: &wgpu::Device,
        description: &ProgramDescription,
        source: &str,
        label: &str,
    ) -> Self {
        let layout = ProgramLayout::from_description(description);
        let staging = UniformStaging::new(&layout);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut entries = vec![uniform_entry(0), uniform_entry(1)];
        for sampler in layout.samplers() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: view_dimension(sampler.texture_type),
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.binding + 1,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label}-bind-layout")),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label}-pipeline-layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            layout,
            staging,
            module,
            bind_group_layout,
            pipeline_layout,
        }
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    pub fn staging(&self) -> &UniformStaging {
        &self.staging
    }
}

impl Program for WgpuProgram {
    fn attribute_location(&self, name: &str) -> Option<Location> {
        self.layout.attribute_location(name)
    }

    fn uniform_location(&self, name: &str) -> Option<Location> {
        self.layout.uniform_location(name)
    }

    fn set_uniform4f(&mut self, location: Location, value: Vec4) {
        self.staging.set(location, value);
    }

    fn reset_uniforms(&mut self) {
        self.staging.reset();
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn view_dimension(texture_type: TextureType) -> wgpu::TextureViewDimension {
    match texture_type {
        TextureType::Texture2D => wgpu::TextureViewDimension::D2,
        TextureType::Texture3D => wgpu::TextureViewDimension::D3,
        TextureType::Cubemap => wgpu::TextureViewDimension::Cube,
    }
}

/// A light as written into the light registers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRegister {
    pub position: Vec3,
    pub color: Vec3,
    pub range: f32,
}

/// Per-frame values every converted program may consume, by symbol name.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGlobals {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub ambiance: AmbianceState,
    pub time: f32,
    pub lights: Vec<LightRegister>,
}

impl FrameGlobals {
    /// Writes the frame values plus `world` into `program`. Symbols the
    /// program does not declare are skipped.
    pub fn apply<P: Program>(&self, program: &mut ConvertedProgram<P>, world: Mat4) {
        let view_proj = self.projection * self.view;
        set_matrix(program, "g_mWorld", world);
        set_matrix(program, "g_mViewProj", view_proj);
        set_matrix(program, "g_mWorldViewProj", view_proj * world);

        set_vec3(program, "g_vCameraPosition", self.camera_position);
        set_vec3(program, "g_vAmbientColor", self.ambiance.ambient_color);
        set_vec3(program, "g_vSunDirection", self.ambiance.sun_direction);
        set_vec3(program, "g_vSunColor", self.ambiance.sun_color);
        set_vec3(program, "g_vFogColor", self.ambiance.fog_color);
        if let Some(location) = program.get_uniform_location("g_vFogRange") {
            program.set_uniform2f(
                location,
                Vec2::new(self.ambiance.fog_near, self.ambiance.fog_far),
            );
        }
        set_scalar(program, "g_fExposure", self.ambiance.exposure);
        set_scalar(program, "g_fTime", self.time);

        let lights = &self.lights[..self.lights.len().min(MAX_LIGHTS)];
        set_scalar(program, "g_fLightCount", lights.len() as f32);
        for (i, light) in lights.iter().enumerate() {
            if let Some(location) = program.get_uniform_array_location("g_vLightPosition", i as u32) {
                program.set_uniform3f(location, light.position);
            }
            if let Some(location) = program.get_uniform_array_location("g_vLightColor", i as u32) {
                program.set_uniform4f(location, light.color.extend(light.range));
            }
        }
    }
}

/// Stages the registers of one draw from scratch: the frame values first,
/// then the part's own material values.
pub fn stage_draw<P: Program>(
    program: &mut ConvertedProgram<P>,
    globals: &FrameGlobals,
    world: Mat4,
    uniforms: &[(Location, UniformValue)],
) {
    program.reset_uniforms();
    globals.apply(program, world);
    for (location, value) in uniforms {
        program.set_uniform(*location, *value);
    }
}

fn set_matrix<P: Program>(program: &mut ConvertedProgram<P>, name: &str, value: Mat4) {
    if let Some(location) = program.get_uniform_location(name) {
        program.set_uniform_matrix4f(location, value);
    }
}

fn set_vec3<P: Program>(program: &mut ConvertedProgram<P>, name: &str, value: Vec3) {
    if let Some(location) = program.get_uniform_location(name) {
        program.set_uniform3f(location, value);
    }
}

fn set_scalar<P: Program>(program: &mut ConvertedProgram<P>, name: &str, value: f32) {
    if let Some(location) = program.get_uniform_location(name) {
        program.set_uniform1f(location, value);
    }
}
