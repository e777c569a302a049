use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::vertex::AttributeType;

/// Backend slot of an attribute or uniform.
pub type Location = u32;

pub const VERTEX_UNIFORM_ARRAY: &str = "vs_uniforms_vec4";
pub const PIXEL_UNIFORM_ARRAY: &str = "ps_uniforms_vec4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderType {
    Vertex,
    Pixel,
}

impl ShaderType {
    /// Name of the flat uniform array holding this stage's registers.
    pub fn uniform_array(self) -> &'static str {
        match self {
            ShaderType::Vertex => VERTEX_UNIFORM_ARRAY,
            ShaderType::Pixel => PIXEL_UNIFORM_ARRAY,
        }
    }
}

/// Position of one original-shader uniform in its source register numbering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub shader_type: ShaderType,
    pub index: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, shader_type: ShaderType, index: u32) -> Self {
        Self {
            name: name.into(),
            shader_type,
            index,
        }
    }

    /// Native name of the array element `offset` registers past this symbol,
    /// `None` when that element index does not fit a `u32`.
    pub fn array_element_name(&self, offset: u32) -> Option<String> {
        let index = self.index.checked_add(offset)?;
        Some(format!("{}[{}]", self.shader_type.uniform_array(), index))
    }
}

/// Native program as compiled by the backend.
pub trait Program {
    fn attribute_location(&self, name: &str) -> Option<Location>;
    fn uniform_location(&self, name: &str) -> Option<Location>;
    fn set_uniform4f(&mut self, location: Location, value: Vec4);

    /// Zeroes staged uniform values before the next draw. Programs that
    /// write straight through keep nothing to clear.
    fn reset_uniforms(&mut self) {}
}

/// A value written to a uniform slot returned by a location lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

/// The name translations of one converted program. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramMappings {
    attributes: BTreeMap<AttributeType, String>,
    samplers: HashMap<String, String>,
    symbols: HashMap<String, Symbol>,
}

impl ProgramMappings {
    pub fn builder() -> ProgramMappingsBuilder {
        ProgramMappingsBuilder::default()
    }

    pub fn attribute(&self, attribute: AttributeType) -> Option<&str> {
        self.attributes.get(&attribute).map(String::as_str)
    }

    pub fn sampler(&self, alias: &str) -> Option<&str> {
        self.samplers.get(alias).map(String::as_str)
    }

    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// Collects mappings while a program is being built.
#[derive(Debug, Clone, Default)]
pub struct ProgramMappingsBuilder {
    mappings: ProgramMappings,
}

impl ProgramMappingsBuilder {
    /// Replaces every attribute mapping.
    pub fn set_attribute_mappings(
        &mut self,
        mappings: impl IntoIterator<Item = (AttributeType, String)>,
    ) -> &mut Self {
        self.mappings.attributes = mappings.into_iter().collect();
        self
    }

    /// Merges sampler aliases. An alias that is already mapped keeps its
    /// first mapping.
    pub fn add_sampler_mappings(
        &mut self,
        mappings: impl IntoIterator<Item = (String, String)>,
    ) -> &mut Self {
        for (alias, native) in mappings {
            self.mappings.samplers.entry(alias).or_insert(native);
        }
        self
    }

    /// Inserts symbols, replacing any earlier symbol of the same name.
    pub fn set_symbols(&mut self, symbols: impl IntoIterator<Item = Symbol>) -> &mut Self {
        for symbol in symbols {
            self.mappings.symbols.insert(symbol.name.clone(), symbol);
        }
        self
    }

    pub fn build(&self) -> ProgramMappings {
        self.mappings.clone()
    }
}

/// A native program driven through the source engine's naming.
///
/// Converted uniforms are numbered vec4 registers of the vertex or pixel
/// stage, exposed natively as `vs_uniforms_vec4` and `ps_uniforms_vec4`.
#[derive(Debug)]
pub struct ConvertedProgram<P> {
    program: P,
    mappings: ProgramMappings,
}

impl<P: Program> ConvertedProgram<P> {
    pub fn new(program: P, mappings: ProgramMappings) -> Self {
        Self { program, mappings }
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    pub fn mappings(&self) -> &ProgramMappings {
        &self.mappings
    }

    /// Location of the attribute mapped to `attribute`, if the program
    /// declares that mapping and the mapped input is active.
    pub fn get_attribute_location(&self, attribute: AttributeType) -> Option<Location> {
        let name = self.mappings.attribute(attribute)?;
        self.program.attribute_location(name)
    }

    /// Resolves `name` as a symbol, then as a sampler alias, then as a native
    /// uniform. The first rule that knows the name decides.
    pub fn get_uniform_location(&self, name: &str) -> Option<Location> {
        if let Some(symbol) = self.mappings.symbol(name) {
            return self.get_uniform_array_symbol_location(symbol, 0);
        }
        if let Some(native) = self.mappings.sampler(name) {
            return self.program.uniform_location(native);
        }
        self.program.uniform_location(name)
    }

    /// Location of the register `offset` slots past `name`'s symbol.
    pub fn get_uniform_array_location(&self, name: &str, offset: u32) -> Option<Location> {
        let symbol = self.mappings.symbol(name)?;
        self.get_uniform_array_symbol_location(symbol, offset)
    }

    pub fn get_uniform_array_symbol_location(
        &self,
        symbol: &Symbol,
        offset: u32,
    ) -> Option<Location> {
        self.program
            .uniform_location(&symbol.array_element_name(offset)?)
    }

    pub fn set_uniform1f(&mut self, location: Location, value: f32) {
        self.program
            .set_uniform4f(location, Vec4::new(value, 0.0, 0.0, 0.0));
    }

    pub fn set_uniform2f(&mut self, location: Location, value: Vec2) {
        self.program.set_uniform4f(location, value.extend(0.0).extend(0.0));
    }

    pub fn set_uniform3f(&mut self, location: Location, value: Vec3) {
        self.program.set_uniform4f(location, value.extend(0.0));
    }

    pub fn set_uniform4f(&mut self, location: Location, value: Vec4) {
        self.program.set_uniform4f(location, value);
    }

    pub fn set_uniform(&mut self, location: Location, value: UniformValue) {
        match value {
            UniformValue::Float(v) => self.set_uniform1f(location, v),
            UniformValue::Vec2(v) => self.set_uniform2f(location, v),
            UniformValue::Vec3(v) => self.set_uniform3f(location, v),
            UniformValue::Vec4(v) => self.set_uniform4f(location, v),
            UniformValue::Mat4(v) => self.set_uniform_matrix4f(location, v),
        }
    }

    pub fn reset_uniforms(&mut self) {
        self.program.reset_uniforms();
    }

    /// Writes a matrix as four consecutive registers. The matrix is
    /// transposed first so each register receives one row of `value`.
    /// Registers past `Location::MAX` are dropped.
    pub fn set_uniform_matrix4f(&mut self, location: Location, value: Mat4) {
        let transposed = value.transpose();
        for row in 0..4 {
            let Some(register) = location.checked_add(row as u32) else {
                break;
            };
            self.program.set_uniform4f(register, transposed.col(row));
        }
    }
}
