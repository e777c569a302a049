use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};

use crate::format::TextureType;
use crate::render::program::{ProgramMappings, ShaderType, Symbol};
use crate::vertex::AttributeType;

/// One converted shader: its program variants, as written by the shader converter.
///
/// ```xml
/// <shader name="mesh">
///   <program stage="material" properties="0x1" source="mesh_material.wgsl"
///            vsUniforms="64" psUniforms="32">
///     <attribute type="position" name="in_POSITION0" location="0"/>
///     <sampler name="ps_sampler0" alias="diffuseMap" binding="2" type="2d"/>
///     <symbol name="g_mWorldViewProj" shader="vertex" index="0"/>
///   </program>
/// </shader>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderManifest {
    pub name: String,
    pub programs: Vec<ProgramDescription>,
}

/// One `(stage, properties)` variant of a converted shader.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDescription {
    pub stage: String,
    pub properties: u32,
    pub source: String,
    pub vs_uniforms: u32,
    pub ps_uniforms: u32,
    pub attributes: Vec<AttributeDeclaration>,
    pub samplers: Vec<SamplerDeclaration>,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDeclaration {
    pub attribute: AttributeType,
    pub name: String,
    pub location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDeclaration {
    pub name: String,
    pub alias: Option<String>,
    /// Texture binding; the sampler object sits at `binding + 1`.
    pub binding: u32,
    pub texture_type: TextureType,
}

impl ProgramDescription {
    /// The conversion tables this variant declares.
    pub fn mappings(&self) -> ProgramMappings {
        ProgramMappings::builder()
            .set_attribute_mappings(
                self.attributes
                    .iter()
                    .map(|a| (a.attribute, a.name.clone())),
            )
            .add_sampler_mappings(self.samplers.iter().filter_map(|s| {
                s.alias
                    .as_ref()
                    .map(|alias| (alias.clone(), s.name.clone()))
            }))
            .set_symbols(self.symbols.iter().cloned())
            .build()
    }
}

impl ShaderManifest {
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid shader manifest XML")?;
        let root = document.root_element();
        if !root.has_tag_name("shader") {
            return Err(anyhow!("expected <shader> root, found <{}>", root.tag_name().name()));
        }
        let name = required_attribute(&root, "name")?.to_string();
        let programs = root
            .children()
            .filter(|n| n.has_tag_name("program"))
            .map(|node| parse_program(&node))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("invalid program in shader {name}"))?;
        if programs.is_empty() {
            return Err(anyhow!("shader {name} declares no programs"));
        }
        Ok(Self { name, programs })
    }

    /// Reads every `*.xml` manifest in `directory`, sorted by file name.
    pub fn load_directory(directory: &Path) -> Result<Vec<(PathBuf, ShaderManifest)>> {
        let mut paths = fs::read_dir(directory)
            .with_context(|| format!("unable to list shader directory {}", directory.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "xml"))
            .collect::<Vec<_>>();
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let xml = fs::read_to_string(&path)
                    .with_context(|| format!("unable to read {}", path.display()))?;
                let manifest = Self::from_xml(&xml)
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                Ok((path, manifest))
            })
            .collect()
    }
}

fn parse_program(node: &Node<'_, '_>) -> Result<ProgramDescription> {
    let mut program = ProgramDescription {
        stage: required_attribute(node, "stage")?.to_string(),
        properties: optional_attribute(node, "properties")
            .map(parse_u32)
            .transpose()?
            .unwrap_or(0),
        source: required_attribute(node, "source")?.to_string(),
        vs_uniforms: optional_attribute(node, "vsUniforms")
            .map(parse_u32)
            .transpose()?
            .unwrap_or(0),
        ps_uniforms: optional_attribute(node, "psUniforms")
            .map(parse_u32)
            .transpose()?
            .unwrap_or(0),
        attributes: Vec::new(),
        samplers: Vec::new(),
        symbols: Vec::new(),
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "attribute" => {
                let ty = required_attribute(&child, "type")?;
                program.attributes.push(AttributeDeclaration {
                    attribute: AttributeType::from_name(ty)
                        .ok_or_else(|| anyhow!("unknown attribute type {ty}"))?,
                    name: required_attribute(&child, "name")?.to_string(),
                    location: parse_u32(required_attribute(&child, "location")?)?,
                });
            }
            "sampler" => program.samplers.push(SamplerDeclaration {
                name: required_attribute(&child, "name")?.to_string(),
                alias: optional_attribute(&child, "alias").map(str::to_string),
                binding: parse_u32(required_attribute(&child, "binding")?)?,
                texture_type: match optional_attribute(&child, "type").unwrap_or("2d") {
                    "2d" => TextureType::Texture2D,
                    "3d" => TextureType::Texture3D,
                    "cube" => TextureType::Cubemap,
                    other => return Err(anyhow!("unknown sampler type {other}")),
                },
            }),
            "symbol" => {
                let shader_type = match required_attribute(&child, "shader")? {
                    "vertex" => ShaderType::Vertex,
                    "pixel" => ShaderType::Pixel,
                    other => return Err(anyhow!("unknown shader type {other}")),
                };
                let index = parse_u32(required_attribute(&child, "index")?)?;
                let limit = match shader_type {
                    ShaderType::Vertex => program.vs_uniforms,
                    ShaderType::Pixel => program.ps_uniforms,
                };
                let name = required_attribute(&child, "name")?;
                if index >= limit {
                    log::warn!("symbol {name} register {index} lies outside its {limit}-slot array");
                }
                program.symbols.push(Symbol::new(name, shader_type, index));
            }
            other => return Err(anyhow!("unexpected <{other}> in program")),
        }
    }

    Ok(program)
}

fn required_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    optional_attribute(node, name).ok_or_else(|| {
        anyhow!(
            "<{}> is missing the {name} attribute",
            node.tag_name().name()
        )
    })
}

fn optional_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_u32(value: &str) -> Result<u32> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|err| anyhow!("invalid number {value:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;

    static MESH: Lazy<String> = Lazy::new(|| {
        r#"<shader name="mesh">
  <program stage="material" properties="0x3" source="mesh_material.wgsl"
           vsUniforms="16" psUniforms="8">
    <attribute type="position" name="in_POSITION0" location="0"/>
    <attribute type="texcoord0" name="in_TEXCOORD0" location="1"/>
    <sampler name="ps_sampler0" alias="diffuseMap" binding="2"/>
    <sampler name="ps_sampler1" binding="4" type="cube"/>
    <symbol name="g_mWorldViewProj" shader="vertex" index="0"/>
    <symbol name="g_vFogColor" shader="pixel" index="5"/>
  </program>
  <program stage="shadowmap" source="mesh_shadow.wgsl" vsUniforms="8"/>
</shader>"#
            .to_string()
    });

    #[test]
    fn parse_manifest_reads_every_program() {
        let manifest = ShaderManifest::from_xml(&MESH).unwrap();
        assert_eq!(manifest.name, "mesh");
        assert_eq!(manifest.programs.len(), 2);

        let material = &manifest.programs[0];
        assert_eq!(material.stage, "material");
        assert_eq!(material.properties, 3);
        assert_eq!(material.vs_uniforms, 16);
        assert_eq!(material.attributes[1].attribute, AttributeType::TexCoord0);
        assert_eq!(material.samplers[1].alias, None);
        assert_eq!(material.samplers[1].texture_type, TextureType::Cubemap);
        assert_eq!(material.samplers[0].texture_type, TextureType::Texture2D);
        assert_eq!(material.symbols[1], Symbol::new("g_vFogColor", ShaderType::Pixel, 5));

        let shadow = &manifest.programs[1];
        assert_eq!(shadow.properties, 0);
        assert_eq!(shadow.ps_uniforms, 0);
    }

    #[test]
    fn description_builds_mappings() {
        let manifest = ShaderManifest::from_xml(&MESH).unwrap();
        let mappings = manifest.programs[0].mappings();
        assert_eq!(mappings.attribute(AttributeType::Position), Some("in_POSITION0"));
        assert_eq!(mappings.sampler("diffuseMap"), Some("ps_sampler0"));
        assert_eq!(mappings.sampler("ps_sampler1"), None);
        assert!(mappings.symbol("g_mWorldViewProj").is_some());
    }

    #[test]
    fn unknown_attribute_type_is_an_error() {
        let xml = r#"<shader name="x"><program stage="s" source="x.wgsl">
            <attribute type="binormal" name="a" location="0"/></program></shader>"#;
        assert!(ShaderManifest::from_xml(xml).is_err());
    }

    #[test]
    fn shader_without_programs_is_an_error() {
        assert!(ShaderManifest::from_xml(r#"<shader name="x"/>"#).is_err());
    }

    #[test]
    fn load_directory_reads_only_xml_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mesh.xml"), MESH.as_bytes()).unwrap();
        fs::write(dir.path().join("mesh_material.wgsl"), b"// wgsl").unwrap();
        let manifests = ShaderManifest::load_directory(dir.path()).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].1.name, "mesh");
    }

    #[test]
    fn load_directory_names_the_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.xml"), b"<shader").unwrap();
        let err = ShaderManifest::load_directory(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("broken.xml"));
    }
}
