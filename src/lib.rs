//! Rendering core of the AWE runtime.
//!
//! Game code talks to a [`GraphicsManager`], which owns exactly one
//! [`Renderer`] backend. Shaders come from an offline converter that
//! flattens the original engine's uniforms into two `vec4` arrays per
//! program; [`ConvertedProgram`] translates the original names back to
//! backend slots.

pub mod ambiance;
pub mod decoder;
pub mod error;
pub mod format;
pub mod gfxman;
pub mod render;
pub mod resman;
pub mod scene;
pub mod surface;
pub mod vertex;

pub use ambiance::AmbianceState;
pub use decoder::{ImageDecoder, SurfaceDecoder};
pub use error::{AmbianceError, GfxError};
pub use format::{TextureFormat, TextureType};
pub use gfxman::GraphicsManager;
pub use render::program::{
    ConvertedProgram, Location, Program, ProgramMappings, ShaderType, Symbol, UniformValue,
};
pub use render::{
    AttributeObject, AttributeObjectPtr, Buffer, BufferPtr, BufferType, ProxyTexture,
    ProxyTexturePtr, RenderState, Renderer, Texture, TexturePtr, WgpuRenderer,
};
pub use resman::{DirectoryResources, MemoryResources, ResourceProvider};
pub use scene::{
    Camera, GuiElement, IndexFormat, Light, MeshPart, Model, ObjectId, SceneRegistry, Sky,
    TextureBinding, TextureRef, Tracked,
};
pub use surface::{Mipmap, Surface};
pub use vertex::{AttributeType, VertexAttribute, VertexAttributeType};
