use std::io;

use thiserror::Error;

/// Errors surfaced by the graphics facade and its backends.
///
/// Lookup misses (unknown uniforms, inactive attributes) are not errors and
/// are reported as `None` by the resolving functions instead.
#[derive(Debug, Error)]
pub enum GfxError {
    #[error("Renderer already initialized")]
    AlreadyInitialized,
    #[error("Renderer not initialized")]
    NotInitialized,
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("failed to read resource {name}")]
    ResourceIo {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid ambiance preset")]
    Ambiance(#[from] AmbianceError),
    #[error("buffer is not modifiable after its initial write")]
    ImmutableBuffer,
    #[error("texture type mismatch: texture is {expected:?}, image is {found:?}")]
    TextureTypeMismatch {
        expected: crate::format::TextureType,
        found: crate::format::TextureType,
    },
    #[error("no program for shader {shader} (stage {stage}, properties {properties:#x})")]
    UnknownProgram {
        shader: String,
        stage: String,
        properties: u32,
    },
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Errors produced while parsing an ambiance preset.
#[derive(Debug, Error)]
pub enum AmbianceError {
    #[error("failed to read ambiance stream")]
    Read(#[from] io::Error),
    #[error("ambiance preset is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid ambiance XML")]
    Xml(#[from] roxmltree::Error),
    #[error("missing <ambiance> root element")]
    MissingRoot,
    #[error("invalid value for <{tag}>: {value:?}")]
    InvalidValue { tag: String, value: String },
}
