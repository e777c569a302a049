use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::decoder::ImageDecoder;
use crate::error::GfxError;
use crate::format::{TextureFormat, TextureType};
use crate::vertex::VertexAttribute;

pub type TexturePtr = Arc<dyn Texture>;
pub type BufferPtr = Arc<dyn Buffer>;
pub type AttributeObjectPtr = Arc<dyn AttributeObject>;
pub type ProxyTexturePtr = Arc<ProxyTexture>;

/// Backend-owned texture. Created empty; pixel data arrives through
/// [`Texture::load`] or storage through [`Texture::allocate`].
pub trait Texture {
    fn id(&self) -> Uuid;
    fn texture_type(&self) -> TextureType;
    /// Format of the current contents, `None` until loaded or allocated.
    fn format(&self) -> Option<TextureFormat>;
    fn label(&self) -> &str;

    /// Uploads the decoder's surface, consuming the decoder.
    fn load(&self, decoder: Box<dyn ImageDecoder>) -> Result<(), GfxError>;

    /// Reserves uninitialised storage of the given size.
    fn allocate(&self, format: TextureFormat, width: u32, height: u32) -> Result<(), GfxError>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Vertex,
    Index,
    Uniform,
}

/// Backend-owned GPU buffer holding a byte payload.
pub trait Buffer {
    fn buffer_type(&self) -> BufferType;
    fn is_modifiable(&self) -> bool;

    /// Replaces the payload. Fails with [`GfxError::ImmutableBuffer`] on a
    /// non-modifiable buffer that has already been written once.
    fn write(&self, data: Vec<u8>) -> Result<(), GfxError>;

    /// Copy of the current payload.
    fn contents(&self) -> Vec<u8>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_any(&self) -> &dyn Any;
}

/// A vertex buffer bound to the vertex layout of one shader variant.
pub trait AttributeObject {
    fn shader(&self) -> &str;
    fn stage(&self) -> &str;
    fn properties(&self) -> u32;
    fn vertex_attributes(&self) -> &[VertexAttribute];
    fn vertex_buffer(&self) -> &BufferPtr;
    fn offset(&self) -> u32;
    fn label(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

/// CPU side of a buffer: the payload plus the write-once rule.
#[derive(Debug)]
pub struct BufferStorage {
    buffer_type: BufferType,
    modifiable: bool,
    written: bool,
    data: Vec<u8>,
}

impl BufferStorage {
    pub fn new(buffer_type: BufferType, modifiable: bool) -> Self {
        Self {
            buffer_type,
            modifiable,
            written: false,
            data: Vec::new(),
        }
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    pub fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn write(&mut self, data: Vec<u8>) -> Result<&[u8], GfxError> {
        if self.written && !self.modifiable {
            return Err(GfxError::ImmutableBuffer);
        }
        self.written = true;
        self.data = data;
        Ok(&self.data)
    }
}

/// Placeholder for a texture whose contents arrive later, such as a
/// streamed or video texture.
#[derive(Default)]
pub struct ProxyTexture {
    target: RwLock<Option<TexturePtr>>,
}

impl ProxyTexture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the proxy at its real texture.
    pub fn assign(&self, texture: TexturePtr) {
        *self.target.write() = Some(texture);
    }

    pub fn resolve(&self) -> Option<TexturePtr> {
        self.target.read().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.target.read().is_some()
    }
}
