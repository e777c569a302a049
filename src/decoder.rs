use crate::error::GfxError;
use crate::format::TextureType;
use crate::surface::Surface;

/// Source of decoded pixel data for a texture.
///
/// A decoder is consumed by the texture it is loaded into and never reused.
pub trait ImageDecoder {
    /// Dimensionality of the image this decoder produces.
    fn texture_type(&self) -> TextureType;

    /// Consumes the decoder, yielding the decoded surface.
    fn decode(self: Box<Self>) -> Result<Surface, GfxError>;
}

/// Decoder over a surface that has already been decoded.
#[derive(Debug, Clone)]
pub struct SurfaceDecoder {
    surface: Surface,
}

impl SurfaceDecoder {
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }
}

impl From<Surface> for SurfaceDecoder {
    fn from(surface: Surface) -> Self {
        Self::new(surface)
    }
}

impl ImageDecoder for SurfaceDecoder {
    fn texture_type(&self) -> TextureType {
        self.surface.texture_type()
    }

    fn decode(self: Box<Self>) -> Result<Surface, GfxError> {
        Ok(self.surface)
    }
}
