use serde::{Deserialize, Serialize};

/// Dimensionality of a texture or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureType {
    Texture2D,
    Texture3D,
    Cubemap,
}

impl TextureType {
    /// Number of layers a complete image of this type carries.
    pub fn layer_count(self) -> usize {
        match self {
            TextureType::Cubemap => 6,
            TextureType::Texture2D | TextureType::Texture3D => 1,
        }
    }
}

/// Pixel formats understood by the surface model and the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    Bgra8,
    R16F,
    Rgba16F,
    R32F,
    Rgba32F,
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
}

impl TextureFormat {
    /// Returns true for block-compressed formats (4x4 texel blocks).
    pub fn is_compressed(self) -> bool {
        self.block_size().is_some()
    }

    /// Size in bytes of one 4x4 block, for compressed formats.
    pub fn block_size(self) -> Option<usize> {
        match self {
            TextureFormat::Bc1 | TextureFormat::Bc4 => Some(8),
            TextureFormat::Bc2 | TextureFormat::Bc3 | TextureFormat::Bc5 => Some(16),
            _ => None,
        }
    }

    /// Size in bytes of one texel, for uncompressed formats.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            TextureFormat::R8 => Some(1),
            TextureFormat::Rg8 | TextureFormat::R16F => Some(2),
            TextureFormat::Rgb8 => Some(3),
            TextureFormat::Rgba8 | TextureFormat::Bgra8 | TextureFormat::R32F => Some(4),
            TextureFormat::Rgba16F => Some(8),
            TextureFormat::Rgba32F => Some(16),
            _ => None,
        }
    }

    /// Bytes in one row of texels (or one row of blocks for compressed formats).
    pub fn row_pitch(self, width: u32) -> usize {
        match (self.block_size(), self.bytes_per_pixel()) {
            (Some(block), _) => blocks(width) * block,
            (None, Some(bpp)) => width as usize * bpp,
            (None, None) => 0,
        }
    }

    /// Number of rows [`row_pitch`](Self::row_pitch) covers for an image of `height`.
    pub fn row_count(self, height: u32) -> usize {
        if self.is_compressed() {
            blocks(height)
        } else {
            height as usize
        }
    }

    /// Byte size of a single `width` x `height` image in this format.
    pub fn image_size(self, width: u32, height: u32) -> usize {
        self.row_pitch(width) * self.row_count(height)
    }
}

fn blocks(texels: u32) -> usize {
    (texels as usize).div_ceil(4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_sizes_scale_with_texel_size() {
        assert_eq!(TextureFormat::R8.image_size(7, 3), 21);
        assert_eq!(TextureFormat::Rgb8.image_size(4, 4), 48);
        assert_eq!(TextureFormat::Rgba32F.image_size(2, 2), 64);
    }

    #[test]
    fn compressed_sizes_round_up_to_whole_blocks() {
        assert_eq!(TextureFormat::Bc1.image_size(4, 4), 8);
        assert_eq!(TextureFormat::Bc1.image_size(5, 5), 32);
        assert_eq!(TextureFormat::Bc3.image_size(1, 1), 16);
        assert_eq!(TextureFormat::Bc5.row_pitch(16), 64);
        assert_eq!(TextureFormat::Bc5.row_count(16), 4);
    }

    #[test]
    fn cubemaps_have_six_layers() {
        assert_eq!(TextureType::Cubemap.layer_count(), 6);
        assert_eq!(TextureType::Texture3D.layer_count(), 1);
    }
}
