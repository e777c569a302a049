use crate::format::{TextureFormat, TextureType};

/// One level of a layer's mip chain.
///
/// `data` holds one byte buffer per plane; single-plane formats use
/// `data[0]` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mipmap {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data: Vec<Vec<u8>>,
}

impl Mipmap {
    fn zeroed(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            depth,
            data: vec![vec![0u8; format.image_size(width, height)]],
        }
    }
}

/// CPU-resident pixel data: an ordered list of layers, each an ordered mip
/// chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    texture_type: TextureType,
    format: TextureFormat,
    layers: Vec<Vec<Mipmap>>,
}

impl Surface {
    /// Creates a zero-filled 2D surface with one layer and one mip level.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            texture_type: TextureType::Texture2D,
            format,
            layers: vec![vec![Mipmap::zeroed(width, height, 1, format)]],
        }
    }

    /// Creates a zero-filled 3D surface with one layer and one mip level.
    ///
    /// The buffer is sized from `width` and `height` only; `depth` is recorded
    /// on the mip level but does not enlarge the allocation. Decoders that
    /// carry full volumes replace the buffer through [`Surface::mipmaps_mut`].
    pub fn new_3d(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            texture_type: TextureType::Texture3D,
            format,
            layers: vec![vec![Mipmap::zeroed(width, height, depth, format)]],
        }
    }

    /// Creates a zero-filled cubemap surface with six single-level faces.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            texture_type: TextureType::Cubemap,
            format,
            layers: (0..6)
                .map(|_| vec![Mipmap::zeroed(size, size, 1, format)])
                .collect(),
        }
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn width(&self) -> u32 {
        self.layers[0][0].width
    }

    pub fn height(&self) -> u32 {
        self.layers[0][0].height
    }

    pub fn depth(&self) -> u32 {
        self.layers[0][0].depth
    }

    /// Mip chain of `layer`, largest level first.
    ///
    /// Panics if `layer >= layer_count()`.
    pub fn mipmaps(&self, layer: usize) -> &[Mipmap] {
        &self.layers[layer]
    }

    /// Mutable levels of `layer`. The chain can be rewritten in place but
    /// never loses its base level.
    ///
    /// Panics if `layer >= layer_count()`.
    pub fn mipmaps_mut(&mut self, layer: usize) -> &mut [Mipmap] {
        &mut self.layers[layer]
    }

    /// Appends the next smaller level to the chain of `layer`.
    ///
    /// Panics if `layer >= layer_count()`.
    pub fn push_mipmap(&mut self, layer: usize, mipmap: Mipmap) {
        self.layers[layer].push(mipmap);
    }

    /// Appends a new zero-filled layer matching the first layer's base level.
    /// Returns the index of the new layer.
    pub fn push_layer(&mut self) -> usize {
        let base = &self.layers[0][0];
        let layer = vec![Mipmap::zeroed(base.width, base.height, base.depth, self.format)];
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// Pixel bytes of the first plane of the base level of `layer`.
    ///
    /// Panics if `layer >= layer_count()`.
    pub fn data(&self, layer: usize) -> &[u8] {
        &self.layers[layer][0].data[0]
    }

    /// Mutable pixel bytes of the first plane of the base level of `layer`.
    ///
    /// Panics if `layer >= layer_count()`.
    pub fn data_mut(&mut self, layer: usize) -> &mut [u8] {
        &mut self.layers[layer][0].data[0]
    }
}
