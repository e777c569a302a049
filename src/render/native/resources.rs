use std::any::Any;
use std::sync::Arc;

use anyhow::anyhow;
use log::debug;
use parking_lot::RwLock;
use uuid::Uuid;
use wgpu::util::DeviceExt;

use crate::decoder::ImageDecoder;
use crate::error::GfxError;
use crate::format::{TextureFormat, TextureType};
use crate::render::resources::{
    AttributeObject, Buffer, BufferPtr, BufferStorage, BufferType, Texture,
};
use crate::surface::{Mipmap, Surface};
use crate::vertex::VertexAttribute;

use super::program::view_dimension;

/// Device and queue shared by every resource a renderer creates.
#[derive(Clone)]
pub struct GpuHandles {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub supports_bc: bool,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: Arc<wgpu::TextureView>,
    format: TextureFormat,
}

pub struct WgpuTexture {
    id: Uuid,
    texture_type: TextureType,
    label: String,
    gpu: GpuHandles,
    inner: RwLock<Option<GpuTexture>>,
}

impl WgpuTexture {
    pub fn new(gpu: GpuHandles, texture_type: TextureType, label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            texture_type,
            label: label.to_string(),
            gpu,
            inner: RwLock::new(None),
        }
    }

    /// View of the current contents, `None` until loaded or allocated.
    pub fn view(&self) -> Option<Arc<wgpu::TextureView>> {
        self.inner.read().as_ref().map(|t| Arc::clone(&t.view))
    }

    fn create(
        &self,
        format: TextureFormat,
        size: wgpu::Extent3d,
        mip_level_count: u32,
        usage: wgpu::TextureUsages,
    ) -> Result<GpuTexture, GfxError> {
        if format.is_compressed() {
            if !self.gpu.supports_bc {
                return Err(anyhow!("{}: adapter has no BC texture support", self.label).into());
            }
            if size.width % 4 != 0 || size.height % 4 != 0 {
                return Err(anyhow!(
                    "{}: compressed texture size {}x{} is not a multiple of 4",
                    self.label,
                    size.width,
                    size.height
                )
                .into());
            }
        }

        check_extent(
            self.texture_type,
            size,
            mip_level_count,
            &self.gpu.device.limits(),
        )
        .map_err(|reason| anyhow!("{}: {reason}", self.label))?;

        let texture = self.gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&self.label),
            size,
            mip_level_count,
            sample_count: 1,
            dimension: match self.texture_type {
                TextureType::Texture3D => wgpu::TextureDimension::D3,
                TextureType::Texture2D | TextureType::Cubemap => wgpu::TextureDimension::D2,
            },
            format: wgpu_format(format),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&self.label),
            dimension: Some(view_dimension(self.texture_type)),
            ..Default::default()
        });
        Ok(GpuTexture {
            texture,
            view: Arc::new(view),
            format,
        })
    }

    fn upload_level(
        &self,
        texture: &wgpu::Texture,
        format: TextureFormat,
        layer: u32,
        level: u32,
        mip: &Mipmap,
    ) {
        let Some(plane) = mip.data.first() else {
            return;
        };
        let slice_size = format.image_size(mip.width, mip.height);
        if slice_size == 0 || plane.len() < slice_size {
            log::warn!(
                "{}: mip {level} of layer {layer} holds {} bytes, expected {slice_size}",
                self.label,
                plane.len()
            );
            return;
        }
        // 3D surfaces may carry a single slice; upload what is there.
        let depth = match self.texture_type {
            TextureType::Texture3D => (plane.len() / slice_size).min(mip.depth.max(1) as usize) as u32,
            _ => 1,
        };

        let (data, upload_format) = match format {
            TextureFormat::Rgb8 => (expand_rgb(&plane[..slice_size * depth as usize]), TextureFormat::Rgba8),
            _ => (plane[..slice_size * depth as usize].to_vec(), format),
        };

        let extent = physical_extent(format, mip.width, mip.height, depth);
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: level,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload_format.row_pitch(mip.width) as u32),
                rows_per_image: Some(upload_format.row_count(mip.height) as u32),
            },
            extent,
        );
    }
}

impl Texture for WgpuTexture {
    fn id(&self) -> Uuid {
        self.id
    }

    fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    fn format(&self) -> Option<TextureFormat> {
        self.inner.read().as_ref().map(|t| t.format)
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn load(&self, decoder: Box<dyn ImageDecoder>) -> Result<(), GfxError> {
        let surface: Surface = decoder.decode()?;
        if surface.texture_type() != self.texture_type {
            return Err(GfxError::TextureTypeMismatch {
                expected: self.texture_type,
                found: surface.texture_type(),
            });
        }

        let layers = match self.texture_type {
            TextureType::Texture3D => surface.depth(),
            TextureType::Texture2D => 1,
            TextureType::Cubemap => 6,
        };
        if surface.layer_count() < self.texture_type.layer_count() {
            return Err(anyhow!(
                "{}: surface has {} layers, {:?} needs {}",
                self.label,
                surface.layer_count(),
                self.texture_type,
                self.texture_type.layer_count()
            )
            .into());
        }

        let format = surface.format();
        let mip_level_count = surface.mipmaps(0).len() as u32;
        let size = physical_size(format, surface.width(), surface.height(), layers);
        let gpu = self.create(
            format,
            size,
            mip_level_count,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;

        for layer in 0..self.texture_type.layer_count() {
            for (level, mip) in surface.mipmaps(layer).iter().enumerate() {
                self.upload_level(&gpu.texture, format, layer as u32, level as u32, mip);
            }
        }

        debug!(
            "loaded texture {} ({:?}, {:?}, {}x{}, {} levels)",
            self.label,
            self.texture_type,
            format,
            surface.width(),
            surface.height(),
            mip_level_count
        );
        *self.inner.write() = Some(gpu);
        Ok(())
    }

    fn allocate(&self, format: TextureFormat, width: u32, height: u32) -> Result<(), GfxError> {
        if self.texture_type != TextureType::Texture2D {
            return Err(GfxError::TextureTypeMismatch {
                expected: self.texture_type,
                found: TextureType::Texture2D,
            });
        }
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if !format.is_compressed() {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let gpu = self.create(
            format,
            physical_size(format, width.max(1), height.max(1), 1),
            1,
            usage,
        )?;
        debug!("allocated texture {} ({format:?}, {width}x{height})", self.label);
        *self.inner.write() = Some(gpu);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct WgpuBuffer {
    label: String,
    device: Arc<wgpu::Device>,
    storage: RwLock<BufferStorage>,
    gpu: RwLock<Option<Arc<wgpu::Buffer>>>,
}

impl WgpuBuffer {
    pub fn new(device: Arc<wgpu::Device>, buffer_type: BufferType, modifiable: bool) -> Self {
        let label = match buffer_type {
            BufferType::Vertex => "vertex-buffer",
            BufferType::Index => "index-buffer",
            BufferType::Uniform => "uniform-buffer",
        };
        Self {
            label: label.to_string(),
            device,
            storage: RwLock::new(BufferStorage::new(buffer_type, modifiable)),
            gpu: RwLock::new(None),
        }
    }

    /// GPU copy of the payload, `None` while the buffer is empty.
    pub fn gpu_buffer(&self) -> Option<Arc<wgpu::Buffer>> {
        self.gpu.read().clone()
    }
}

impl Buffer for WgpuBuffer {
    fn buffer_type(&self) -> BufferType {
        self.storage.read().buffer_type()
    }

    fn is_modifiable(&self) -> bool {
        self.storage.read().is_modifiable()
    }

    fn write(&self, data: Vec<u8>) -> Result<(), GfxError> {
        let mut storage = self.storage.write();
        let usage = match storage.buffer_type() {
            BufferType::Vertex => wgpu::BufferUsages::VERTEX,
            BufferType::Index => wgpu::BufferUsages::INDEX,
            BufferType::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;
        let contents = storage.write(data)?;

        let buffer = (!contents.is_empty()).then(|| {
            Arc::new(
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&self.label),
                        contents,
                        usage,
                    }),
            )
        });
        *self.gpu.write() = buffer;
        Ok(())
    }

    fn contents(&self) -> Vec<u8> {
        self.storage.read().data().to_vec()
    }

    fn len(&self) -> usize {
        self.storage.read().data().len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Program variant an attribute object draws with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub shader: String,
    pub stage: String,
    pub properties: u32,
}

pub struct WgpuAttributeObject {
    pub(crate) key: ProgramKey,
    pub(crate) attributes: Vec<VertexAttribute>,
    pub(crate) vertex_buffer: BufferPtr,
    pub(crate) offset: u32,
    pub(crate) label: String,
    pub(crate) pipeline: Arc<wgpu::RenderPipeline>,
}

impl AttributeObject for WgpuAttributeObject {
    fn shader(&self) -> &str {
        &self.key.shader
    }

    fn stage(&self) -> &str {
        &self.key.stage
    }

    fn properties(&self) -> u32 {
        self.key.properties
    }

    fn vertex_attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    fn vertex_buffer(&self) -> &BufferPtr {
        &self.vertex_buffer
    }

    fn offset(&self) -> u32 {
        self.offset
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TextureFormat::Rg8 => wgpu::TextureFormat::Rg8Unorm,
        TextureFormat::Rgb8 | TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::R16F => wgpu::TextureFormat::R16Float,
        TextureFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::R32F => wgpu::TextureFormat::R32Float,
        TextureFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
        TextureFormat::Bc1 => wgpu::TextureFormat::Bc1RgbaUnorm,
        TextureFormat::Bc2 => wgpu::TextureFormat::Bc2RgbaUnorm,
        TextureFormat::Bc3 => wgpu::TextureFormat::Bc3RgbaUnorm,
        TextureFormat::Bc4 => wgpu::TextureFormat::Bc4RUnorm,
        TextureFormat::Bc5 => wgpu::TextureFormat::Bc5RgUnorm,
    }
}

fn physical_size(format: TextureFormat, width: u32, height: u32, layers: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: layers.max(1),
    }
    .physical_size(wgpu_format(format))
}

fn physical_extent(format: TextureFormat, width: u32, height: u32, depth: u32) -> wgpu::Extent3d {
    physical_size(format, width, height, depth)
}

/// Rejects sizes and mip chains the device would refuse to create.
fn check_extent(
    texture_type: TextureType,
    size: wgpu::Extent3d,
    mip_level_count: u32,
    limits: &wgpu::Limits,
) -> Result<(), String> {
    let (width, height, layers) = (size.width, size.height, size.depth_or_array_layers);
    if width == 0 || height == 0 || layers == 0 {
        return Err(format!("empty texture extent {width}x{height}x{layers}"));
    }
    let (max_dimension, largest) = match texture_type {
        TextureType::Texture3D => (limits.max_texture_dimension_3d, width.max(height).max(layers)),
        TextureType::Texture2D | TextureType::Cubemap => {
            (limits.max_texture_dimension_2d, width.max(height))
        }
    };
    if largest > max_dimension {
        return Err(format!(
            "extent {width}x{height}x{layers} exceeds the device limit of {max_dimension}"
        ));
    }
    let max_levels = u32::BITS - largest.leading_zeros();
    if mip_level_count == 0 || mip_level_count > max_levels {
        return Err(format!(
            "{mip_level_count} mip levels for {width}x{height}, at most {max_levels} allowed"
        ));
    }
    Ok(())
}

/// Appends an opaque alpha channel to tightly packed RGB texels.
pub(crate) fn expand_rgb(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .flat_map(|texel| [texel[0], texel[1], texel[2], 0xff])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expands_to_rgba_with_opaque_alpha() {
        assert_eq!(expand_rgb(&[1, 2, 3, 4, 5, 6]), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn compressed_extents_round_up_to_blocks() {
        let extent = physical_extent(TextureFormat::Bc1, 2, 6, 1);
        assert_eq!((extent.width, extent.height), (4, 8));
        let extent = physical_extent(TextureFormat::Rgba8, 3, 5, 2);
        assert_eq!((extent.width, extent.height, extent.depth_or_array_layers), (3, 5, 2));
    }

    fn extent(width: u32, height: u32, layers: u32) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layers,
        }
    }

    #[test]
    fn empty_extents_are_rejected_before_creation() {
        let limits = wgpu::Limits::default();
        assert!(check_extent(TextureType::Texture2D, extent(0, 0, 1), 1, &limits).is_err());
        assert!(check_extent(TextureType::Texture2D, extent(16, 0, 1), 1, &limits).is_err());
        assert!(check_extent(TextureType::Texture2D, extent(16, 16, 1), 0, &limits).is_err());
    }

    #[test]
    fn mip_chain_is_bounded_by_the_largest_dimension() {
        let limits = wgpu::Limits::default();
        assert!(check_extent(TextureType::Texture2D, extent(16, 4, 1), 5, &limits).is_ok());
        assert!(check_extent(TextureType::Texture2D, extent(16, 4, 1), 6, &limits).is_err());
        assert!(check_extent(TextureType::Texture3D, extent(2, 2, 8), 4, &limits).is_ok());
        assert!(check_extent(TextureType::Cubemap, extent(1, 1, 6), 1, &limits).is_ok());
    }

    #[test]
    fn extents_past_the_device_limit_are_rejected() {
        let limits = wgpu::Limits::default();
        let too_wide = limits.max_texture_dimension_2d + 1;
        assert!(check_extent(TextureType::Texture2D, extent(too_wide, 1, 1), 1, &limits).is_err());
    }

    #[test]
    fn every_format_has_a_wgpu_counterpart() {
        assert_eq!(wgpu_format(TextureFormat::Rgb8), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(wgpu_format(TextureFormat::Bc5), wgpu::TextureFormat::Bc5RgUnorm);
    }
}
