use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use pollster::block_on;
use uuid::Uuid;
use winit::window::Window;

use crate::ambiance::AmbianceState;
use crate::decoder::ImageDecoder;
use crate::error::GfxError;
use crate::format::{TextureFormat, TextureType};
use crate::render::{
    AttributeObjectPtr, BufferPtr, BufferType, ProxyTexturePtr, Renderer, TexturePtr,
    WgpuRenderer,
};
use crate::resman::ResourceProvider;
use crate::scene::{Camera, GuiElement, Light, Model, ObjectId, Sky};
use crate::vertex::VertexAttribute;

/// Owns the renderer and forwards to it, composing a few calls such as
/// texture creation from a decoder and ambiance loading by name.
pub struct GraphicsManager {
    renderer: Option<Box<dyn Renderer>>,
    resources: Arc<dyn ResourceProvider>,
}

impl GraphicsManager {
    pub fn new(resources: Arc<dyn ResourceProvider>) -> Self {
        Self {
            renderer: None,
            resources,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.renderer.is_some()
    }

    /// Creates the wgpu renderer for `window`. Fails with
    /// [`GfxError::AlreadyInitialized`] if a renderer already exists, leaving
    /// that renderer in place.
    pub fn init_wgpu(&mut self, window: Arc<Window>, shader_directory: &Path) -> Result<(), GfxError> {
        if self.renderer.is_some() {
            return Err(GfxError::AlreadyInitialized);
        }
        let renderer = block_on(WgpuRenderer::new(window, shader_directory))?;
        self.init_with(Box::new(renderer))
    }

    /// Installs an already constructed renderer, under the same
    /// single-initialisation rule as [`GraphicsManager::init_wgpu`].
    pub fn init_with(&mut self, renderer: Box<dyn Renderer>) -> Result<(), GfxError> {
        if self.renderer.is_some() {
            return Err(GfxError::AlreadyInitialized);
        }
        info!("renderer initialized");
        self.renderer = Some(renderer);
        Ok(())
    }

    fn renderer(&self) -> Result<&dyn Renderer, GfxError> {
        self.renderer.as_deref().ok_or(GfxError::NotInitialized)
    }

    fn renderer_mut(&mut self) -> Result<&mut (dyn Renderer + 'static), GfxError> {
        self.renderer.as_deref_mut().ok_or(GfxError::NotInitialized)
    }

    pub fn add_model(&mut self, model: &Arc<dyn Model>) -> Result<(), GfxError> {
        self.renderer_mut()?.add_model(model);
        Ok(())
    }

    pub fn remove_model(&mut self, id: ObjectId) -> Result<(), GfxError> {
        self.renderer_mut()?.remove_model(id);
        Ok(())
    }

    pub fn add_gui_element(&mut self, element: &Arc<dyn GuiElement>) -> Result<(), GfxError> {
        self.renderer_mut()?.add_gui_element(element);
        Ok(())
    }

    pub fn remove_gui_element(&mut self, id: ObjectId) -> Result<(), GfxError> {
        self.renderer_mut()?.remove_gui_element(id);
        Ok(())
    }

    pub fn add_light(&mut self, light: &Arc<dyn Light>) -> Result<(), GfxError> {
        self.renderer_mut()?.add_light(light);
        Ok(())
    }

    pub fn remove_light(&mut self, id: ObjectId) -> Result<(), GfxError> {
        self.renderer_mut()?.remove_light(id);
        Ok(())
    }

    pub fn set_sky(&mut self, sky: Option<Arc<dyn Sky>>) -> Result<(), GfxError> {
        self.renderer_mut()?.set_sky(sky);
        Ok(())
    }

    pub fn set_camera(&mut self, camera: Arc<dyn Camera>) -> Result<(), GfxError> {
        self.renderer_mut()?.set_camera(camera);
        Ok(())
    }

    /// Loads `ambiance_presets/<id>.xml` and makes it the frame's ambiance.
    /// A missing preset surfaces as [`GfxError::ResourceNotFound`].
    pub fn set_ambiance_state(&mut self, id: &str) -> Result<(), GfxError> {
        let renderer = self.renderer.as_deref_mut().ok_or(GfxError::NotInitialized)?;
        let name = format!("ambiance_presets/{id}.xml");
        let stream = self.resources.open(&name)?;
        let ambiance = AmbianceState::from_reader(stream)?;
        debug!("loaded ambiance {name}");
        renderer.set_ambiance_state(ambiance);
        Ok(())
    }

    pub fn set_current_video_frame(&mut self, frame: Option<Uuid>) -> Result<(), GfxError> {
        self.renderer_mut()?.set_current_video_frame(frame);
        Ok(())
    }

    /// Creates a texture of the decoder's type and loads the decoded image
    /// into it.
    pub fn create_texture(
        &mut self,
        decoder: Box<dyn ImageDecoder>,
        label: &str,
    ) -> Result<TexturePtr, GfxError> {
        let texture = self
            .renderer_mut()?
            .create_texture(decoder.texture_type(), label)?;
        texture.load(decoder)?;
        Ok(texture)
    }

    /// Creates a 2D texture with storage but no contents.
    pub fn create_empty_texture_2d(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        label: &str,
    ) -> Result<TexturePtr, GfxError> {
        let texture = self
            .renderer_mut()?
            .create_texture(TextureType::Texture2D, label)?;
        texture.allocate(format, width, height)?;
        Ok(texture)
    }

    pub fn create_proxy_texture(&mut self) -> Result<ProxyTexturePtr, GfxError> {
        Ok(self.renderer_mut()?.create_proxy_texture())
    }

    /// Creates a buffer holding `data`.
    pub fn create_buffer(
        &mut self,
        data: Vec<u8>,
        buffer_type: BufferType,
        modifiable: bool,
    ) -> Result<BufferPtr, GfxError> {
        let buffer = self.create_empty_buffer(buffer_type, modifiable)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    pub fn create_empty_buffer(
        &mut self,
        buffer_type: BufferType,
        modifiable: bool,
    ) -> Result<BufferPtr, GfxError> {
        self.renderer_mut()?.create_buffer(buffer_type, modifiable)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_attribute_object(
        &mut self,
        shader: &str,
        stage: &str,
        properties: u32,
        attributes: &[VertexAttribute],
        vertex_buffer: BufferPtr,
        offset: u32,
        label: &str,
    ) -> Result<AttributeObjectPtr, GfxError> {
        self.renderer_mut()?.create_attribute_object(
            shader,
            stage,
            properties,
            attributes,
            vertex_buffer,
            offset,
            label,
        )
    }

    /// Slot of `name` in a shader variant, `Ok(None)` when the variant has
    /// no such uniform.
    pub fn get_uniform_index(
        &self,
        shader: &str,
        stage: &str,
        properties: u32,
        name: &str,
    ) -> Result<Option<u32>, GfxError> {
        Ok(self
            .renderer()?
            .get_uniform_index(shader, stage, properties, name))
    }

    pub fn is_loading(&self) -> Result<bool, GfxError> {
        Ok(self.renderer()?.is_loading())
    }

    /// Updates and draws one frame.
    pub fn draw_frame(&mut self) -> Result<(), GfxError> {
        let renderer = self.renderer_mut()?;
        renderer.update();
        renderer.draw_frame()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), GfxError> {
        self.renderer_mut()?.resize(width, height);
        Ok(())
    }
}
