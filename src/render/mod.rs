pub mod manifest;
pub mod native;
pub mod program;
pub mod resources;

use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::ambiance::AmbianceState;
use crate::error::GfxError;
use crate::format::TextureType;
use crate::scene::{Camera, GuiElement, Light, Model, ObjectId, SceneRegistry, Sky};
use crate::vertex::VertexAttribute;

pub use native::WgpuRenderer;
pub use resources::{
    AttributeObject, AttributeObjectPtr, Buffer, BufferPtr, BufferType, ProxyTexture,
    ProxyTexturePtr, Texture, TexturePtr,
};

/// Scene bookkeeping that is identical across backends.
#[derive(Default)]
pub struct RenderState {
    pub camera: Option<Arc<dyn Camera>>,
    pub ambiance: AmbianceState,
    pub current_video_frame: Option<Uuid>,
    pub models: SceneRegistry<dyn Model>,
    pub gui_elements: SceneRegistry<dyn GuiElement>,
    pub lights: SceneRegistry<dyn Light>,
    pub sky: Option<Arc<dyn Sky>>,
    proxies: Vec<Weak<ProxyTexture>>,
}

impl RenderState {
    /// Drops registry entries and proxies whose owners have released them.
    pub fn prune(&mut self) -> usize {
        let before = self.proxies.len();
        self.proxies.retain(|proxy| proxy.strong_count() > 0);
        (before - self.proxies.len())
            + self.models.prune()
            + self.gui_elements.prune()
            + self.lights.prune()
    }

    pub fn track_proxy(&mut self, proxy: &ProxyTexturePtr) {
        self.proxies.push(Arc::downgrade(proxy));
    }

    /// True while a live proxy texture has not been pointed at its texture.
    pub fn has_pending_proxies(&self) -> bool {
        self.proxies
            .iter()
            .filter_map(Weak::upgrade)
            .any(|proxy| !proxy.is_resolved())
    }
}

/// A rendering backend.
///
/// Scene objects are shared with the renderer, never handed over: it keeps
/// weak references and skips anything its owner has dropped. Resource
/// handles are created empty and filled through their own `load`/`write`.
pub trait Renderer {
    fn state(&self) -> &RenderState;
    fn state_mut(&mut self) -> &mut RenderState;

    /// Starts drawing `model`. Adding a model twice keeps one entry.
    fn add_model(&mut self, model: &Arc<dyn Model>) {
        self.state_mut().models.insert(model);
    }

    /// Stops drawing the model with `id`. Unknown ids are ignored.
    fn remove_model(&mut self, id: ObjectId) {
        self.state_mut().models.remove(id);
    }

    fn add_gui_element(&mut self, element: &Arc<dyn GuiElement>) {
        self.state_mut().gui_elements.insert(element);
    }

    fn remove_gui_element(&mut self, id: ObjectId) {
        self.state_mut().gui_elements.remove(id);
    }

    fn add_light(&mut self, light: &Arc<dyn Light>) {
        self.state_mut().lights.insert(light);
    }

    fn remove_light(&mut self, id: ObjectId) {
        self.state_mut().lights.remove(id);
    }

    fn set_sky(&mut self, sky: Option<Arc<dyn Sky>>) {
        self.state_mut().sky = sky;
    }

    /// Replaces the active camera. It is only queried while drawing.
    fn set_camera(&mut self, camera: Arc<dyn Camera>) {
        self.state_mut().camera = Some(camera);
    }

    fn set_ambiance_state(&mut self, ambiance: AmbianceState) {
        self.state_mut().ambiance = ambiance;
    }

    /// Selects the texture composited over the frame, by texture id.
    fn set_current_video_frame(&mut self, frame: Option<Uuid>) {
        self.state_mut().current_video_frame = frame;
    }

    fn create_proxy_texture(&mut self) -> ProxyTexturePtr {
        let proxy = Arc::new(ProxyTexture::new());
        self.state_mut().track_proxy(&proxy);
        proxy
    }

    fn is_loading(&self) -> bool {
        self.state().has_pending_proxies()
    }

    fn create_texture(
        &mut self,
        texture_type: TextureType,
        label: &str,
    ) -> Result<TexturePtr, GfxError>;

    fn create_buffer(
        &mut self,
        buffer_type: BufferType,
        modifiable: bool,
    ) -> Result<BufferPtr, GfxError>;

    #[allow(clippy::too_many_arguments)]
    fn create_attribute_object(
        &mut self,
        shader: &str,
        stage: &str,
        properties: u32,
        attributes: &[VertexAttribute],
        vertex_buffer: BufferPtr,
        offset: u32,
        label: &str,
    ) -> Result<AttributeObjectPtr, GfxError>;

    /// Slot of uniform `name` in one shader variant. Deterministic for
    /// identical arguments.
    fn get_uniform_index(
        &self,
        shader: &str,
        stage: &str,
        properties: u32,
        name: &str,
    ) -> Option<u32>;

    /// Advances time-dependent state. Called once per frame before
    /// [`Renderer::draw_frame`].
    fn update(&mut self);

    fn draw_frame(&mut self) -> Result<(), GfxError>;

    fn resize(&mut self, width: u32, height: u32);
}
