use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use awe_graphics::render::manifest::ShaderManifest;
use awe_graphics::render::resources::BufferStorage;
use awe_graphics::{
    AmbianceState, AttributeObject, AttributeObjectPtr, Buffer, BufferPtr, BufferType,
    ConvertedProgram, GfxError, GraphicsManager, ImageDecoder, MemoryResources, MeshPart, Model,
    ObjectId, Program, RenderState, Renderer, Surface, SurfaceDecoder, Texture, TextureFormat,
    TexturePtr, TextureType, Tracked, VertexAttribute,
};
use glam::{Mat4, Vec3, Vec4};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use uuid::Uuid;

static MANIFEST: Lazy<ShaderManifest> = Lazy::new(|| {
    ShaderManifest::from_xml(
        r#"<shader name="mesh">
  <program stage="material" source="mesh.wgsl" vsUniforms="8" psUniforms="4">
    <attribute type="position" name="in_POSITION0" location="0"/>
    <sampler name="ps_sampler0" alias="diffuseMap" binding="2"/>
    <symbol name="g_mWorldViewProj" shader="vertex" index="4"/>
    <symbol name="g_vFogColor" shader="pixel" index="1"/>
  </program>
</shader>"#,
    )
    .unwrap()
});

/// Uniform table resolving `vs_uniforms_vec4[i]` to `i` and
/// `ps_uniforms_vec4[i]` to `100 + i`.
struct TableProgram {
    uniforms: HashMap<String, u32>,
}

impl TableProgram {
    fn new() -> Self {
        let mut uniforms = HashMap::new();
        for i in 0..8 {
            uniforms.insert(format!("vs_uniforms_vec4[{i}]"), i);
        }
        for i in 0..4 {
            uniforms.insert(format!("ps_uniforms_vec4[{i}]"), 100 + i);
        }
        uniforms.insert("ps_sampler0".to_string(), 200);
        Self { uniforms }
    }
}

impl Program for TableProgram {
    fn attribute_location(&self, name: &str) -> Option<u32> {
        (name == "in_POSITION0").then_some(0)
    }

    fn uniform_location(&self, name: &str) -> Option<u32> {
        self.uniforms.get(name).copied()
    }

    fn set_uniform4f(&mut self, _location: u32, _value: Vec4) {}
}

struct HeadlessTexture {
    id: Uuid,
    texture_type: TextureType,
    label: String,
    surface: RwLock<Option<Surface>>,
}

impl Texture for HeadlessTexture {
    fn id(&self) -> Uuid {
        self.id
    }

    fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    fn format(&self) -> Option<TextureFormat> {
        self.surface.read().as_ref().map(Surface::format)
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn load(&self, decoder: Box<dyn ImageDecoder>) -> Result<(), GfxError> {
        let surface = decoder.decode()?;
        if surface.texture_type() != self.texture_type {
            return Err(GfxError::TextureTypeMismatch {
                expected: self.texture_type,
                found: surface.texture_type(),
            });
        }
        *self.surface.write() = Some(surface);
        Ok(())
    }

    fn allocate(&self, format: TextureFormat, width: u32, height: u32) -> Result<(), GfxError> {
        *self.surface.write() = Some(Surface::new_2d(width, height, format));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct HeadlessBuffer {
    storage: RwLock<BufferStorage>,
}

impl Buffer for HeadlessBuffer {
    fn buffer_type(&self) -> BufferType {
        self.storage.read().buffer_type()
    }

    fn is_modifiable(&self) -> bool {
        self.storage.read().is_modifiable()
    }

    fn write(&self, data: Vec<u8>) -> Result<(), GfxError> {
        self.storage.write().write(data).map(|_| ())
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

struct HeadlessAttributeObject {
    attributes: Vec<VertexAttribute>,
    vertex_buffer: BufferPtr,
    offset: u32,
}

impl AttributeObject for HeadlessAttributeObject {
    fn shader(&self) -> &str {
        "mesh"
    }

    fn stage(&self) -> &str {
        "material"
    }

    fn properties(&self) -> u32 {
        0
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
        "headless"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What the last drawn frame was rendered with.
#[derive(Debug, Clone, PartialEq)]
struct FrameRecord {
    ambiance: AmbianceState,
    video_frame: Option<Uuid>,
}

type LastFrame = Arc<RwLock<Option<FrameRecord>>>;

/// Renderer that records what it would draw instead of touching a GPU.
struct HeadlessRenderer {
    state: RenderState,
    program: ConvertedProgram<TableProgram>,
    frames: Arc<AtomicUsize>,
    drawn_models: Arc<AtomicUsize>,
    last_frame: LastFrame,
    updated: bool,
}

impl HeadlessRenderer {
    fn new(
        frames: Arc<AtomicUsize>,
        drawn_models: Arc<AtomicUsize>,
        last_frame: LastFrame,
    ) -> Self {
        Self {
            state: RenderState::default(),
            program: ConvertedProgram::new(TableProgram::new(), MANIFEST.programs[0].mappings()),
            frames,
            drawn_models,
            last_frame,
            updated: false,
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn state(&self) -> &RenderState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }

    fn create_texture(
        &mut self,
        texture_type: TextureType,
        label: &str,
    ) -> Result<TexturePtr, GfxError> {
        Ok(Arc::new(HeadlessTexture {
            id: Uuid::new_v4(),
            texture_type,
            label: label.to_string(),
            surface: RwLock::new(None),
        }))
    }

    fn create_buffer(
        &mut self,
        buffer_type: BufferType,
        modifiable: bool,
    ) -> Result<BufferPtr, GfxError> {
        Ok(Arc::new(HeadlessBuffer {
            storage: RwLock::new(BufferStorage::new(buffer_type, modifiable)),
        }))
    }

    fn create_attribute_object(
        &mut self,
        shader: &str,
        stage: &str,
        properties: u32,
        attributes: &[VertexAttribute],
        vertex_buffer: BufferPtr,
        offset: u32,
        _label: &str,
    ) -> Result<AttributeObjectPtr, GfxError> {
        if shader != "mesh" || stage != "material" || properties != 0 {
            return Err(GfxError::UnknownProgram {
                shader: shader.to_string(),
                stage: stage.to_string(),
                properties,
            });
        }
        Ok(Arc::new(HeadlessAttributeObject {
            attributes: attributes.to_vec(),
            vertex_buffer,
            offset,
        }))
    }

    fn get_uniform_index(
        &self,
        shader: &str,
        stage: &str,
        properties: u32,
        name: &str,
    ) -> Option<u32> {
        if (shader, stage, properties) != ("mesh", "material", 0) {
            return None;
        }
        self.program.get_uniform_location(name)
    }

    fn update(&mut self) {
        self.state.prune();
        self.updated = true;
    }

    fn draw_frame(&mut self) -> Result<(), GfxError> {
        assert!(self.updated, "draw_frame called before update");
        self.updated = false;
        let drawn = self
            .state
            .models
            .live()
            .filter(|model| model.is_visible())
            .count();
        self.drawn_models.fetch_add(drawn, Ordering::SeqCst);
        self.frames.fetch_add(1, Ordering::SeqCst);
        *self.last_frame.write() = Some(FrameRecord {
            ambiance: self.state.ambiance,
            video_frame: self.state.current_video_frame,
        });
        Ok(())
    }

    fn resize(&mut self, _width: u32, _height: u32) {}
}

struct Crate {
    id: ObjectId,
}

impl Tracked for Crate {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl Model for Crate {
    fn transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::X)
    }

    fn parts(&self) -> Vec<MeshPart> {
        Vec::new()
    }
}

const DAY: &str = r#"<ambiance>
  <skyColor>128 160 255</skyColor>
  <exposure>1.5</exposure>
</ambiance>"#;

struct Fixture {
    graphics: GraphicsManager,
    frames: Arc<AtomicUsize>,
    drawn_models: Arc<AtomicUsize>,
    last_frame: LastFrame,
}

impl Fixture {
    fn drawn(&mut self) -> FrameRecord {
        self.graphics.draw_frame().unwrap();
        self.last_frame.read().clone().unwrap()
    }
}

fn fixture() -> Fixture {
    let resources = MemoryResources::new()
        .with("ambiance_presets/day.xml", DAY)
        .with("ambiance_presets/broken.xml", "<sky/>");
    let mut graphics = GraphicsManager::new(Arc::new(resources));
    let frames = Arc::new(AtomicUsize::new(0));
    let drawn_models = Arc::new(AtomicUsize::new(0));
    let last_frame = LastFrame::default();
    graphics
        .init_with(Box::new(HeadlessRenderer::new(
            Arc::clone(&frames),
            Arc::clone(&drawn_models),
            Arc::clone(&last_frame),
        )))
        .unwrap();
    Fixture {
        graphics,
        frames,
        drawn_models,
        last_frame,
    }
}

#[test]
fn second_initialization_fails_and_keeps_first_renderer() {
    let mut fixture = fixture();
    let intruder_frames = Arc::new(AtomicUsize::new(0));
    let err = fixture
        .graphics
        .init_with(Box::new(HeadlessRenderer::new(
            Arc::clone(&intruder_frames),
            Arc::new(AtomicUsize::new(0)),
            LastFrame::default(),
        )))
        .unwrap_err();
    assert!(matches!(err, GfxError::AlreadyInitialized));
    assert_eq!(err.to_string(), "Renderer already initialized");

    fixture.graphics.draw_frame().unwrap();
    assert_eq!(fixture.frames.load(Ordering::SeqCst), 1);
    assert_eq!(intruder_frames.load(Ordering::SeqCst), 0);
}

#[test]
fn calls_before_initialization_fail() {
    let mut graphics = GraphicsManager::new(Arc::new(MemoryResources::new()));
    assert!(!graphics.is_initialized());
    assert!(matches!(graphics.draw_frame(), Err(GfxError::NotInitialized)));
    assert!(matches!(
        graphics.create_empty_buffer(BufferType::Index, true),
        Err(GfxError::NotInitialized)
    ));
}

#[test]
fn create_buffer_stores_the_payload() {
    let mut fixture = fixture();
    let buffer = fixture
        .graphics
        .create_buffer(vec![0x01, 0x02], BufferType::Vertex, false)
        .unwrap();
    assert_eq!(buffer.contents(), vec![0x01, 0x02]);
    assert_eq!(buffer.buffer_type(), BufferType::Vertex);
    assert!(matches!(buffer.write(vec![0x03]), Err(GfxError::ImmutableBuffer)));
}

#[test]
fn create_empty_buffer_has_no_payload() {
    let mut fixture = fixture();
    let buffer = fixture
        .graphics
        .create_empty_buffer(BufferType::Uniform, true)
        .unwrap();
    assert!(buffer.is_empty());
    buffer.write(vec![9; 16]).unwrap();
    assert_eq!(buffer.len(), 16);
}

#[test]
fn create_texture_consumes_the_decoder() {
    let mut fixture = fixture();
    let mut surface = Surface::new_2d(2, 2, TextureFormat::Rgba8);
    surface.data_mut(0)[0] = 0xff;
    let texture = fixture
        .graphics
        .create_texture(Box::new(SurfaceDecoder::new(surface)), "checker")
        .unwrap();

    assert_eq!(texture.texture_type(), TextureType::Texture2D);
    assert_eq!(texture.format(), Some(TextureFormat::Rgba8));
    assert_eq!(texture.label(), "checker");
    let headless = texture.as_any().downcast_ref::<HeadlessTexture>().unwrap();
    let guard = headless.surface.read();
    assert_eq!(guard.as_ref().unwrap().data(0)[0], 0xff);
}

#[test]
fn create_texture_uses_the_decoder_type() {
    let mut fixture = fixture();
    let texture = fixture
        .graphics
        .create_texture(
            Box::new(SurfaceDecoder::new(Surface::new_cube(4, TextureFormat::Rgba8))),
            "sky",
        )
        .unwrap();
    assert_eq!(texture.texture_type(), TextureType::Cubemap);
}

#[test]
fn empty_texture_is_allocated_in_2d() {
    let mut fixture = fixture();
    let texture = fixture
        .graphics
        .create_empty_texture_2d(TextureFormat::Bgra8, 64, 32, "target")
        .unwrap();
    assert_eq!(texture.texture_type(), TextureType::Texture2D);
    assert_eq!(texture.format(), Some(TextureFormat::Bgra8));
}

#[test]
fn ambiance_is_loaded_by_preset_name() {
    let mut fixture = fixture();
    assert_eq!(fixture.drawn().ambiance, AmbianceState::default());

    fixture.graphics.set_ambiance_state("day").unwrap();
    let ambiance = fixture.drawn().ambiance;
    assert_eq!(ambiance.sky_color, Vec3::new(128.0, 160.0, 255.0) / 255.0);
    assert_eq!(ambiance.exposure, 1.5);
    assert_eq!(ambiance.fog_far, AmbianceState::default().fog_far);
}

#[test]
fn missing_ambiance_preset_is_not_masked() {
    let mut fixture = fixture();
    fixture.graphics.set_ambiance_state("day").unwrap();
    let err = fixture.graphics.set_ambiance_state("night").unwrap_err();
    assert!(
        matches!(err, GfxError::ResourceNotFound(ref name) if name == "ambiance_presets/night.xml")
    );
    assert_eq!(fixture.drawn().ambiance.exposure, 1.5);
}

#[test]
fn malformed_ambiance_preset_is_reported() {
    let mut fixture = fixture();
    let err = fixture.graphics.set_ambiance_state("broken").unwrap_err();
    assert!(matches!(err, GfxError::Ambiance(_)));
}

#[test]
fn uniform_index_resolves_symbols_and_sampler_aliases() {
    let fixture = fixture();
    let graphics = &fixture.graphics;
    assert_eq!(
        graphics
            .get_uniform_index("mesh", "material", 0, "g_mWorldViewProj")
            .unwrap(),
        Some(4)
    );
    assert_eq!(
        graphics
            .get_uniform_index("mesh", "material", 0, "g_vFogColor")
            .unwrap(),
        Some(101)
    );
    assert_eq!(
        graphics
            .get_uniform_index("mesh", "material", 0, "diffuseMap")
            .unwrap(),
        Some(200)
    );
    assert_eq!(
        graphics
            .get_uniform_index("mesh", "material", 0, "g_unknown")
            .unwrap(),
        None
    );
    assert_eq!(
        graphics
            .get_uniform_index("mesh", "material", 0, "g_mWorldViewProj")
            .unwrap(),
        graphics
            .get_uniform_index("mesh", "material", 0, "g_mWorldViewProj")
            .unwrap()
    );
}

#[test]
fn models_are_drawn_until_removed_or_dropped() {
    let mut fixture = fixture();
    let kept: Arc<dyn Model> = Arc::new(Crate {
        id: ObjectId::next(),
    });
    let dropped: Arc<dyn Model> = Arc::new(Crate {
        id: ObjectId::next(),
    });
    fixture.graphics.add_model(&kept).unwrap();
    fixture.graphics.add_model(&kept).unwrap();
    fixture.graphics.add_model(&dropped).unwrap();

    fixture.graphics.draw_frame().unwrap();
    assert_eq!(fixture.drawn_models.load(Ordering::SeqCst), 2);

    drop(dropped);
    fixture.graphics.draw_frame().unwrap();
    assert_eq!(fixture.drawn_models.load(Ordering::SeqCst), 3);

    fixture.graphics.remove_model(kept.id()).unwrap();
    fixture.graphics.remove_model(kept.id()).unwrap();
    fixture.graphics.draw_frame().unwrap();
    assert_eq!(fixture.drawn_models.load(Ordering::SeqCst), 3);
}

#[test]
fn proxy_textures_keep_the_renderer_loading() {
    let mut fixture = fixture();
    assert!(!fixture.graphics.is_loading().unwrap());

    let proxy = fixture.graphics.create_proxy_texture().unwrap();
    assert!(fixture.graphics.is_loading().unwrap());

    let frame = fixture
        .graphics
        .create_empty_texture_2d(TextureFormat::Rgba8, 4, 4, "video")
        .unwrap();
    proxy.assign(Arc::clone(&frame));
    assert!(!fixture.graphics.is_loading().unwrap());
}

#[test]
fn current_video_frame_reaches_the_renderer() {
    let mut fixture = fixture();
    assert_eq!(fixture.drawn().video_frame, None);

    let frame = fixture
        .graphics
        .create_empty_texture_2d(TextureFormat::Rgba8, 4, 4, "video")
        .unwrap();
    fixture
        .graphics
        .set_current_video_frame(Some(frame.id()))
        .unwrap();
    assert_eq!(fixture.drawn().video_frame, Some(frame.id()));

    fixture.graphics.set_current_video_frame(None).unwrap();
    assert_eq!(fixture.drawn().video_frame, None);
}

#[test]
fn attribute_objects_need_a_known_program() {
    let mut fixture = fixture();
    let vertices = fixture
        .graphics
        .create_buffer(vec![0; 12], BufferType::Vertex, false)
        .unwrap();
    let object = fixture
        .graphics
        .create_attribute_object("mesh", "material", 0, &[], Arc::clone(&vertices), 0, "quad")
        .unwrap();
    assert_eq!(object.vertex_buffer().contents(), vec![0; 12]);

    let err = fixture
        .graphics
        .create_attribute_object("water", "material", 0, &[], vertices, 0, "lake")
        .err()
        .unwrap();
    assert!(matches!(err, GfxError::UnknownProgram { .. }));
}
