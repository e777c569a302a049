use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use glam::{Mat4, Vec2, Vec3};

use crate::render::program::{Location, UniformValue};
use crate::render::{AttributeObjectPtr, BufferPtr, ProxyTexturePtr, TexturePtr};

/// Stable identity of a caller-owned scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocates a process-unique identifier.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Implemented by every object the renderer tracks.
pub trait Tracked {
    fn id(&self) -> ObjectId;
}

/// Viewpoint the frame is rendered from. Read at draw time, not at
/// registration.
pub trait Camera {
    fn view(&self) -> Mat4;
    fn projection(&self) -> Mat4;
    fn position(&self) -> Vec3;
}

pub trait Model: Tracked {
    fn transform(&self) -> Mat4;
    fn parts(&self) -> Vec<MeshPart>;

    fn is_visible(&self) -> bool {
        true
    }
}

pub trait GuiElement: Tracked {
    /// Top-left corner in window pixels.
    fn position(&self) -> Vec2;
    fn parts(&self) -> Vec<MeshPart>;

    fn is_visible(&self) -> bool {
        true
    }
}

pub trait Light: Tracked {
    fn position(&self) -> Vec3;
    fn color(&self) -> Vec3;
    fn range(&self) -> f32;
}

/// Sky dome drawn before all models, centred on the camera.
pub trait Sky {
    fn parts(&self) -> Vec<MeshPart>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U16,
    U32,
}

/// Texture source bound to a sampler of a mesh part.
#[derive(Clone)]
pub enum TextureRef {
    Direct(TexturePtr),
    Proxy(ProxyTexturePtr),
}

impl TextureRef {
    /// The texture to bind this frame, if one is available yet.
    pub fn resolve(&self) -> Option<TexturePtr> {
        match self {
            TextureRef::Direct(texture) => Some(Arc::clone(texture)),
            TextureRef::Proxy(proxy) => proxy.resolve(),
        }
    }
}

/// A texture bound to the sampler named `sampler` (original or native name).
#[derive(Clone)]
pub struct TextureBinding {
    pub sampler: String,
    pub texture: TextureRef,
}

/// One indexed draw of a model, GUI element or sky.
#[derive(Clone)]
pub struct MeshPart {
    pub attribute_object: AttributeObjectPtr,
    pub index_buffer: BufferPtr,
    pub index_format: IndexFormat,
    pub first_index: u32,
    pub index_count: u32,
    pub textures: Vec<TextureBinding>,
    /// Material parameters, keyed by the slots `get_uniform_index` returns
    /// for this part's program variant. Written after the frame values.
    pub uniforms: Vec<(Location, UniformValue)>,
}

/// Non-owning set of tracked objects, ordered by id.
pub struct SceneRegistry<T: ?Sized> {
    entries: BTreeMap<ObjectId, Weak<T>>,
}

impl<T: ?Sized> Default for SceneRegistry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: ?Sized + Tracked> SceneRegistry<T> {
    /// Starts tracking `object`. Returns false if it was already tracked, in
    /// which case the registry is left with a single entry for it.
    pub fn insert(&mut self, object: &Arc<T>) -> bool {
        self.entries
            .insert(object.id(), Arc::downgrade(object))
            .is_none()
    }
}

impl<T: ?Sized> SceneRegistry<T> {
    /// Stops tracking `id`. Removing an id that is not tracked is a no-op.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live objects, in id order. Objects already dropped by their owner are
    /// skipped.
    pub fn live(&self) -> impl Iterator<Item = Arc<T>> + '_ {
        self.entries.values().filter_map(Weak::upgrade)
    }

    /// Forgets entries whose owner has dropped them. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lamp {
        id: ObjectId,
    }

    impl Tracked for Lamp {
        fn id(&self) -> ObjectId {
            self.id
        }
    }

    impl Light for Lamp {
        fn position(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn color(&self) -> Vec3 {
            Vec3::ONE
        }

        fn range(&self) -> f32 {
            10.0
        }
    }

    fn lamp() -> Arc<dyn Light> {
        Arc::new(Lamp {
            id: ObjectId::next(),
        })
    }

    #[test]
    fn re_adding_keeps_a_single_entry() {
        let mut registry = SceneRegistry::<dyn Light>::default();
        let light = lamp();
        assert!(registry.insert(&light));
        assert!(!registry.insert(&light));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn double_removal_is_a_no_op() {
        let mut registry = SceneRegistry::<dyn Light>::default();
        let light = lamp();
        registry.insert(&light);
        assert!(registry.remove(light.id()));
        assert!(!registry.remove(light.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_does_not_keep_objects_alive() {
        let mut registry = SceneRegistry::<dyn Light>::default();
        let kept = lamp();
        let dropped = lamp();
        registry.insert(&kept);
        registry.insert(&dropped);
        drop(dropped);
        assert_eq!(registry.live().count(), 1);
        assert_eq!(registry.prune(), 1);
        assert!(registry.contains(kept.id()));
    }

    #[test]
    fn object_ids_are_unique() {
        assert_ne!(ObjectId::next(), ObjectId::next());
    }
}
