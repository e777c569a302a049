use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::GfxError;

/// Resolves resource names such as `ambiance_presets/day.xml` to byte
/// streams.
pub trait ResourceProvider {
    /// Opens `name`, failing with [`GfxError::ResourceNotFound`] when it does
    /// not exist.
    fn open(&self, name: &str) -> Result<Box<dyn Read>, GfxError>;

    fn exists(&self, name: &str) -> bool;
}

/// Resources stored as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        // Names may not climb out of the root.
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ResourceProvider for DirectoryResources {
    fn open(&self, name: &str) -> Result<Box<dyn Read>, GfxError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| GfxError::ResourceNotFound(name.to_string()))?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(GfxError::ResourceNotFound(name.to_string()))
            }
            Err(source) => Err(GfxError::ResourceIo {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some_and(|path| path.is_file())
    }
}

/// Resources held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let data: Vec<u8> = data.into();
        self.files.insert(name.into(), Arc::from(data.into_boxed_slice()));
    }

    pub fn with(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }
}

impl ResourceProvider for MemoryResources {
    fn open(&self, name: &str) -> Result<Box<dyn Read>, GfxError> {
        let data = self
            .files
            .get(name)
            .ok_or_else(|| GfxError::ResourceNotFound(name.to_string()))?;
        Ok(Box::new(Cursor::new(Arc::clone(data))))
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}
