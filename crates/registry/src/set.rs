use crate::error::RegistryError;
use crate::registry::NameRegistry;
use contentpack_common::Category;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Every category's registry for one build or unpack invocation.
///
/// Loaded once from a pack directory, passed explicitly to the parser,
/// packer, and unpacker, and saved per category when its stage completes.
#[derive(Debug, Clone)]
pub struct Registries {
    dir: PathBuf,
    registries: BTreeMap<Category, NameRegistry>,
}

impl Registries {
    /// Empty registries rooted at `dir`, without touching the filesystem.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            registries: Category::ALL
                .into_iter()
                .map(|c| (c, NameRegistry::new(c)))
                .collect(),
        }
    }

    /// Load `<dir>/<category>.pack` for every category.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let dir = dir.into();
        let mut registries = BTreeMap::new();
        for category in Category::ALL {
            let registry = NameRegistry::load(category, pack_path(&dir, category))?;
            tracing::debug!(%category, entries = registry.len(), "loaded registry");
            registries.insert(category, registry);
        }
        Ok(Self { dir, registries })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, category: Category) -> &NameRegistry {
        &self.registries[&category]
    }

    pub fn get_mut(&mut self, category: Category) -> &mut NameRegistry {
        self.registries
            .entry(category)
            .or_insert_with(|| NameRegistry::new(category))
    }

    /// Resolve a name referenced from another category.
    pub fn resolve(
        &self,
        category: Category,
        name: &str,
        referenced_by: Category,
    ) -> Result<u16, RegistryError> {
        self.get(category)
            .id(name)
            .ok_or_else(|| RegistryError::Unresolved {
                category,
                name: name.to_string(),
                referenced_by,
            })
    }

    /// Persist one category's registry.
    pub fn save(&self, category: Category) -> Result<(), RegistryError> {
        self.get(category).save(pack_path(&self.dir, category))
    }
}

/// Path of a category's registry file inside a pack directory.
pub fn pack_path(dir: &Path, category: Category) -> PathBuf {
    dir.join(format!("{}.pack", category.name()))
}
