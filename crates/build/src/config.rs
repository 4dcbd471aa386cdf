//! Build configuration, read from an optional `contentpack.json`.

use crate::error::BuildError;
use contentpack_common::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = "contentpack.json";

/// Directory layout. Relative paths are resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub scripts: PathBuf,
    pub pack: PathBuf,
    pub models: PathBuf,
    pub textures: PathBuf,
    pub anims: PathBuf,
    pub client: PathBuf,
    pub server: PathBuf,
    /// Reference cache decoded by `unpack`.
    pub unpack: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            scripts: "data/src/scripts".into(),
            pack: "data/src/pack".into(),
            models: "data/src/models".into(),
            textures: "data/src/textures".into(),
            anims: "data/src/anims".into(),
            client: "data/pack/client".into(),
            server: "data/pack/server".into(),
            unpack: "data/unpack".into(),
        }
    }
}

impl Layout {
    /// Every directory joined onto `root`.
    pub fn resolve(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| root.join(p);
        Self {
            scripts: join(&self.scripts),
            pack: join(&self.pack),
            models: join(&self.models),
            textures: join(&self.textures),
            anims: join(&self.anims),
            client: join(&self.client),
            server: join(&self.server),
            unpack: join(&self.unpack),
        }
    }

    /// Directory holding the files of an asset namespace.
    pub fn asset_dir(&self, category: Category) -> Option<&Path> {
        match category {
            Category::Model => Some(&self.models),
            Category::Anim => Some(&self.anims),
            Category::Texture => Some(&self.textures),
            _ => None,
        }
    }

    /// Integrity manifest, next to the client output directory.
    pub fn manifest(&self) -> PathBuf {
        self.client
            .parent()
            .unwrap_or(self.client.as_path())
            .join("manifest.json")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub layout: Layout,
    /// Abort on a checksum mismatch instead of warning.
    pub strict: bool,
    /// Expected client CRCs, replacing the compiled-in values.
    pub checksums: BTreeMap<Category, u32>,
    /// Rebuild even when outputs are newer than their inputs.
    pub force: bool,
    /// Model decoding threads.
    pub threads: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            strict: false,
            checksums: BTreeMap::new(),
            force: false,
            threads: 4,
        }
    }
}

impl BuildConfig {
    /// Read `<root>/contentpack.json`, or use defaults if it is absent.
    ///
    /// The returned layout is resolved against `root`.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, BuildError> {
        let root = root.as_ref();
        let path = root.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let file = std::fs::File::open(&path).map_err(BuildError::io(&path))?;
            let config: BuildConfig =
                serde_json::from_reader(std::io::BufReader::new(file)).map_err(BuildError::json(&path))?;
            tracing::debug!(path = %path.display(), "loaded build config");
            config
        } else {
            Self::default()
        };
        config.layout = config.layout.resolve(root);
        Ok(config)
    }

    /// Write this configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BuildError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(BuildError::io(path))?;
        serde_json::to_writer_pretty(file, self).map_err(BuildError::json(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::load(dir.path()).unwrap();
        assert_eq!(config.layout.scripts, dir.path().join("data/src/scripts"));
        assert_eq!(config.layout.manifest(), dir.path().join("data/pack/manifest.json"));
        assert!(!config.strict);
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "strict": true, "checksums": { "obj": 305419896 }, "layout": { "scripts": "src" } }"#,
        )
        .unwrap();
        let config = BuildConfig::load(dir.path()).unwrap();
        assert!(config.strict);
        assert_eq!(config.checksums.get(&Category::Obj), Some(&0x12345678));
        assert_eq!(config.layout.scripts, dir.path().join("src"));
        assert_eq!(config.layout.pack, dir.path().join("data/src/pack"));
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ strict: ").unwrap();
        let err = BuildConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            force: true,
            checksums: BTreeMap::from([(Category::SpotAnim, 7)]),
            ..BuildConfig::default()
        };
        config.save(dir.path().join(CONFIG_FILE)).unwrap();
        let loaded = BuildConfig::load(dir.path()).unwrap();
        assert!(loaded.force);
        assert_eq!(loaded.checksums, config.checksums);
    }
}
