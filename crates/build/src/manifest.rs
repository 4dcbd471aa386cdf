//! Integrity manifest for written archives.
//!
//! ```text
//! data/pack/
//!   manifest.json   - sha256, crc32 and size per archive file
//!   client/<category>.dat, <category>.idx
//!   server/<category>.dat, <category>.idx
//! ```

use crate::error::BuildError;
use contentpack_buffer::crc32;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the manifest's directory, `/`-separated.
    pub file: String,
    pub sha256: String,
    pub crc32: u32,
    pub bytes: u64,
}

impl ManifestEntry {
    pub fn of(file: impl Into<String>, data: &[u8]) -> Self {
        Self {
            file: file.into(),
            sha256: sha256_hex(data),
            crc32: crc32(data),
            bytes: data.len() as u64,
        }
    }
}

/// Entries sorted by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

impl IntegrityManifest {
    /// A missing manifest loads as empty.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path).map_err(BuildError::io(path))?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(BuildError::json(path))
    }

    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(BuildError::io(parent))?;
        }
        let file = std::fs::File::create(path).map_err(BuildError::io(path))?;
        serde_json::to_writer_pretty(file, self).map_err(BuildError::json(path))
    }

    pub fn get(&self, file: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.file == file)
    }

    /// Insert or replace the entry for `file`.
    pub fn record(&mut self, file: impl Into<String>, data: &[u8]) {
        let entry = ManifestEntry::of(file, data);
        match self.entries.binary_search_by(|e| e.file.cmp(&entry.file)) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Fails closed: a file missing from the manifest is an error.
    pub fn verify(&self, file: &str, data: &[u8]) -> Result<(), BuildError> {
        let entry = self.get(file).ok_or_else(|| BuildError::Unrecorded {
            file: file.to_string(),
        })?;
        let actual = sha256_hex(data);
        if entry.sha256 != actual {
            return Err(BuildError::IntegrityMismatch {
                file: file.to_string(),
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Manifest key of `path` relative to `base`.
pub fn manifest_key(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
