use crate::error::ModelError;
use crate::model::Model;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

type Decoded = Result<Arc<Model>, ModelError>;

#[derive(Debug)]
enum ModelSource {
    File(PathBuf),
    Blob(Arc<[u8]>),
}

#[derive(Debug)]
struct Entry {
    source: ModelSource,
    decoded: OnceLock<Decoded>,
}

impl Entry {
    fn new(source: ModelSource) -> Self {
        Self {
            source,
            decoded: OnceLock::new(),
        }
    }

    fn get(&self, id: u16) -> Decoded {
        self.decoded
            .get_or_init(|| {
                let decoded = match &self.source {
                    ModelSource::File(path) => std::fs::read(path)
                        .map_err(|e| ModelError::Io {
                            path: path.clone(),
                            message: e.to_string(),
                        })
                        .and_then(|data| Model::decode(&data)),
                    ModelSource::Blob(data) => Model::decode(data),
                };
                tracing::trace!(id, ok = decoded.is_ok(), "decoded model");
                decoded.map(Arc::new)
            })
            .clone()
    }
}

/// Decoded models keyed by model id.
///
/// Each id is decoded at most once, on first access. Entries synchronize
/// independently so [`ModelStore::preload`] can decode on several threads.
#[derive(Debug, Default)]
pub struct ModelStore {
    entries: BTreeMap<u16, Entry>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Models read lazily from files.
    pub fn from_paths(paths: impl IntoIterator<Item = (u16, PathBuf)>) -> Self {
        Self {
            entries: paths
                .into_iter()
                .map(|(id, path)| (id, Entry::new(ModelSource::File(path))))
                .collect(),
        }
    }

    /// Models decoded from in-memory blobs.
    pub fn from_blobs(blobs: impl IntoIterator<Item = (u16, Vec<u8>)>) -> Self {
        Self {
            entries: blobs
                .into_iter()
                .map(|(id, data)| (id, Entry::new(ModelSource::Blob(data.into()))))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    /// The decoded model, or `None` when the id has no source.
    pub fn get(&self, id: u16) -> Option<Decoded> {
        self.entries.get(&id).map(|entry| entry.get(id))
    }

    /// Decode every entry across up to `threads` scoped workers.
    ///
    /// Returns the first decode failure in id order.
    pub fn preload(&self, threads: usize) -> Result<(), ModelError> {
        let entries: Vec<(&u16, &Entry)> = self.entries.iter().collect();
        if entries.is_empty() {
            return Ok(());
        }
        let chunk = entries.len().div_ceil(threads.max(1));
        let _span = tracing::debug_span!("preload", models = entries.len(), chunk).entered();
        std::thread::scope(|scope| {
            for part in entries.chunks(chunk) {
                scope.spawn(move || {
                    for (id, entry) in part {
                        let _ = entry.get(**id);
                    }
                });
            }
        });
        for (id, entry) in entries {
            entry.get(*id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(x: i32) -> Vec<u8> {
        Model {
            vertex_x: vec![x],
            vertex_y: vec![0],
            vertex_z: vec![0],
            ..Model::default()
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn decodes_once_and_shares() {
        let store = ModelStore::from_blobs([(3, blob(7))]);
        let first = store.get(3).unwrap().unwrap();
        let second = store.get(3).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.vertex_x, [7]);
        assert!(store.get(4).is_none());
    }

    #[test]
    fn preload_in_parallel() {
        let store = ModelStore::from_blobs((0..40u16).map(|id| (id, blob(id as i32))));
        store.preload(4).unwrap();
        for id in 0..40u16 {
            assert_eq!(store.get(id).unwrap().unwrap().vertex_x, [id as i32]);
        }
    }

    #[test]
    fn preload_reports_bad_blob() {
        let store = ModelStore::from_blobs([(0, blob(1)), (1, vec![1, 2, 3])]);
        assert!(matches!(
            store.preload(2),
            Err(ModelError::MissingTrailer { len: 3, .. })
        ));
    }

    #[test]
    fn reads_files_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model_0.ob2");
        std::fs::write(&path, blob(-5)).unwrap();
        let store = ModelStore::from_paths([(0, path), (1, tmp.path().join("missing.ob2"))]);
        assert_eq!(store.get(0).unwrap().unwrap().vertex_x, [-5]);
        assert!(matches!(store.get(1), Some(Err(ModelError::Io { .. }))));
    }
}
