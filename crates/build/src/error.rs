use contentpack_common::Category;
use contentpack_config::PackError;
use contentpack_model::ModelError;
use contentpack_registry::RegistryError;
use contentpack_source::{ParseError, SourceError};
use std::path::PathBuf;

/// Errors from a build, unpack, or validate invocation.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0} is an asset namespace and has no config format")]
    NotConfig(Category),

    #[error("stage cycle among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("{file} is not recorded in the integrity manifest")]
    Unrecorded { file: String },

    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| Self::Json { path, source }
    }
}
