use contentpack_common::Category;
use std::path::PathBuf;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{category}: cannot bind {id}={name}: {conflict}")]
    DuplicateBinding {
        category: Category,
        id: u16,
        name: String,
        conflict: String,
    },
    #[error("{category}: id space exhausted")]
    Exhausted { category: Category },
    #[error("{referenced_by}: '{name}' is not a registered {category}")]
    Unresolved {
        category: Category,
        name: String,
        referenced_by: Category,
    },
}
