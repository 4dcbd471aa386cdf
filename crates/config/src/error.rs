use contentpack_buffer::BufferError;
use contentpack_common::Category;
use contentpack_model::ModelError;
use contentpack_registry::RegistryError;
use contentpack_source::{ParseError, SourceError};
use std::path::PathBuf;

/// Errors from packing, unpacking, and archive handling.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{category} [{debugname}] {key}: {message}")]
    Encode {
        category: Category,
        debugname: String,
        key: String,
        message: String,
    },

    #[error("{category} record {id} is {len} bytes, larger than an index entry allows")]
    RecordTooLarge {
        category: Category,
        id: usize,
        len: usize,
    },

    #[error("{category}: an archive index holds at most {max} records")]
    TooManyRecords { category: Category, max: usize },

    #[error("{category} record {id}: unknown opcode {opcode} at offset {offset}")]
    UnknownOpcode {
        category: Category,
        id: u16,
        opcode: u8,
        offset: usize,
    },

    #[error("{category} record {id} is truncated: {source}")]
    Truncated {
        category: Category,
        id: u16,
        source: BufferError,
    },

    #[error("{category} archive is corrupt: {message}")]
    CorruptArchive { category: Category, message: String },

    #[error("{category} checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        category: Category,
        expected: u32,
        actual: u32,
    },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
