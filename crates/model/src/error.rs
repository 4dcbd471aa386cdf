use contentpack_buffer::BufferError;
use std::path::PathBuf;

/// Errors from decoding or loading a model blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model blob is {len} bytes, shorter than the {trailer}-byte trailer")]
    MissingTrailer { len: usize, trailer: usize },
    #[error("model sections need {need} bytes but only {have} precede the trailer")]
    SectionOverflow { need: usize, have: usize },
    #[error("model has {count} {what}, more than the format allows")]
    TooLarge { what: &'static str, count: usize },
    #[error("malformed model data: {0}")]
    Buffer(#[from] BufferError),
    #[error("cannot read model {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}
