use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("unexpected end of data at offset {offset} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidString { offset: usize },

    #[error("value {value} does not fit a {kind} smart integer")]
    SmartOutOfRange { kind: &'static str, value: i32 },
}

pub type Result<T> = std::result::Result<T, BufferError>;
