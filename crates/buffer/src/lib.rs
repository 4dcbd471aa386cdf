//! Byte-level primitives of the legacy cache format.
//!
//! All multi-byte integers are big-endian. Strings are terminated by a
//! newline byte. Smart integers take one byte for small values and two
//! bytes otherwise.

pub mod crc;
pub mod cursor;
pub mod error;

pub use crc::crc32;
pub use cursor::{Reader, Writer};
pub use error::{BufferError, Result};
