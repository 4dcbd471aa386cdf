//! Shared types for the content compiler: content categories.

mod types;

pub use types::{Category, UnknownCategory};
