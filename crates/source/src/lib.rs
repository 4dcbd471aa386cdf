//! Config sources: crawling, record scanning, constant expansion, coercion.
//!
//! # Invariants
//! - Files are visited in lexicographic path order.
//! - Every error carries a file path and a 1-based line number.
//! - A debugname is defined at most once across all files of a category.

mod constants;
mod crawler;
mod error;
mod parser;

pub use constants::ConstantTable;
pub use crawler::{collect_files, read_source};
pub use error::{Location, ParseError, ParseErrorKind, SourceError};
pub use parser::{
    CoerceError, ConfigRecord, Property, RawProperty, RawRecord, Schema, SourceParser,
    coerce_record,
};
