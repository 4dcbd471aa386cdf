//! Config categories: opcode tables, packing, unpacking, archives.
//!
//! Each category has one [`Format`] listing its opcodes. The packer and
//! the unpacker both walk that table, so an encoding and its decoding
//! cannot drift apart.
//!
//! # Invariants
//! - Every record is terminated by opcode 0.
//! - Every server record ends with opcode 250 carrying the debugname.
//! - Record `i` of an archive is the config with registry id `i`.
//! - Packing the same sources with the same registries is byte-identical.
//!
//! # Checksums
//! The compiled-in [`FROZEN`] table is empty. Strict verification only
//! covers categories whose expected CRC comes from the build configuration;
//! the rest pack as [`ChecksumOutcome::Unfrozen`].

pub mod archive;
pub mod checksum;
pub mod error;
pub mod field;
pub mod format;
pub mod pack;
pub mod rename;
mod tables;
pub mod unpack;
pub mod usage;
pub mod value;

pub use archive::{Archive, MAX_RECORDS, PackedCategory};
pub use checksum::{ChecksumGate, ChecksumOutcome, FROZEN};
pub use error::PackError;
pub use format::{Format, Op, Scope, Target};
pub use pack::{encode_record, pack, typed_records};
pub use rename::{MODEL_EXTENSION, Rename, RenamePlan};
pub use unpack::{DecodedRecord, Unpacked, Unpacker, server_debugname};
pub use usage::{ModelUsage, ModelUser};
pub use value::Value;
