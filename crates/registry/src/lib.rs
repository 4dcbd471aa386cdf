//! Name/id registries.
//!
//! # Invariants
//! - No name maps to two ids and no id maps to two names.
//! - The allocation watermark never decreases.
//! - Saved registry files are byte-for-byte deterministic.

mod error;
mod registry;
mod set;

pub use error::RegistryError;
pub use registry::{MAX_ID, NameRegistry};
pub use set::{Registries, pack_path};
