//! Legacy mesh format.
//!
//! A model blob ends in an 18-byte trailer describing which per-face and
//! per-vertex arrays are present; section offsets are derived from it
//! front to back. Vertex coordinates and face indices are delta coded.

pub mod error;
pub mod metadata;
pub mod model;
pub mod store;

pub use error::ModelError;
pub use metadata::{ModelMetadata, PriorityLayout, TRAILER_LEN};
pub use model::{FACE_INVISIBLE, FACE_TEXTURED, FacePriorities, Model};
pub use store::ModelStore;
