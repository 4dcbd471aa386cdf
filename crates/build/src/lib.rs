//! Build orchestration for the content compiler.
//!
//! A [`Builder`] runs the stage plan for one or more categories: asset
//! registries are synced from disk, config sources are parsed and their
//! names bound, then each category is packed, checksummed, saved, and
//! recorded in the integrity manifest.

pub mod builder;
pub mod config;
pub mod error;
pub mod manifest;
pub mod scheduler;
pub mod stages;

pub use builder::{
    BuildSummary, Builder, PackReport, UnpackOptions, UnpackReport, ValidateReport,
};
pub use config::{BuildConfig, CONFIG_FILE, Layout};
pub use error::BuildError;
pub use manifest::{IntegrityManifest, ManifestEntry};
pub use scheduler::should_build;
pub use stages::{Stage, plan};
