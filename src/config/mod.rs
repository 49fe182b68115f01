// src/config/mod.rs

//! Build file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a build file from disk (`loader.rs`).
//! - Validate it into a `BuildConfig` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_resolved};
pub use model::{BuildConfig, RawBuildConfig};
pub use validate::parse_duration;
