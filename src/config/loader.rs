// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{BuildConfig, RawBuildConfig};
use crate::errors::Result;

/// Load a build file and return the raw `RawBuildConfig`.
///
/// This only performs TOML deserialization; it does **not** validate. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawBuildConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawBuildConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a build file and resolve a relative `working_dir` against the
/// directory containing it.
///
/// Still unvalidated, so callers can apply overrides first.
pub fn load_resolved(path: impl AsRef<Path>) -> Result<RawBuildConfig> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;
    raw.working_dir = raw
        .working_dir
        .map(|dir| resolve_against(&config_root_dir(path), dir));
    Ok(raw)
}

/// Load a build file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<BuildConfig> {
    BuildConfig::try_from(load_resolved(path)?)
}

/// Default build file name, looked up in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Build.toml")
}

/// Directory a build file's relative paths are resolved against.
///
/// A bare filename like `Build.toml` has an empty parent; that means the
/// current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_against(root: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() { dir } else { root.join(dir) }
}
