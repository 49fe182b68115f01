// src/exec/env.rs

//! Environment composition for launched processes.
//!
//! The child environment is computed as a plain map and handed to the spawn
//! call. The process-wide environment is only ever *read* here, so concurrent
//! launches can never observe each other's `PATH`.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

use tracing::trace;

/// The environment a single launch runs with.
///
/// Computed once per launch by [`compose`] and discarded after spawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    vars: BTreeMap<String, String>,
    /// Inherited variables that are not valid Unicode. They take no part in
    /// expansion and reach the child unchanged.
    opaque: Vec<(OsString, OsString)>,
}

impl ResolvedEnvironment {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The `PATH` the child will search for executables.
    pub fn path(&self) -> Option<&str> {
        self.get("PATH")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn opaque(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.opaque.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    /// Carry `vars` through to the child, except where a composed variable
    /// of the same name already takes precedence.
    pub fn with_opaque(mut self, vars: Vec<(OsString, OsString)>) -> Self {
        self.opaque = vars
            .into_iter()
            .filter(|(k, _)| k.to_str().is_none_or(|k| !self.vars.contains_key(k)))
            .collect();
        self
    }

}

/// Snapshot the current process environment.
///
/// Variables whose name or value is not valid UTF-8 are left out; see
/// [`non_unicode_environment`].
pub fn process_environment() -> BTreeMap<String, String> {
    split_environment(std::env::vars_os()).0
}

/// The inherited variables [`process_environment`] leaves out.
pub fn non_unicode_environment() -> Vec<(OsString, OsString)> {
    split_environment(std::env::vars_os()).1
}

fn split_environment(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> (BTreeMap<String, String>, Vec<(OsString, OsString)>) {
    let mut unicode = BTreeMap::new();
    let mut opaque = Vec::new();
    for (key, value) in vars {
        match (key.to_str(), value.to_str()) {
            (Some(k), Some(v)) => {
                unicode.insert(k.to_string(), v.to_string());
            }
            _ => opaque.push((key, value)),
        }
    }
    (unicode, opaque)
}

/// Compose a child environment.
///
/// - `path_override` replaces `PATH` outright; it is never appended to. An
///   override that wants the inherited value must say `$PATH` itself.
/// - `overlay` is merged on top and wins on key collisions.
/// - Every value then has `$VAR` / `${VAR}` references expanded against the
///   composed map. A variable referring to itself (directly or through a
///   cycle) sees its value from `base`. Unknown variables stay literal.
pub fn compose(
    base: &BTreeMap<String, String>,
    overlay: &BTreeMap<String, String>,
    path_override: Option<&str>,
) -> ResolvedEnvironment {
    let mut raw = base.clone();
    if let Some(path) = path_override {
        raw.insert("PATH".to_string(), path.to_string());
    }
    for (key, value) in overlay {
        raw.insert(key.clone(), value.clone());
    }

    let mut expander = Expander {
        raw: &raw,
        base,
        done: BTreeMap::new(),
        in_progress: Vec::new(),
    };

    let keys: Vec<String> = raw.keys().cloned().collect();
    for key in &keys {
        expander.resolve(key);
    }

    let vars = expander.done;
    trace!(vars = vars.len(), "composed child environment");
    ResolvedEnvironment {
        vars,
        opaque: Vec::new(),
    }
}

struct Expander<'a> {
    raw: &'a BTreeMap<String, String>,
    base: &'a BTreeMap<String, String>,
    done: BTreeMap<String, String>,
    in_progress: Vec<String>,
}

impl Expander<'_> {
    fn resolve(&mut self, key: &str) -> Option<String> {
        if let Some(value) = self.done.get(key) {
            return Some(value.clone());
        }
        let raw_value = self.raw.get(key)?.clone();

        self.in_progress.push(key.to_string());
        let expanded =
            shellexpand::env_with_context_no_errors(&raw_value, |name| self.lookup(name))
                .into_owned();
        self.in_progress.pop();

        self.done.insert(key.to_string(), expanded.clone());
        Some(expanded)
    }

    fn lookup(&mut self, name: &str) -> Option<String> {
        if self.in_progress.iter().any(|k| k == name) {
            return self.base.get(name).cloned();
        }
        self.resolve(name)
    }
}
