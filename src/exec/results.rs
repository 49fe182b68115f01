// src/exec/results.rs

//! Results-file side channel.
//!
//! A command template may contain [`RESULT_FILE_PLACEHOLDER`]. Before launch
//! the placeholder is replaced with the path of a file the process writes its
//! results to; the tailer then streams that file back to the listener.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::LaunchError;
use super::spec::CommandLine;
use crate::fs::FileSystem;

/// The literal marker substituted with the results-file path.
pub const RESULT_FILE_PLACEHOLDER: &str = "<result_file>";

const TEMP_FILE_SUFFIX: &str = ".txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsChannel {
    path: PathBuf,
    owned_by_process: bool,
}

impl ResultsChannel {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when this launch created the file and must delete it afterwards.
    pub fn owned_by_process(&self) -> bool {
        self.owned_by_process
    }
}

/// Substitute the results-file placeholder in `command`.
///
/// Without a placeholder the command is returned unchanged and no channel is
/// created, even if `supplied` is set. With a placeholder, `supplied` is used
/// when given; otherwise a fresh temporary file is created through `fs` and
/// the channel owns it.
pub fn resolve(
    command: &CommandLine,
    supplied: Option<&Path>,
    fs: &dyn FileSystem,
) -> Result<(CommandLine, Option<ResultsChannel>), LaunchError> {
    if !contains_placeholder(command) {
        return Ok((command.clone(), None));
    }

    let channel = match supplied {
        Some(path) => ResultsChannel {
            path: path.to_path_buf(),
            owned_by_process: false,
        },
        None => {
            let path = fs
                .create_temp_file(TEMP_FILE_SUFFIX)
                .map_err(|source| LaunchError::ResultChannel { source })?;
            debug!(path = %path.display(), "created results file");
            ResultsChannel {
                path,
                owned_by_process: true,
            }
        }
    };

    let replacement = channel.path.to_string_lossy();
    let substituted = match command {
        CommandLine::Argv(argv) => CommandLine::Argv(
            argv.iter()
                .map(|arg| substitute(arg, &replacement).into_owned())
                .collect(),
        ),
        CommandLine::Shell(cmd) => CommandLine::Shell(substitute(cmd, &replacement).into_owned()),
    };
    debug!(command = %substituted, "substituted results file placeholder");

    Ok((substituted, Some(channel)))
}

fn contains_placeholder(command: &CommandLine) -> bool {
    match command {
        CommandLine::Argv(argv) => argv.iter().any(|a| a.contains(RESULT_FILE_PLACEHOLDER)),
        CommandLine::Shell(cmd) => cmd.contains(RESULT_FILE_PLACEHOLDER),
    }
}

fn substitute<'a>(text: &'a str, path: &str) -> Cow<'a, str> {
    if text.contains(RESULT_FILE_PLACEHOLDER) {
        Cow::Owned(text.replace(RESULT_FILE_PLACEHOLDER, path))
    } else {
        Cow::Borrowed(text)
    }
}
