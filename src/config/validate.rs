// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{BuildConfig, RawBuildConfig};
use crate::errors::{Result, TailexecError};
use crate::exec::CommandLine;

impl TryFrom<RawBuildConfig> for BuildConfig {
    type Error = TailexecError;

    fn try_from(raw: RawBuildConfig) -> std::result::Result<Self, Self::Error> {
        let command = validate_command(raw.cmd, raw.shell_cmd)?;
        let wait = parse_optional_duration("wait", raw.wait.as_deref())?;
        let results_timeout =
            parse_optional_duration("results_timeout", raw.results_timeout.as_deref())?;

        let mut env = raw.env;
        env.extend(raw.build_env);

        Ok(BuildConfig {
            command,
            working_dir: raw.working_dir,
            env,
            path: raw.path,
            shell: raw.shell,
            startup_info: raw.startup_info,
            results_file_path: raw.results_file_path,
            wait,
            results_timeout,
            quiet: raw.quiet,
            initial_message: raw.initial_message,
        })
    }
}

fn validate_command(cmd: Option<Vec<String>>, shell_cmd: Option<String>) -> Result<CommandLine> {
    match (cmd, shell_cmd) {
        (Some(_), Some(_)) => Err(TailexecError::ConfigError(
            "only one of `cmd` or `shell_cmd` may be set".to_string(),
        )),
        (None, None) => Err(TailexecError::ConfigError(
            "one of `cmd` or `shell_cmd` is required".to_string(),
        )),
        (Some(argv), None) => {
            if argv.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(TailexecError::ConfigError(
                    "`cmd` must start with a program name".to_string(),
                ));
            }
            Ok(CommandLine::Argv(argv))
        }
        (None, Some(line)) => {
            if line.trim().is_empty() {
                return Err(TailexecError::ConfigError(
                    "`shell_cmd` must not be empty".to_string(),
                ));
            }
            Ok(CommandLine::Shell(line))
        }
    }
}

fn parse_optional_duration(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            parse_duration(s).map_err(|e| TailexecError::ConfigError(format!("`{field}`: {e}")))
        })
        .transpose()
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
