#![allow(dead_code)]

use std::collections::BTreeMap;

/// Builder producing build-file TOML text, to simplify config test setup.
#[derive(Debug, Default)]
pub struct BuildFileBuilder {
    entries: Vec<String>,
    env: BTreeMap<String, String>,
    build_env: BTreeMap<String, String>,
}

impl BuildFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell_cmd(self, cmd: &str) -> Self {
        self.entry("shell_cmd", &quote(cmd))
    }

    pub fn cmd(self, argv: &[&str]) -> Self {
        let items: Vec<String> = argv.iter().map(|a| quote(a)).collect();
        self.entry("cmd", &format!("[{}]", items.join(", ")))
    }

    pub fn working_dir(self, dir: &str) -> Self {
        self.entry("working_dir", &quote(dir))
    }

    pub fn path(self, path: &str) -> Self {
        self.entry("path", &quote(path))
    }

    pub fn shell(self, val: bool) -> Self {
        self.entry("shell", &val.to_string())
    }

    pub fn results_file_path(self, path: &str) -> Self {
        self.entry("results_file_path", &quote(path))
    }

    pub fn wait(self, duration: &str) -> Self {
        self.entry("wait", &quote(duration))
    }

    pub fn results_timeout(self, duration: &str) -> Self {
        self.entry("results_timeout", &quote(duration))
    }

    pub fn quiet(self, val: bool) -> Self {
        self.entry("quiet", &val.to_string())
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build_env(mut self, key: &str, value: &str) -> Self {
        self.build_env.insert(key.to_string(), value.to_string());
        self
    }

    /// Add a raw `key = value` line; `value` must already be valid TOML.
    pub fn entry(mut self, key: &str, value: &str) -> Self {
        self.entries.push(format!("{key} = {value}"));
        self
    }

    pub fn build(self) -> String {
        let mut out = self.entries.join("\n");
        out.push('\n');
        for (section, vars) in [("env", &self.env), ("build_env", &self.build_env)] {
            if vars.is_empty() {
                continue;
            }
            out.push_str(&format!("\n[{section}]\n"));
            for (key, value) in vars {
                out.push_str(&format!("{key} = {}\n", quote(value)));
            }
        }
        out
    }
}

fn quote(s: &str) -> String {
    format!("'{s}'")
}
