//! Command line builder
//! Pure mapping from resolved options to an argument list and environment map

use crate::domain::SensitiveString;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use tracing::warn;

/// Rendered spawn inputs for a process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

impl CommandLine {
    /// Environment keys, safe to log (values may hold tokens)
    pub fn environment_keys(&self) -> Vec<&str> {
        self.environment.keys().map(String::as_str).collect()
    }
}

/// Builds a `CommandLine` one field at a time.
///
/// `None` values never produce a flag. Custom arguments are appended after
/// every computed flag regardless of call order.
#[derive(Debug, Default)]
pub struct CommandLineBuilder {
    arguments: Vec<String>,
    environment: BTreeMap<String, String>,
    custom_arguments: Vec<String>,
}

impl CommandLineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `--name value`
    pub fn add<V: Display>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.arguments.push(format!("--{}", name));
            self.arguments.push(value.to_string());
        }
        self
    }

    /// `--name value` for string fields; blank strings are treated as unset
    pub fn add_str(self, name: &str, value: Option<&str>) -> Self {
        self.add(name, value.filter(|v| !v.trim().is_empty()))
    }

    /// `--name path`
    pub fn add_path(self, name: &str, value: Option<&Path>) -> Self {
        self.add(name, value.map(|p| p.to_string_lossy().into_owned()))
    }

    /// `--name=true` / `--name=false`
    pub fn add_flag(mut self, name: &str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.arguments.push(format!("--{}={}", name, value));
        }
        self
    }

    /// Bare `--name`, only when enabled
    pub fn add_switch(mut self, name: &str, enabled: bool) -> Self {
        if enabled {
            self.arguments.push(format!("--{}", name));
        }
        self
    }

    pub fn env<V: Display>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.environment.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Sensitive values are the one place the raw value leaves its wrapper
    pub fn env_sensitive(mut self, key: &str, value: Option<&SensitiveString>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_blank()) {
            self.environment
                .insert(key.to_string(), value.expose().to_string());
        }
        self
    }

    /// User-supplied variables; computed variables win on conflict
    pub fn environment(mut self, vars: &BTreeMap<String, String>) -> Self {
        for (key, value) in vars {
            self.environment
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Raw escape-hatch arguments, tokenized with shell quoting rules.
    /// Unbalanced quotes keep the whole string as a single argument.
    pub fn custom_arguments(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return self;
        };
        match shell_words::split(raw) {
            Ok(tokens) => self.custom_arguments.extend(tokens),
            Err(e) => {
                warn!(error = %e, "Custom arguments are not valid shell words, passing verbatim");
                self.custom_arguments.push(raw.to_string());
            }
        }
        self
    }

    pub fn build(mut self) -> CommandLine {
        self.arguments.append(&mut self.custom_arguments);
        CommandLine {
            arguments: self.arguments,
            environment: self.environment,
        }
    }
}
