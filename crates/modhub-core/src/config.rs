//! Composition engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Static configuration of the composition engine.
///
/// Controls how plugin specifiers are recognized in the process startup
/// arguments and which specifiers denote this engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Flag spellings that request a plugin (`--loader x` or `--loader=x`).
    #[serde(default = "default_plugin_flags")]
    pub plugin_flags: Vec<String>,
    /// Environment variable holding an additional options string.
    #[serde(default = "default_options_var")]
    pub options_var: String,
    /// Specifiers under which this engine instance itself is requested.
    #[serde(default = "default_self_identifiers")]
    pub self_identifiers: Vec<String>,
}

fn default_plugin_flags() -> Vec<String> {
    vec!["--loader".to_string()]
}

fn default_options_var() -> String {
    "MODHUB_OPTIONS".to_string()
}

fn default_self_identifiers() -> Vec<String> {
    vec!["modhub".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugin_flags: default_plugin_flags(),
            options_var: default_options_var(),
            self_identifiers: default_self_identifiers(),
        }
    }
}

impl EngineConfig {
    /// Returns whether a specifier names this engine instance.
    pub fn is_self(&self, specifier: &str) -> bool {
        self.self_identifiers.iter().any(|s| s == specifier)
    }
}

/// Per-process startup inputs consumed by the plugin locator.
///
/// Constructed explicitly in tests and embedders, or captured from the
/// process environment with [`StartupOptions::from_env`].
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Startup arguments, without the executable name.
    pub exec_args: Vec<String>,
    /// Raw value of the options environment variable, if set.
    pub options_value: Option<String>,
    /// Directory against which relative plugin specifiers are resolved.
    pub working_dir: PathBuf,
}

impl StartupOptions {
    /// Capture startup options from the current process environment.
    pub fn from_env(config: &EngineConfig) -> AppResult<Self> {
        let options = Self {
            exec_args: std::env::args().skip(1).collect(),
            options_value: std::env::var(&config.options_var).ok(),
            working_dir: std::env::current_dir()?,
        };
        tracing::debug!(
            args = options.exec_args.len(),
            options_set = options.options_value.is_some(),
            "captured startup options"
        );
        Ok(options)
    }
}
