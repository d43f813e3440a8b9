//! Hook category definitions with typed inputs, contexts, and results.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Enumeration of the five hook categories the engine composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Maps a specifier to a resolved module URL.
    Resolve,
    /// Classifies the format of a resolved module.
    DetectFormat,
    /// Fetches the source behind a resolved module URL.
    FetchSource,
    /// Rewrites fetched source before evaluation.
    TransformSource,
    /// Contributes code to run before the program starts.
    PreloadCode,
}

impl HookKind {
    /// Returns the string name of this hook category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::DetectFormat => "detect_format",
            Self::FetchSource => "fetch_source",
            Self::TransformSource => "transform_source",
            Self::PreloadCode => "preload_code",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Module formats recognized by the host's loading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// A module built into the host itself.
    Builtin,
    /// A legacy synchronous module.
    CommonJs,
    /// A plain data module.
    Json,
    /// A standard module.
    Module,
    /// A WebAssembly module.
    Wasm,
}

impl ModuleFormat {
    /// Returns the wire name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::CommonJs => "commonjs",
            Self::Json => "json",
            Self::Module => "module",
            Self::Wasm => "wasm",
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Module source text or bytes, as fetched or transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleSource {
    /// Textual source.
    Text(String),
    /// Binary source.
    Bytes(Bytes),
}

impl ModuleSource {
    /// Length of the source in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Bytes(bytes) => bytes.len(),
        }
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The source as text, when textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }
}

impl From<&str> for ModuleSource {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Context handed to resolve hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveContext {
    /// Export conditions of the relevant package.
    pub conditions: Vec<String>,
    /// URL of the module the specifier appears in, absent for the entry.
    pub parent_url: Option<String>,
}

/// Result of resolving a specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Absolute URL of the resolved module.
    pub url: String,
}

/// Context handed to format-detection hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatContext {}

/// Result of classifying a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatResolution {
    /// Detected module format.
    pub format: ModuleFormat,
}

/// Context handed to source-fetch hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    /// Format the module was classified as.
    pub format: ModuleFormat,
}

/// Result of fetching module source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceResolution {
    /// The fetched source.
    pub source: ModuleSource,
}

/// Context handed to source-transform hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformContext {
    /// Format the module was classified as.
    pub format: ModuleFormat,
    /// URL of the module being transformed.
    pub url: String,
}

/// Result of transforming module source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResolution {
    /// The rewritten source.
    pub source: ModuleSource,
}
