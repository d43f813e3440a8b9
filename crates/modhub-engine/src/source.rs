//! Plugin sources — the strategies that materialize plugin hook records.
//!
//! The loader is generic over [`PluginSource`]: hosts supply whatever
//! mechanism turns a specifier into hooks (compiled-in registration, a
//! shared library, an embedded interpreter). The loader only cares about
//! the sync-first/async-fallback contract.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use modhub_core::{AppError, AppResult};

use crate::hooks::registry::PluginHooks;

/// Why a synchronous load attempt could not produce a plugin.
///
/// `RequiresAsync` and `NotFound` demote the plugin to the asynchronous
/// strategy; anything else is fatal.
#[derive(Debug, Error)]
pub enum SyncLoadError {
    /// The target only supports the asynchronous loading strategy.
    #[error("plugin \"{specifier}\" requires asynchronous loading")]
    RequiresAsync {
        /// The requested specifier.
        specifier: String,
    },
    /// The synchronous strategy could not locate the target.
    #[error("plugin \"{specifier}\" was not found by the synchronous strategy")]
    NotFound {
        /// The requested specifier.
        specifier: String,
    },
    /// The plugin exists but failed during initialization.
    #[error(transparent)]
    Fatal(#[from] AppError),
}

/// Mechanism that loads plugins by specifier.
#[async_trait]
pub trait PluginSource: Send + Sync {
    /// Attempts to load a plugin synchronously.
    fn load_sync(&self, specifier: &str) -> Result<PluginHooks, SyncLoadError>;

    /// Loads a plugin asynchronously. Relative specifiers have already been
    /// absolutized against the working directory.
    async fn load_async(&self, specifier: &str) -> AppResult<PluginHooks>;
}

/// Compiled-in plugin registration.
///
/// Plugins registered with [`register`](Self::register) load synchronously;
/// plugins registered with [`register_deferred`](Self::register_deferred)
/// signal `RequiresAsync` and only materialize through the asynchronous
/// strategy.
#[derive(Debug, Default)]
pub struct StaticPluginSource {
    immediate: HashMap<String, PluginHooks>,
    deferred: HashMap<String, PluginHooks>,
}

impl StaticPluginSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a synchronously loadable plugin.
    pub fn register(mut self, specifier: impl Into<String>, hooks: PluginHooks) -> Self {
        self.immediate.insert(specifier.into(), hooks);
        self
    }

    /// Registers a plugin that requires the asynchronous strategy.
    pub fn register_deferred(mut self, specifier: impl Into<String>, hooks: PluginHooks) -> Self {
        self.deferred.insert(specifier.into(), hooks);
        self
    }
}

#[async_trait]
impl PluginSource for StaticPluginSource {
    fn load_sync(&self, specifier: &str) -> Result<PluginHooks, SyncLoadError> {
        if let Some(hooks) = self.immediate.get(specifier) {
            return Ok(hooks.clone());
        }
        if self.deferred.contains_key(specifier) {
            return Err(SyncLoadError::RequiresAsync {
                specifier: specifier.to_string(),
            });
        }
        Err(SyncLoadError::NotFound {
            specifier: specifier.to_string(),
        })
    }

    async fn load_async(&self, specifier: &str) -> AppResult<PluginHooks> {
        self.immediate
            .get(specifier)
            .or_else(|| self.deferred.get(specifier))
            .cloned()
            .ok_or_else(|| {
                AppError::not_found(format!("plugin \"{specifier}\" is not registered"))
            })
    }
}

/// Dynamic plugin loading from shared libraries (feature-gated).
#[cfg(feature = "dynamic")]
pub mod dynamic {
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use tracing::info;

    use modhub_core::{AppError, AppResult};

    use super::{PluginSource, SyncLoadError};
    use crate::hooks::registry::PluginHooks;

    /// Constructor symbol exported by dynamic plugins.
    ///
    /// Dynamic plugins must export:
    /// `#[unsafe(no_mangle)] extern "C" fn modhub_plugin_hooks() -> *mut PluginHooks`
    pub type PluginHooksCtor = unsafe extern "C" fn() -> *mut PluginHooks;

    /// Loads plugins from shared libraries (.so / .dll / .dylib).
    pub struct DynamicPluginSource {
        /// Loaded libraries (kept alive for the lifetime of the source).
        libraries: Mutex<Vec<libloading::Library>>,
    }

    impl DynamicPluginSource {
        /// Creates a new dynamic source.
        pub fn new() -> Self {
            Self {
                libraries: Mutex::new(Vec::new()),
            }
        }

        /// Loads a plugin from the given shared library path.
        ///
        /// # Safety
        /// This function loads arbitrary code from a shared library.
        /// Only load trusted plugins.
        pub unsafe fn load_from_path(&self, path: &Path) -> AppResult<PluginHooks> {
            let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
                AppError::plugin(format!(
                    "Failed to load plugin library '{}': {}",
                    path.display(),
                    e
                ))
            })?;

            let ctor: libloading::Symbol<PluginHooksCtor> =
                unsafe { library.get(b"modhub_plugin_hooks") }.map_err(|e| {
                    AppError::plugin(format!(
                        "Plugin '{}' missing 'modhub_plugin_hooks' symbol: {}",
                        path.display(),
                        e
                    ))
                })?;

            let hooks = unsafe { *Box::from_raw(ctor()) };

            info!(path = %path.display(), "dynamic plugin loaded");

            self.libraries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(library);

            Ok(hooks)
        }
    }

    impl Default for DynamicPluginSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl std::fmt::Debug for DynamicPluginSource {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            let loaded = self
                .libraries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len();
            f.debug_struct("DynamicPluginSource")
                .field("loaded_count", &loaded)
                .finish()
        }
    }

    #[async_trait]
    impl PluginSource for DynamicPluginSource {
        fn load_sync(&self, specifier: &str) -> Result<PluginHooks, SyncLoadError> {
            let path = Path::new(specifier);
            if !path.exists() {
                // a relative path may still resolve once absolutized
                return Err(SyncLoadError::NotFound {
                    specifier: specifier.to_string(),
                });
            }
            // Safety: configured plugin libraries are trusted by contract.
            unsafe { self.load_from_path(path) }.map_err(SyncLoadError::Fatal)
        }

        async fn load_async(&self, specifier: &str) -> AppResult<PluginHooks> {
            let path = Path::new(specifier);
            if !path.exists() {
                return Err(AppError::not_found(format!(
                    "plugin library \"{specifier}\" does not exist"
                )));
            }
            // Safety: configured plugin libraries are trusted by contract.
            unsafe { self.load_from_path(path) }
        }
    }
}

#[cfg(feature = "dynamic")]
pub use dynamic::DynamicPluginSource;
