//! Shared fixtures for integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use modhub::{
    AppResult, CategoryHook, DefaultHook, HookOutcome, PluginHooks, PluginSource, Resolution,
    ResolveDefault, ResolveHook, StartupOptions, SyncLoadError,
};

/// Installs a test subscriber so `RUST_LOG` can surface engine traces.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Startup options with the given arguments and a fixed working directory.
pub fn startup(exec_args: &[&str]) -> StartupOptions {
    StartupOptions {
        exec_args: exec_args.iter().map(|s| s.to_string()).collect(),
        options_value: None,
        working_dir: PathBuf::from("/work"),
    }
}

/// A resolve hook answering `"{tag}:{specifier}"` for every request.
pub fn resolves_as(tag: &str) -> ResolveHook {
    let tag = tag.to_string();
    CategoryHook::new(move |specifier: String, _context, _next| {
        let tag = tag.clone();
        async move {
            Ok(HookOutcome::Handled(Resolution {
                url: format!("{tag}:{specifier}"),
            }))
        }
    })
}

/// A resolve hook that always cascades.
pub fn declines() -> ResolveHook {
    CategoryHook::new(|_specifier: String, _context, _next| async move {
        Ok(HookOutcome::Declined)
    })
}

/// A host default answering `"{tag}:{specifier}"`.
pub fn host_default(tag: &str) -> ResolveDefault {
    let tag = tag.to_string();
    DefaultHook::new(move |specifier: String, _context, _next| {
        let tag = tag.clone();
        async move {
            Ok(Resolution {
                url: format!("{tag}:{specifier}"),
            })
        }
    })
}

/// A plugin source that counts every load attempt.
#[derive(Default)]
pub struct CountingSource {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl PluginSource for CountingSource {
    fn load_sync(&self, specifier: &str) -> Result<PluginHooks, SyncLoadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SyncLoadError::NotFound {
            specifier: specifier.to_string(),
        })
    }

    async fn load_async(&self, specifier: &str) -> AppResult<PluginHooks> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(modhub::AppError::not_found(format!(
            "plugin \"{specifier}\" is not registered"
        )))
    }
}
