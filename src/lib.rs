//! # ModHub
//!
//! Cooperative module-loader plugin chaining for hosts that natively
//! support only a single active plugin.
//!
//! ModHub discovers every configured plugin, extracts the hooks each one
//! exposes, and compiles them into one ordered pipeline per hook category.
//! Earlier-listed plugins get first refusal; a plugin cascades by
//! declining, and the host-supplied default implementation is the terminal
//! fallback. The engine is itself installable as a conforming plugin.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use modhub::{ChainEngine, EngineConfig, PluginSource, StaticPluginSource};
//!
//! # fn plugins() -> StaticPluginSource { StaticPluginSource::new() }
//! # async fn example() -> modhub::AppResult<()> {
//! let source: Arc<dyn PluginSource> = Arc::new(plugins());
//! let engine = ChainEngine::from_env(EngineConfig::default(), source)?;
//! engine.wait_until_loaded().await?;
//! # Ok(())
//! # }
//! ```

pub use modhub_core::config::{EngineConfig, StartupOptions};
pub use modhub_core::error::{AppError, ErrorKind};
pub use modhub_core::result::AppResult;

pub use modhub_engine::{
    CategoryHook, ChainEngine, CompletionBarrier, DefaultHook, FormatContext, FormatDefault,
    FormatHook, FormatResolution, HookKind, HookOutcome, HookRegistry, ModuleFormat,
    ModuleSource, NextHook, Placement, PluginHooks, PluginSource, PreloadHook, Resolution,
    ResolveContext, ResolveDefault, ResolveHook, SourceContext, SourceDefault, SourceHook,
    SourceResolution, StaticPluginSource, SuspensionProbe, SyncLoadError, TransformContext,
    TransformDefault, TransformHook, TransformResolution,
};

#[cfg(feature = "dynamic")]
pub use modhub_engine::DynamicPluginSource;
