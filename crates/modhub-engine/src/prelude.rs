//! Prelude for convenient imports when authoring plugins or embedding the
//! engine.

pub use modhub_core::config::{EngineConfig, StartupOptions};
pub use modhub_core::{AppError, AppResult};

pub use crate::engine::ChainEngine;
pub use crate::hooks::chain::{CategoryHook, DefaultHook, HookOutcome, NextHook};
pub use crate::hooks::definitions::{
    FormatContext, FormatResolution, HookKind, ModuleFormat, ModuleSource, Resolution,
    ResolveContext, SourceContext, SourceResolution, TransformContext, TransformResolution,
};
pub use crate::hooks::registry::{
    FormatDefault, FormatHook, HookRegistry, PluginHooks, PreloadHook, ResolveDefault,
    ResolveHook, SourceDefault, SourceHook, TransformDefault, TransformHook,
};
pub use crate::source::{PluginSource, StaticPluginSource, SyncLoadError};
