//! # modhub-engine
//!
//! Hook-chain composition engine for module-loading plugins. Provides:
//!
//! - Plugin location from startup arguments with no-op detection
//! - Sync-first plugin loading behind a one-shot completion barrier
//! - Duck-typed hook extraction into per-category ordered sequences
//! - Chain compilation with override-or-fallback cascading, dynamic
//!   default injection, and self-recursion guarding
//! - Preload code aggregation into a single executable bundle
//!
//! The engine implements none of the module-loading operations itself; it
//! composes externally supplied hooks and delegates to the host default
//! when every plugin declines.

pub mod engine;
pub mod hooks;
pub mod loader;
pub mod locator;
pub mod preload;
pub mod prelude;
pub mod probe;
pub mod source;

pub use engine::ChainEngine;
pub use hooks::chain::{CategoryHook, DefaultHook, HookOutcome, NextHook};
pub use hooks::definitions::{
    FormatContext, FormatResolution, HookKind, ModuleFormat, ModuleSource, Resolution,
    ResolveContext, SourceContext, SourceResolution, TransformContext, TransformResolution,
};
pub use hooks::registry::{
    FormatDefault, FormatHook, HookRegistry, PluginHooks, PreloadHook, ResolveDefault,
    ResolveHook, SourceDefault, SourceHook, TransformDefault, TransformHook,
};
pub use loader::{CompletionBarrier, PluginSlot};
pub use locator::Placement;
pub use probe::SuspensionProbe;
pub use source::{PluginSource, StaticPluginSource, SyncLoadError};

#[cfg(feature = "dynamic")]
pub use source::DynamicPluginSource;
