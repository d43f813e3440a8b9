//! Hook system — typed category definitions, the chain compiler, and the
//! registry extracting hook sequences from loaded plugins.

pub mod chain;
pub mod definitions;
pub mod registry;

pub use chain::{CategoryHook, DefaultHook, HookChain, HookOutcome, NextHook};
pub use definitions::{
    FormatContext, FormatResolution, HookKind, ModuleFormat, ModuleSource, Resolution,
    ResolveContext, SourceContext, SourceResolution, TransformContext, TransformResolution,
};
pub use registry::{
    FormatDefault, FormatHook, HookRegistry, PluginHooks, PreloadHook, ResolveDefault,
    ResolveHook, SourceDefault, SourceHook, TransformDefault, TransformHook,
};
