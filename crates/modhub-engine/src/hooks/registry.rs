//! Hook registry — extracts per-category hook sequences from loaded plugins.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use modhub_core::AppResult;

use super::chain::{CategoryHook, DefaultHook};
use super::definitions::{
    FormatContext, FormatResolution, HookKind, ModuleSource, Resolution, ResolveContext,
    SourceContext, SourceResolution, TransformContext, TransformResolution,
};

/// A resolve hook: specifier + context → resolved URL.
pub type ResolveHook = CategoryHook<String, ResolveContext, Resolution>;
/// A format-detection hook: url + context → module format.
pub type FormatHook = CategoryHook<String, FormatContext, FormatResolution>;
/// A source-fetch hook: url + context → module source.
pub type SourceHook = CategoryHook<String, SourceContext, SourceResolution>;
/// A source-transform hook: source + context → rewritten source.
pub type TransformHook = CategoryHook<ModuleSource, TransformContext, TransformResolution>;

/// Host default for the resolve category.
pub type ResolveDefault = DefaultHook<String, ResolveContext, Resolution>;
/// Host default for the format-detection category.
pub type FormatDefault = DefaultHook<String, FormatContext, FormatResolution>;
/// Host default for the source-fetch category.
pub type SourceDefault = DefaultHook<String, SourceContext, SourceResolution>;
/// Host default for the source-transform category.
pub type TransformDefault = DefaultHook<ModuleSource, TransformContext, TransformResolution>;

/// A preload hook: contributes code to run before the program starts.
///
/// Returns a dynamically-typed value on purpose: a string contributes, a
/// null contributes nothing, and anything else is a contract violation
/// reported by the aggregator.
pub struct PreloadHook {
    inner: Arc<dyn Fn() -> AppResult<Value> + Send + Sync>,
}

impl Clone for PreloadHook {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for PreloadHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadHook").finish()
    }
}

impl PreloadHook {
    /// Wraps a closure as a preload hook.
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn() -> AppResult<Value> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(hook),
        }
    }

    /// Invokes the hook. Plain call: no ambient receiver is made available.
    pub fn invoke(&self) -> AppResult<Value> {
        (self.inner)()
    }
}

/// The capability record of one loaded plugin.
///
/// Each slot is optional: an absent slot means the plugin does not
/// participate in that category. Checked once at extraction time.
#[derive(Clone, Default)]
pub struct PluginHooks {
    /// Preload-code contribution.
    pub preload: Option<PreloadHook>,
    /// Specifier resolution.
    pub resolve: Option<ResolveHook>,
    /// Format detection.
    pub format: Option<FormatHook>,
    /// Source fetching.
    pub source: Option<SourceHook>,
    /// Source transformation.
    pub transform: Option<TransformHook>,
}

impl PluginHooks {
    /// Creates an empty capability record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preload hook.
    pub fn with_preload(mut self, hook: PreloadHook) -> Self {
        self.preload = Some(hook);
        self
    }

    /// Sets the resolve hook.
    pub fn with_resolve(mut self, hook: ResolveHook) -> Self {
        self.resolve = Some(hook);
        self
    }

    /// Sets the format-detection hook.
    pub fn with_format(mut self, hook: FormatHook) -> Self {
        self.format = Some(hook);
        self
    }

    /// Sets the source-fetch hook.
    pub fn with_source(mut self, hook: SourceHook) -> Self {
        self.source = Some(hook);
        self
    }

    /// Sets the source-transform hook.
    pub fn with_transform(mut self, hook: TransformHook) -> Self {
        self.transform = Some(hook);
        self
    }

    /// The categories this plugin participates in.
    pub fn capabilities(&self) -> Vec<HookKind> {
        let mut capabilities = Vec::new();
        if self.preload.is_some() {
            capabilities.push(HookKind::PreloadCode);
        }
        if self.resolve.is_some() {
            capabilities.push(HookKind::Resolve);
        }
        if self.format.is_some() {
            capabilities.push(HookKind::DetectFormat);
        }
        if self.source.is_some() {
            capabilities.push(HookKind::FetchSource);
        }
        if self.transform.is_some() {
            capabilities.push(HookKind::TransformSource);
        }
        capabilities
    }

    /// Whether the plugin exposes no hooks at all.
    pub fn is_empty(&self) -> bool {
        self.capabilities().is_empty()
    }
}

impl std::fmt::Debug for PluginHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHooks")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Ordered hook sequences for the five categories, in plugin load order.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    /// Preload hooks.
    pub preload: Vec<PreloadHook>,
    /// Resolve hooks.
    pub resolve: Vec<ResolveHook>,
    /// Format-detection hooks.
    pub format: Vec<FormatHook>,
    /// Source-fetch hooks.
    pub source: Vec<SourceHook>,
    /// Source-transform hooks.
    pub transform: Vec<TransformHook>,
}

impl HookRegistry {
    /// Extracts every exposed hook from the given plugins, in plugin order.
    ///
    /// Pure: invoked once after the synchronous load pass and again when
    /// the completion barrier resolves with the full plugin list.
    pub fn extract(plugins: &[PluginHooks]) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            if let Some(hook) = &plugin.preload {
                registry.preload.push(hook.clone());
            }
            if let Some(hook) = &plugin.resolve {
                registry.resolve.push(hook.clone());
            }
            if let Some(hook) = &plugin.format {
                registry.format.push(hook.clone());
            }
            if let Some(hook) = &plugin.source {
                registry.source.push(hook.clone());
            }
            if let Some(hook) = &plugin.transform {
                registry.transform.push(hook.clone());
            }
        }
        debug!(
            plugins = plugins.len(),
            preload = registry.preload.len(),
            resolve = registry.resolve.len(),
            format = registry.format.len(),
            source = registry.source.len(),
            transform = registry.transform.len(),
            "hook registry recomputed"
        );
        registry
    }

    /// Total number of extracted hooks.
    pub fn total(&self) -> usize {
        self.preload.len()
            + self.resolve.len()
            + self.format.len()
            + self.source.len()
            + self.transform.len()
    }
}
