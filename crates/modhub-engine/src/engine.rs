//! Composition engine — wires the probe, locator, loader, registry, and
//! chain compiler into the five public entry points.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info};

use modhub_core::config::{EngineConfig, StartupOptions};
use modhub_core::{AppError, AppResult};

use crate::hooks::chain::{DefaultHook, HookChain, HookOutcome};
use crate::hooks::definitions::{
    FormatContext, FormatResolution, HookKind, ModuleSource, Resolution, ResolveContext,
    SourceContext, SourceResolution, TransformContext, TransformResolution,
};
use crate::hooks::registry::{
    FormatDefault, FormatHook, HookRegistry, PluginHooks, PreloadHook, ResolveDefault,
    ResolveHook, SourceDefault, SourceHook, TransformDefault, TransformHook,
};
use crate::loader::{CompletionBarrier, PluginLoader};
use crate::locator::{self, Placement};
use crate::preload;
use crate::probe::SuspensionProbe;
use crate::source::PluginSource;

/// The hook-chain composition engine.
///
/// Construct with [`ChainEngine::new`] or [`ChainEngine::from_env`]; each
/// instance owns its own plugin list, registry, and compiled chains, so
/// multiple independent instances can coexist (there is no process-wide
/// state).
pub struct ChainEngine {
    placement: Placement,
    probe: SuspensionProbe,
    loader: Arc<PluginLoader>,
    resolve_chain: HookChain<String, ResolveContext, Resolution>,
    format_chain: HookChain<String, FormatContext, FormatResolution>,
    source_chain: HookChain<String, SourceContext, SourceResolution>,
    transform_chain: HookChain<ModuleSource, TransformContext, TransformResolution>,
    preload_hooks: RwLock<Arc<Vec<PreloadHook>>>,
}

impl std::fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEngine")
            .field("noop", &self.placement.noop)
            .field("plugins", &self.placement.specifiers.len())
            .finish()
    }
}

impl ChainEngine {
    /// Builds an engine from the live process environment.
    pub fn from_env(config: EngineConfig, source: Arc<dyn PluginSource>) -> AppResult<Arc<Self>> {
        let startup = StartupOptions::from_env(&config)?;
        Self::new(config, startup, source)
    }

    /// Builds an engine from explicit configuration and startup inputs.
    ///
    /// Must be called inside a tokio runtime: pending plugin loads are
    /// driven by a spawned completion task. Synchronous load failures are
    /// fatal here; asynchronous ones surface through the first entry point
    /// that awaits the completion barrier.
    pub fn new(
        config: EngineConfig,
        startup: StartupOptions,
        source: Arc<dyn PluginSource>,
    ) -> AppResult<Arc<Self>> {
        Handle::try_current().map_err(|_| {
            AppError::configuration(
                "the composition engine must be constructed inside an async runtime",
            )
        })?;

        let placement = locator::locate(&config, &startup);
        let probe = SuspensionProbe::detect();

        if placement.noop {
            info!("chaining is handled elsewhere; every entry point is a passthrough");
            let loader = Arc::new(PluginLoader::load_sync_pass(
                &[],
                source.as_ref(),
                &startup.working_dir,
            )?);
            loader.barrier().resolve();
            return Ok(Self::assemble(placement, probe, loader));
        }

        let loader = Arc::new(PluginLoader::load_sync_pass(
            &placement.specifiers,
            source.as_ref(),
            &startup.working_dir,
        )?);
        let engine = Self::assemble(placement, probe, Arc::clone(&loader));

        // synchronously-loaded plugins are composable right away; the
        // completion task folds the rest in and resolves the barrier
        engine.install_registry(HookRegistry::extract(&loader.loaded()));

        let weak = Arc::downgrade(&engine);
        loader.spawn_completion(source, move |plugins| {
            if let Some(engine) = weak.upgrade() {
                engine.install_registry(HookRegistry::extract(&plugins));
            }
        });

        info!(
            plugins = engine.placement.specifiers.len(),
            "composition engine constructed"
        );
        Ok(engine)
    }

    fn assemble(placement: Placement, probe: SuspensionProbe, loader: Arc<PluginLoader>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            placement,
            probe,
            loader,
            resolve_chain: HookChain::new(HookKind::Resolve, new_resolve_entry(weak.clone())),
            format_chain: HookChain::new(HookKind::DetectFormat, new_format_entry(weak.clone())),
            source_chain: HookChain::new(HookKind::FetchSource, new_source_entry(weak.clone())),
            transform_chain: HookChain::new(
                HookKind::TransformSource,
                new_transform_entry(weak.clone()),
            ),
            preload_hooks: RwLock::new(Arc::new(Vec::new())),
        })
    }

    fn install_registry(&self, registry: HookRegistry) {
        debug!(hooks = registry.total(), "installing hook registry");
        self.resolve_chain.replace_sequence(registry.resolve);
        self.format_chain.replace_sequence(registry.format);
        self.source_chain.replace_sequence(registry.source);
        self.transform_chain.replace_sequence(registry.transform);
        *self
            .preload_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(registry.preload);
    }

    /// Whether this instance is a pure passthrough.
    pub fn is_noop(&self) -> bool {
        self.placement.noop
    }

    /// The non-self plugin specifiers this instance composes, in order.
    pub fn specifiers(&self) -> &[String] {
        &self.placement.specifiers
    }

    /// The shared completion barrier.
    pub fn barrier(&self) -> &CompletionBarrier {
        self.loader.barrier()
    }

    /// Suspends until plugin loading has settled.
    pub async fn wait_until_loaded(&self) -> AppResult<()> {
        self.loader.barrier().wait().await
    }

    /// Resolves a module specifier through the plugin chain.
    pub async fn resolve(
        &self,
        specifier: String,
        context: ResolveContext,
        default: ResolveDefault,
    ) -> AppResult<Resolution> {
        if self.placement.noop {
            return default.invoke(specifier, context, default.as_next()).await;
        }
        self.loader.barrier().wait().await?;
        self.resolve_chain.dispatch(specifier, context, default).await
    }

    /// Classifies a resolved module's format through the plugin chain.
    pub async fn detect_format(
        &self,
        url: String,
        context: FormatContext,
        default: FormatDefault,
    ) -> AppResult<FormatResolution> {
        if self.placement.noop {
            return default.invoke(url, context, default.as_next()).await;
        }
        self.loader.barrier().wait().await?;
        self.format_chain.dispatch(url, context, default).await
    }

    /// Fetches a module's source through the plugin chain.
    pub async fn fetch_source(
        &self,
        url: String,
        context: SourceContext,
        default: SourceDefault,
    ) -> AppResult<SourceResolution> {
        if self.placement.noop {
            return default.invoke(url, context, default.as_next()).await;
        }
        self.loader.barrier().wait().await?;
        self.source_chain.dispatch(url, context, default).await
    }

    /// Rewrites a module's source through the plugin chain.
    pub async fn transform_source(
        &self,
        source: ModuleSource,
        context: TransformContext,
        default: TransformDefault,
    ) -> AppResult<TransformResolution> {
        if self.placement.noop {
            return default.invoke(source, context, default.as_next()).await;
        }
        self.loader.barrier().wait().await?;
        self.transform_chain.dispatch(source, context, default).await
    }

    /// Emits the aggregated preload bundle.
    ///
    /// Synchronous by host contract. Blocks on the completion barrier when
    /// the runtime supports blocking suspension; otherwise aggregation
    /// order relative to program start cannot be guaranteed and the empty
    /// bundle is returned instead.
    pub fn preload_code(&self) -> AppResult<String> {
        if self.placement.noop {
            return Ok(String::new());
        }
        let Some(settled) = self.probe.block_on(self.loader.barrier().wait()) else {
            return Ok(String::new());
        };
        settled?;
        let hooks = self
            .preload_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        preload::aggregate(&hooks)
    }

    /// Canonical entry hook for the resolve category. Passing it back as
    /// the trailing default re-enters this engine and is stripped by the
    /// self-recursion guard.
    pub fn resolve_entry(&self) -> ResolveDefault {
        self.resolve_chain.entry_hook()
    }

    /// Canonical entry hook for the format-detection category.
    pub fn detect_format_entry(&self) -> FormatDefault {
        self.format_chain.entry_hook()
    }

    /// Canonical entry hook for the source-fetch category.
    pub fn fetch_source_entry(&self) -> SourceDefault {
        self.source_chain.entry_hook()
    }

    /// Canonical entry hook for the source-transform category.
    pub fn transform_source_entry(&self) -> TransformDefault {
        self.transform_chain.entry_hook()
    }

    /// Exports this engine's surface as a plugin record, making it
    /// installable in a host that accepts a single plugin.
    pub fn as_plugin(self: &Arc<Self>) -> PluginHooks {
        let resolve = {
            let weak = Arc::downgrade(self);
            ResolveHook::new(move |specifier, context, next| {
                let weak = weak.clone();
                async move {
                    let engine = upgrade(&weak)?;
                    engine
                        .resolve(specifier, context, DefaultHook::from_next(next))
                        .await
                        .map(HookOutcome::Handled)
                }
            })
        };
        let format = {
            let weak = Arc::downgrade(self);
            FormatHook::new(move |url, context, next| {
                let weak = weak.clone();
                async move {
                    let engine = upgrade(&weak)?;
                    engine
                        .detect_format(url, context, DefaultHook::from_next(next))
                        .await
                        .map(HookOutcome::Handled)
                }
            })
        };
        let source = {
            let weak = Arc::downgrade(self);
            SourceHook::new(move |url, context, next| {
                let weak = weak.clone();
                async move {
                    let engine = upgrade(&weak)?;
                    engine
                        .fetch_source(url, context, DefaultHook::from_next(next))
                        .await
                        .map(HookOutcome::Handled)
                }
            })
        };
        let transform = {
            let weak = Arc::downgrade(self);
            TransformHook::new(move |module_source, context, next| {
                let weak = weak.clone();
                async move {
                    let engine = upgrade(&weak)?;
                    engine
                        .transform_source(module_source, context, DefaultHook::from_next(next))
                        .await
                        .map(HookOutcome::Handled)
                }
            })
        };
        let preload = {
            let weak = Arc::downgrade(self);
            PreloadHook::new(move || {
                let engine = upgrade(&weak)?;
                engine.preload_code().map(Value::String)
            })
        };
        PluginHooks {
            preload: Some(preload),
            resolve: Some(resolve),
            format: Some(format),
            source: Some(source),
            transform: Some(transform),
        }
    }
}

fn upgrade(weak: &Weak<ChainEngine>) -> AppResult<Arc<ChainEngine>> {
    weak.upgrade()
        .ok_or_else(|| AppError::internal("composition engine was dropped"))
}

fn new_resolve_entry(weak: Weak<ChainEngine>) -> ResolveDefault {
    DefaultHook::new(move |specifier, context, next| {
        let weak = weak.clone();
        async move {
            let engine = upgrade(&weak)?;
            engine
                .resolve(specifier, context, DefaultHook::from_next(next))
                .await
        }
    })
}

fn new_format_entry(weak: Weak<ChainEngine>) -> FormatDefault {
    DefaultHook::new(move |url, context, next| {
        let weak = weak.clone();
        async move {
            let engine = upgrade(&weak)?;
            engine
                .detect_format(url, context, DefaultHook::from_next(next))
                .await
        }
    })
}

fn new_source_entry(weak: Weak<ChainEngine>) -> SourceDefault {
    DefaultHook::new(move |url, context, next| {
        let weak = weak.clone();
        async move {
            let engine = upgrade(&weak)?;
            engine
                .fetch_source(url, context, DefaultHook::from_next(next))
                .await
        }
    })
}

fn new_transform_entry(weak: Weak<ChainEngine>) -> TransformDefault {
    DefaultHook::new(move |source, context, next| {
        let weak = weak.clone();
        async move {
            let engine = upgrade(&weak)?;
            engine
                .transform_source(source, context, DefaultHook::from_next(next))
                .await
        }
    })
}
