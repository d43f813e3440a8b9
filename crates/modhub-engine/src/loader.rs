//! Plugin loader — sync-first loading with an asynchronous completion
//! barrier.
//!
//! Every requested plugin is tried synchronously first; targets the
//! synchronous strategy cannot serve are left pending and resolved by a
//! spawned completion task. The shared [`CompletionBarrier`] flips exactly
//! once, after the final registry recomputation, so no hook from an
//! asynchronously-loaded plugin is observable before it resolves.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error};

use modhub_core::{AppError, AppResult};

use crate::hooks::registry::PluginHooks;
use crate::source::{PluginSource, SyncLoadError};

/// State of one requested plugin, in request order.
#[derive(Debug, Clone)]
pub enum PluginSlot {
    /// Hooks are available for composition now.
    Loaded(PluginHooks),
    /// Waiting on the asynchronous strategy.
    Pending {
        /// Absolutized specifier for the asynchronous attempt.
        specifier: String,
    },
}

#[derive(Debug, Clone, Default)]
enum BarrierState {
    #[default]
    Pending,
    Ready,
    Failed(AppError),
}

/// One-shot barrier gating composition until plugin loading settles.
///
/// Resolves (or fails) exactly once and is inert afterwards. All hook
/// categories share a single barrier.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    state: watch::Sender<BarrierState>,
}

impl CompletionBarrier {
    fn new() -> Self {
        let (state, _) = watch::channel(BarrierState::Pending);
        Self { state }
    }

    pub(crate) fn resolve(&self) {
        self.state.send_if_modified(|state| match state {
            BarrierState::Pending => {
                *state = BarrierState::Ready;
                true
            }
            _ => false,
        });
    }

    pub(crate) fn fail(&self, error: AppError) {
        self.state.send_if_modified(|state| match state {
            BarrierState::Pending => {
                *state = BarrierState::Failed(error);
                true
            }
            _ => false,
        });
    }

    /// Suspends until every plugin load has settled; surfaces the first
    /// load failure to the caller.
    pub async fn wait(&self) -> AppResult<()> {
        let mut receiver = self.state.subscribe();
        loop {
            match &*receiver.borrow_and_update() {
                BarrierState::Ready => return Ok(()),
                BarrierState::Failed(error) => return Err(error.clone()),
                BarrierState::Pending => {}
            }
            if receiver.changed().await.is_err() {
                return Err(AppError::internal(
                    "plugin loader dropped before loading settled",
                ));
            }
        }
    }
}

/// Ordered plugin slots plus the shared completion barrier.
pub struct PluginLoader {
    slots: Mutex<Vec<PluginSlot>>,
    barrier: CompletionBarrier,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = slots
            .iter()
            .filter(|slot| matches!(slot, PluginSlot::Pending { .. }))
            .count();
        f.debug_struct("PluginLoader")
            .field("plugins", &slots.len())
            .field("pending", &pending)
            .finish()
    }
}

impl PluginLoader {
    /// Runs the synchronous loading pass over the requested specifiers.
    ///
    /// Targets the synchronous strategy cannot serve (`RequiresAsync`,
    /// `NotFound`) are left pending, with relative-path specifiers
    /// absolutized against the working directory for the asynchronous
    /// attempt. Any other failure is fatal.
    pub(crate) fn load_sync_pass(
        specifiers: &[String],
        source: &dyn PluginSource,
        working_dir: &Path,
    ) -> AppResult<Self> {
        let mut slots = Vec::with_capacity(specifiers.len());
        for specifier in specifiers {
            match source.load_sync(specifier) {
                Ok(hooks) => {
                    debug!(specifier = %specifier, "plugin loaded synchronously");
                    slots.push(PluginSlot::Loaded(hooks));
                }
                Err(SyncLoadError::RequiresAsync { .. }) | Err(SyncLoadError::NotFound { .. }) => {
                    let resolved = absolutize(specifier, working_dir);
                    debug!(
                        specifier = %specifier,
                        resolved = %resolved,
                        "plugin deferred to asynchronous loading"
                    );
                    slots.push(PluginSlot::Pending { specifier: resolved });
                }
                Err(SyncLoadError::Fatal(err)) => {
                    error!(specifier = %specifier, error = %err, "plugin failed to load");
                    return Err(err);
                }
            }
        }
        Ok(Self {
            slots: Mutex::new(slots),
            barrier: CompletionBarrier::new(),
        })
    }

    /// The shared completion barrier.
    pub fn barrier(&self) -> &CompletionBarrier {
        &self.barrier
    }

    /// Hooks of every currently loaded plugin, in request order. Pending
    /// entries are skipped.
    pub(crate) fn loaded(&self) -> Vec<PluginHooks> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|slot| match slot {
                PluginSlot::Loaded(hooks) => Some(hooks.clone()),
                PluginSlot::Pending { .. } => None,
            })
            .collect()
    }

    fn pending(&self) -> Vec<(usize, String)> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                PluginSlot::Pending { specifier } => Some((index, specifier.clone())),
                PluginSlot::Loaded(_) => None,
            })
            .collect()
    }

    fn set_loaded(&self, index: usize, hooks: PluginHooks) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(index) {
            *slot = PluginSlot::Loaded(hooks);
        }
    }

    /// Spawns the completion task: resolves pending entries in order,
    /// reuses already-loaded ones, hands the full ordered plugin list to
    /// `on_ready`, and only then resolves the barrier. A load failure
    /// fails the barrier instead and is surfaced by the first entry point
    /// that awaits it.
    pub(crate) fn spawn_completion<F>(self: &Arc<Self>, source: Arc<dyn PluginSource>, on_ready: F)
    where
        F: FnOnce(Vec<PluginHooks>) + Send + 'static,
    {
        let loader = Arc::clone(self);
        tokio::spawn(async move {
            for (index, specifier) in loader.pending() {
                match source.load_async(&specifier).await {
                    Ok(hooks) => {
                        debug!(specifier = %specifier, "plugin loaded asynchronously");
                        loader.set_loaded(index, hooks);
                    }
                    Err(err) => {
                        error!(
                            specifier = %specifier,
                            error = %err,
                            "asynchronous plugin load failed"
                        );
                        loader.barrier.fail(err);
                        return;
                    }
                }
            }
            on_ready(loader.loaded());
            loader.barrier.resolve();
        });
    }
}

/// Resolves a relative-path specifier against the working directory.
fn absolutize(specifier: &str, working_dir: &Path) -> String {
    if let Some(relative) = specifier.strip_prefix("./") {
        working_dir.join(relative).to_string_lossy().into_owned()
    } else if specifier.starts_with("../") {
        working_dir.join(specifier).to_string_lossy().into_owned()
    } else {
        specifier.to_string()
    }
}
