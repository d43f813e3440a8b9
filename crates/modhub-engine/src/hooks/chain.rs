//! Chain compiler — composes an ordered hook sequence into one callable.
//!
//! Each of the four request/response categories is an instance of
//! [`HookChain`]: hooks are folded right-to-left into a single chain whose
//! terminal link falls through to the default implementation installed for
//! the current invocation. A hook cascades by returning
//! [`HookOutcome::Declined`]; any other result short-circuits the chain.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::future::BoxFuture;
use tracing::trace;

use modhub_core::{AppError, AppResult};

use super::definitions::HookKind;

/// Boxed future returned by every hook callable.
pub type HookFuture<T> = BoxFuture<'static, AppResult<T>>;

/// Outcome of a single plugin hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome<T> {
    /// The hook produced a result; the chain stops here.
    Handled(T),
    /// The hook has no opinion; the next link handles the request.
    Declined,
}

impl<T> HookOutcome<T> {
    /// Whether this outcome cascades to the next link.
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }
}

/// Continuation handed to a hook as its trailing argument.
///
/// Invoking it runs the remainder of the chain and, ultimately, the
/// installed default implementation.
pub struct NextHook<I, C, T> {
    inner: Arc<dyn Fn(I, C) -> HookFuture<T> + Send + Sync>,
}

impl<I, C, T> Clone for NextHook<I, C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, C, T> std::fmt::Debug for NextHook<I, C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NextHook").finish()
    }
}

impl<I, C, T> NextHook<I, C, T>
where
    I: Clone + Send + 'static,
    C: Clone + Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(I, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |input, context| Box::pin(f(input, context))),
        }
    }

    /// Runs the remainder of the chain for the given input.
    pub async fn invoke(&self, input: I, context: C) -> AppResult<T> {
        (self.inner)(input, context).await
    }
}

/// A plugin hook for one category.
///
/// Receives the category input, a context value, and the trailing
/// continuation; declines with [`HookOutcome::Declined`] to cascade.
pub struct CategoryHook<I, C, T> {
    inner: Arc<dyn Fn(I, C, NextHook<I, C, T>) -> HookFuture<HookOutcome<T>> + Send + Sync>,
}

impl<I, C, T> Clone for CategoryHook<I, C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, C, T> std::fmt::Debug for CategoryHook<I, C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryHook").finish()
    }
}

impl<I, C, T> CategoryHook<I, C, T>
where
    I: Clone + Send + 'static,
    C: Clone + Send + 'static,
    T: Send + 'static,
{
    /// Wraps a closure as a category hook.
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn(I, C, NextHook<I, C, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<HookOutcome<T>>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |input, context, next| Box::pin(hook(input, context, next))),
        }
    }

    async fn invoke(&self, input: I, context: C, next: NextHook<I, C, T>) -> AppResult<HookOutcome<T>> {
        (self.inner)(input, context, next).await
    }
}

/// Host-supplied fallback for one category.
///
/// Carries the same trailing-continuation contract as a hook, but must
/// produce a result. Cheap to clone; clones share identity for the
/// self-recursion guard.
pub struct DefaultHook<I, C, T> {
    inner: Arc<dyn Fn(I, C, NextHook<I, C, T>) -> HookFuture<T> + Send + Sync>,
}

impl<I, C, T> Clone for DefaultHook<I, C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I, C, T> std::fmt::Debug for DefaultHook<I, C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultHook").finish()
    }
}

impl<I, C, T> DefaultHook<I, C, T>
where
    I: Clone + Send + 'static,
    C: Clone + Send + 'static,
    T: Send + 'static,
{
    /// Wraps a closure as a default implementation.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(I, C, NextHook<I, C, T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |input, context, next| Box::pin(f(input, context, next))),
        }
    }

    /// Invokes the default with an explicit continuation.
    pub async fn invoke(&self, input: I, context: C, next: NextHook<I, C, T>) -> AppResult<T> {
        (self.inner)(input, context, next).await
    }

    /// Whether two handles refer to the same underlying default.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Views this default as a plain continuation.
    ///
    /// The default receives itself as its own continue argument, so a
    /// default that keeps delegating still has somewhere sane to go.
    pub fn as_next(&self) -> NextHook<I, C, T> {
        let this = self.clone();
        NextHook::new(move |input, context| {
            let this = this.clone();
            async move {
                let next = this.as_next();
                this.invoke(input, context, next).await
            }
        })
    }

    pub(crate) fn from_next(next: NextHook<I, C, T>) -> Self {
        Self::new(move |input, context, _next| {
            let next = next.clone();
            async move { next.invoke(input, context).await }
        })
    }
}

/// Per-category stack of installed default implementations.
///
/// Each in-flight invocation pushes one frame; the terminal link reads the
/// most recent frame. Frames are removed by token, so an unpaired
/// interleaving cannot evict another invocation's default.
struct DefaultSlot<I, C, T> {
    frames: Mutex<Vec<(u64, DefaultHook<I, C, T>)>>,
    next_token: AtomicU64,
}

impl<I, C, T> DefaultSlot<I, C, T> {
    fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        }
    }

    fn install(self: &Arc<Self>, default: DefaultHook<I, C, T>) -> SlotFrame<I, C, T> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, default));
        SlotFrame {
            slot: Arc::clone(self),
            token,
        }
    }

    fn current(&self) -> Option<DefaultHook<I, C, T>> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, default)| default.clone())
    }
}

/// RAII frame restoring the default slot on every exit path.
struct SlotFrame<I, C, T> {
    slot: Arc<DefaultSlot<I, C, T>>,
    token: u64,
}

impl<I, C, T> Drop for SlotFrame<I, C, T> {
    fn drop(&mut self) {
        self.slot
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(token, _)| *token != self.token);
    }
}

struct CompiledChain<I, C, T> {
    generation: u64,
    chain: NextHook<I, C, T>,
}

/// One category's composed pipeline: the ordered hook sequence, the
/// memoized compiled chain, and the default slot shared by its links.
pub struct HookChain<I, C, T> {
    kind: HookKind,
    sequence: RwLock<Arc<Vec<CategoryHook<I, C, T>>>>,
    generation: AtomicU64,
    compiled: Mutex<Option<CompiledChain<I, C, T>>>,
    slot: Arc<DefaultSlot<I, C, T>>,
    own_entry: DefaultHook<I, C, T>,
}

impl<I, C, T> std::fmt::Debug for HookChain<I, C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain").field("kind", &self.kind).finish()
    }
}

impl<I, C, T> HookChain<I, C, T>
where
    I: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new(kind: HookKind, own_entry: DefaultHook<I, C, T>) -> Self {
        Self {
            kind,
            sequence: RwLock::new(Arc::new(Vec::new())),
            generation: AtomicU64::new(0),
            compiled: Mutex::new(None),
            slot: Arc::new(DefaultSlot::new()),
            own_entry,
        }
    }

    /// Replaces the hook sequence wholesale, invalidating the compiled
    /// chain. Called after the synchronous load pass and again when the
    /// completion barrier recomputes the registry.
    pub(crate) fn replace_sequence(&self, hooks: Vec<CategoryHook<I, C, T>>) {
        *self
            .sequence
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(hooks);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Canonical entry hook of this category, used by the self-recursion
    /// guard's identity check.
    pub(crate) fn entry_hook(&self) -> DefaultHook<I, C, T> {
        self.own_entry.clone()
    }

    /// Runs the composed chain with the caller-supplied default installed
    /// for the duration of this invocation.
    pub(crate) async fn dispatch(
        &self,
        input: I,
        context: C,
        default: DefaultHook<I, C, T>,
    ) -> AppResult<T> {
        // A provided default that is this category's own entry point would
        // make the terminal link re-enter the chain forever; strip it, so
        // the terminal falls back to the enclosing invocation's default.
        let installed = (!default.ptr_eq(&self.own_entry)).then_some(default);
        let _frame = installed.map(|default| self.slot.install(default));
        self.compiled().invoke(input, context).await
    }

    fn compiled(&self) -> NextHook<I, C, T> {
        let generation = self.generation.load(Ordering::Acquire);
        let mut cache = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.generation == generation {
                return cached.chain.clone();
            }
        }
        let sequence = self
            .sequence
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        trace!(kind = %self.kind, hooks = sequence.len(), "compiling hook chain");
        let chain = compile(&sequence, &self.slot, self.kind);
        *cache = Some(CompiledChain {
            generation,
            chain: chain.clone(),
        });
        chain
    }
}

/// Folds an ordered hook sequence (index 0 = highest precedence) into a
/// single continuation, right to left, on top of the terminal default link.
fn compile<I, C, T>(
    hooks: &[CategoryHook<I, C, T>],
    slot: &Arc<DefaultSlot<I, C, T>>,
    kind: HookKind,
) -> NextHook<I, C, T>
where
    I: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let slot = Arc::clone(slot);
    let mut link = NextHook::new(move |input, context| {
        let slot = Arc::clone(&slot);
        async move {
            let Some(default) = slot.current() else {
                return Err(AppError::plugin(format!(
                    "no default implementation installed for the \"{}\" hook",
                    kind.as_str()
                )));
            };
            let next = default.as_next();
            default.invoke(input, context, next).await
        }
    });

    for hook in hooks.iter().rev() {
        let hook = hook.clone();
        let next = link;
        link = NextHook::new(move |input: I, context: C| {
            let hook = hook.clone();
            let next = next.clone();
            async move {
                match hook.invoke(input.clone(), context.clone(), next.clone()).await? {
                    HookOutcome::Handled(value) => Ok(value),
                    HookOutcome::Declined => next.invoke(input, context).await,
                }
            }
        });
    }

    link
}
