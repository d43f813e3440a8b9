//! Suspension capability probe.
//!
//! The preload entry point is synchronous in the host contract, yet it must
//! not observe the hook registry before the completion barrier resolves.
//! Bridging the two requires blocking-style suspension: parking the current
//! thread on a future. Tokio only permits that on multi-thread runtimes, so
//! the probe checks the flavor of the runtime this engine was built on.

use std::future::Future;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::warn;

#[derive(Debug, Clone)]
enum SuspensionSupport {
    Blocking(Handle),
    Unsupported,
}

/// Result of probing the hosting runtime for blocking-style suspension.
///
/// Computed once per engine instance; the detection itself is pure and
/// idempotent.
#[derive(Debug, Clone)]
pub struct SuspensionProbe {
    support: SuspensionSupport,
}

impl SuspensionProbe {
    /// Probes the current runtime. Emits a non-fatal diagnostic when
    /// blocking suspension is unavailable, since preload-code support is
    /// degraded in that case.
    pub fn detect() -> Self {
        let support = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                SuspensionSupport::Blocking(handle)
            }
            _ => SuspensionSupport::Unsupported,
        };
        if matches!(support, SuspensionSupport::Unsupported) {
            warn!(
                "blocking suspension is unavailable on this runtime; \
                 preload code aggregation is disabled"
            );
        }
        Self { support }
    }

    /// Whether blocking-style suspension is available.
    pub fn is_supported(&self) -> bool {
        matches!(self.support, SuspensionSupport::Blocking(_))
    }

    /// Runs a future to completion by parking the current thread, or
    /// returns `None` when blocking suspension is unavailable.
    pub fn block_on<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        match &self.support {
            SuspensionSupport::Blocking(handle) => {
                let handle = handle.clone();
                Some(tokio::task::block_in_place(move || handle.block_on(future)))
            }
            SuspensionSupport::Unsupported => None,
        }
    }
}
