//! Debug trace helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static FORCED: AtomicBool = AtomicBool::new(false);

/// Force the verbose trace on regardless of `PURE_DEBUG_TRACE`.
pub(crate) fn force_trace() {
    FORCED.store(true, Ordering::Relaxed);
}

pub(crate) fn trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    FORCED.load(Ordering::Relaxed)
        || *ENABLED.get_or_init(|| std::env::var_os("PURE_DEBUG_TRACE").is_some())
}

pub(crate) fn trace_debug(message: impl FnOnce() -> String) {
    if trace_enabled() {
        tracing::debug!(target: "pure_debug::trace", "{}", message());
    }
}
