//! Process-wide verbose-trace switch.
//!
//! Setting the `HTTP_DBG` environment variable to any non-empty value before
//! the first request enables per-request wire diagnostics on the configured
//! `tracing` subscriber. The flag can also be flipped at runtime; updates
//! carry no ordering guarantees.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static DEBUG: OnceLock<AtomicBool> = OnceLock::new();

fn flag() -> &'static AtomicBool {
    DEBUG.get_or_init(|| {
        let enabled = std::env::var("HTTP_DBG").map(|v| !v.is_empty()).unwrap_or(false);
        AtomicBool::new(enabled)
    })
}

/// Whether verbose request tracing is enabled.
pub fn debug_enabled() -> bool {
    flag().load(Ordering::Relaxed)
}

/// Toggles verbose request tracing at runtime.
pub fn set_debug(enabled: bool) {
    flag().store(enabled, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_at_runtime() {
        let initial = debug_enabled();
        set_debug(!initial);
        assert_eq!(debug_enabled(), !initial);
        set_debug(initial);
        assert_eq!(debug_enabled(), initial);
    }
}
