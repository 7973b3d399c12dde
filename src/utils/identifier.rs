//! Process-wide identifier counter.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTIFIER: AtomicU64 = AtomicU64::new(1);

/// Returns a process-wide unique, monotonically increasing identifier.
///
/// Identifiers start at `1` and are never reused or reset; `0` is never returned.
#[must_use]
pub fn next_identifier() -> u64 {
    NEXT_IDENTIFIER.fetch_add(1, Ordering::Relaxed)
}
