//! Human-readable rendering of the Unix timestamps carried by versions and
//! changesets, used only in diagnostics (the wire format itself emits raw
//! epoch seconds, spec.md §6).

use chrono::{DateTime, Utc};

/// Formats `epoch` (seconds since the Unix epoch, UTC) as RFC 3339 for
/// `tracing` output. Falls back to the raw integer if the value is out of
/// `chrono`'s representable range, which should never happen for real CVS
/// timestamps but must not panic on adversarial input.
pub fn format_epoch(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("<epoch {epoch}>"))
}
