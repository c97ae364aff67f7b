//! The progress-rendering seam. Progress-bar rendering itself is named as
//! an external collaborator out of scope for this specification (§1); the
//! engine only owns the counters and calls into this narrow interface on
//! every phase transition and per-entry update, per §4.11.

use elephant_utils::types::ProgressMetrics;

use crate::outcome::Phase;

/// Consumes phase transitions and metric snapshots. Implementations range
/// from a terminal progress bar to a no-op (tests, headless runs).
pub trait ProgressSink: Send + Sync {
    fn on_phase(&self, phase: Phase, metrics: &ProgressMetrics);
}

/// The default sink: does nothing. Used when no renderer is attached.
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn on_phase(&self, _phase: Phase, _metrics: &ProgressMetrics) {}
}

/// A sink that logs each phase transition at `info`, matching the
/// human-readable progress message requirement in spec §7 for
/// environments without a terminal UI attached.
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_phase(&self, phase: Phase, metrics: &ProgressMetrics) {
        tracing::info!(
            phase = phase.label(),
            scanned = metrics.scanned,
            valid = metrics.valid,
            invalid = metrics.invalid,
            skipped = metrics.skipped,
            uploaded = metrics.uploaded,
            submitted = metrics.submitted,
            "phase transition"
        );
    }
}
