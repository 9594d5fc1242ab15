//! Error kinds the engine distinguishes (spec §7).
//!
//! Insufficient inventory for a trade attempt and out-of-bounds move targets
//! are *not* errors here — they are the documented no-op/failure paths of
//! the Trade and Movement phases and never produce a `SimError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// An invariant the engine is supposed to maintain unconditionally was
    /// observed broken outside of Housekeeping's repair window. Fatal.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The scenario failed structural validation at construction. Fatal.
    #[error("invalid scenario: {0}")]
    ScenarioInvalid(String),

    /// The telemetry sink failed while emitting or flushing. Surfaced to
    /// the caller of `step()`; the engine's own state remains consistent —
    /// only the emitted events may be lost.
    #[error("telemetry sink failed: {0}")]
    SinkFailure(String),
}
