// Error taxonomy for the cognitive pipeline.
//
// The pipeline is fail-open at every boundary (see design note in
// SPEC_FULL.md §4.10): Transient, Input, and Resource failures are absorbed
// internally and never reach a caller as an `Err` — they exist here only so
// internal code has a name to log under. Only CorruptModel (an Integrity
// failure restoring a persisted blob) and Fatal (Offline degradation or a
// tripped passthrough failsafe) are ever returned to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Recovered locally: a reflex call or LLM call timed out. Treated as
    /// "no verdict" by the caller, which proceeds to the next layer.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed token or oversize payload. Sanitized silently; never
    /// surfaced to callers.
    #[error("input rejected: {0}")]
    Input(String),

    /// Memory or session cap reached. Absorbed by eviction in the session
    /// store; never surfaced.
    #[error("resource exhausted: {0}")]
    Resource(String),

    /// A persisted predictor or classifier blob failed to deserialize.
    /// Construction falls back to a fresh model; this variant is logged.
    #[error("corrupt model: {0}")]
    CorruptModel(String),

    /// Offline degradation or a tripped passthrough failsafe. The Director
    /// stops producing content; the outer service may pass traffic through
    /// unchanged.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    pub fn is_fail_open(&self) -> bool {
        !matches!(self, CoreError::CorruptModel(_) | CoreError::Fatal(_))
    }
}
