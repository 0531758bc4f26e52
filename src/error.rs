//! Typed error taxonomy for the rotation engine (see spec §7).
//!
//! Soft-constraint violations are never represented here — they live in
//! [`crate::validator::Diagnostics`] and affect [`crate::scorer`] output only.

use thiserror::Error;

/// Errors the engine can return. No variant is produced by silently
/// falling back to a default; every path that can fail surfaces here.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// Malformed `TeamInput`/`SolveConfig`, or a CSV row that failed to parse.
    #[error("input error: {detail}")]
    InputError { detail: String },

    /// The CP solver proved no assignment satisfies the hard constraints.
    #[error("infeasible: {reason}")]
    Infeasible { reason: String },

    /// An attempt's time budget elapsed before a feasible solution was found.
    #[error("attempt {attempt} (seed {seed}) timed out")]
    Timeout { attempt: usize, seed: u64 },

    /// The CP backend itself failed (not a modelling infeasibility).
    #[error("attempt {attempt} (seed {seed}) solver error: {detail}")]
    SolverError {
        attempt: usize,
        seed: u64,
        detail: String,
    },

    /// The caller (or the driver's shared deadline) cancelled the solve.
    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn input(detail: impl Into<String>) -> Self {
        EngineError::InputError {
            detail: detail.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Per-attempt outcome kept by the driver so it can report *why* every
/// attempt failed rather than masquerading as a single "infeasible".
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub seed: u64,
    pub error: EngineError,
}
