//! Error type for tape and adjoint-variable operations.

use thiserror::Error;

/// Contract violations raised by the adjoint tape.
///
/// Every variant aborts only the offending call: the tape is left exactly as
/// it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeError {
    /// Activation attempted while this thread already has an active tape of
    /// the same precision (possibly the same tape).
    #[error("A tape is already active for the current thread")]
    TapeAlreadyActive,

    /// A derivative-dependent operation was attempted with no active tape.
    #[error("No active tape for the current thread")]
    NoTape,

    /// The operation needs this particular tape to be the active one.
    #[error("tape {id} is not the active tape for the current thread")]
    InactiveTape { id: u64 },

    /// A derivative slot outside the tape's current derivative storage.
    #[error("given derivative slot is out of range - did you register the outputs?")]
    SlotOutOfRange { slot: u32, len: u32 },

    /// A tape position beyond the current end of the tape.
    #[error("tape position {position} is beyond the current position {current}")]
    PositionOutOfRange { position: u32, current: u32 },

    /// `compute_adjoints` was called before any derivative was seeded.
    #[error("At least one derivative must be set before computing adjoints")]
    DerivativesNotInitialized,
}

impl TapeError {
    /// True for both flavours of out-of-range index (slot or position).
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            TapeError::SlotOutOfRange { .. } | TapeError::PositionOutOfRange { .. }
        )
    }
}

/// Result alias used throughout the tape API.
pub type Result<T, E = TapeError> = std::result::Result<T, E>;
