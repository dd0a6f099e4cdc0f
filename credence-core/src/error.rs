//! Error types for CREDENCE core

use thiserror::Error;

/// Result type alias using CredenceError
pub type Result<T> = std::result::Result<T, CredenceError>;

/// Errors that can occur in CREDENCE core operations
#[derive(Error, Debug)]
pub enum CredenceError {
    /// Trust matrix does not cover every peer referenced by a response set.
    /// Fatal for the batch being processed.
    #[error("Trust matrix is inconsistent with responses: expected {expected} peers, got {actual}")]
    MatrixInconsistency { expected: usize, actual: usize },

    /// A peer referenced by a response set is missing from the trust matrix.
    /// Fatal for the batch being processed.
    #[error("Peer {0} is not present in the trust matrix")]
    PeerNotInMatrix(String),

    /// A single response batch referenced more than one target.
    #[error("Responses reference multiple targets ({0} distinct)")]
    MixedTargets(usize),

    /// A single recommendation batch referenced more than one subject.
    #[error("Recommendation responses reference multiple subjects ({0} distinct)")]
    MixedSubjects(usize),

    /// All weights in an aggregation or recommendation update were zero.
    /// Recoverable: skip the update and keep prior state.
    #[error("Insufficient trusted input: all weights are zero")]
    InsufficientTrust,

    /// An engine was invoked with an empty history.
    #[error("History for peer {0} is empty")]
    EmptyHistory(String),
}
