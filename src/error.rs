//! Error types for the topological feature engine.
//!
//! Two families:
//! - [`ValidationError`]: a transaction or clock tick rejected by the
//!   graph store. The store is left untouched.
//! - [`EngineError`]: anything that aborts an engine call, including
//!   internal-consistency defects in filtration or reduction.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Rejection of a malformed, duplicate or out-of-order input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Amount below zero.
    #[error("transaction {id}: negative amount {amount}")]
    NegativeAmount {
        /// Offending transaction id.
        id: String,
        /// Supplied amount.
        amount: f64,
    },

    /// Amount is NaN or infinite.
    #[error("transaction {id}: amount is not finite")]
    NonFiniteAmount {
        /// Offending transaction id.
        id: String,
    },

    /// Sender and receiver are the same account.
    #[error("transaction {id}: self-transfer on account {account}")]
    SelfTransfer {
        /// Offending transaction id.
        id: String,
        /// The account on both ends.
        account: String,
    },

    /// A required identifier is empty.
    #[error("empty identifier in field `{field}`")]
    EmptyIdentifier {
        /// Field name as it appears in the input record.
        field: &'static str,
    },

    /// Transaction id seen earlier in the stream.
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(String),

    /// Timestamp runs backwards beyond the skew tolerance.
    #[error("transaction {id}: timestamp {timestamp} precedes latest accepted {latest} beyond skew tolerance")]
    OutOfOrder {
        /// Offending transaction id.
        id: String,
        /// Supplied timestamp.
        timestamp: DateTime<Utc>,
        /// Latest accepted timestamp.
        latest: DateTime<Utc>,
    },

    /// Timestamp falls before the start of the current window.
    #[error("transaction {id}: timestamp {timestamp} precedes window start {window_start}")]
    OutsideWindow {
        /// Offending transaction id.
        id: String,
        /// Supplied timestamp.
        timestamp: DateTime<Utc>,
        /// Start of the active window.
        window_start: DateTime<Utc>,
    },

    /// The account arena has no handle left for a new account.
    #[error("account limit reached, cannot register {account}")]
    AccountLimit {
        /// Account that would have been created.
        account: String,
    },

    /// Window advance requested for a time before the previous advance.
    #[error("clock regression: advance to {requested} after {current}")]
    ClockRegression {
        /// Requested window end.
        requested: DateTime<Utc>,
        /// Current window end.
        current: DateTime<Utc>,
    },
}

/// Errors that abort an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input rejected by the graph store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Closure or reduction defect; aborts the current evaluation only.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error came from input validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}
