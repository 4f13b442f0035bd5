//! Domain-specific error types for the order-processing core.
//!
//! Each subsystem gets its own enum so callers can match on the precise
//! failure; [`EngineError`] unifies them for code that just wants to log
//! and move on (see spec §7's propagation policy).

use thiserror::Error;

use crate::ids::Id;

/// Errors raised by the [`crate::reference::ReferenceStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceStoreError {
    #[error("reference entity {0:?} not found")]
    NotFound(Id),
}

/// Errors raised by the [`crate::store::OrderStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    #[error("client order id already in use: {0}")]
    DuplicateClientOrderId(String),
    #[error("order {0:?} not found")]
    OrderNotFound(Id),
    #[error("store invariant violated: {0}")]
    StoreInvariantViolated(String),
}

/// Errors raised by the [`crate::book::OrderBook`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order {0:?} not resting in the book")]
    OrderNotInBook(Id),
    #[error("instrument {0:?} is not registered with the book")]
    InstrumentNotRegistered(Id),
}

/// Validation failures surfaced as a `Rejected` state transition (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order is invalid: {0}")]
    InvalidOrder(String),
    #[error("client order id already in use: {0}")]
    DuplicateClientOrderId(String),
    #[error("unknown instrument {0:?}")]
    UnknownInstrument(Id),
    #[error("unknown account {0:?}")]
    UnknownAccount(Id),
    #[error("no opposite-side liquidity for market order")]
    NoMarketForMarketOrder,
}

/// Raised by the state machine when no transition row matches `(state, event)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal transition: no row for state {state:?} and event {event}")]
pub struct IllegalTransition {
    pub state: i32,
    pub event: &'static str,
}

/// Errors raised while executing or rolling back a [`crate::transaction::Transaction`].
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error(transparent)]
    Store(#[from] OrderStoreError),
    #[error(transparent)]
    Book(#[from] BookError),
    #[error("too many related objects in transaction scope (cap is {cap})")]
    TooManyRelatedObjects { cap: usize },
}

/// Errors raised by the durable log.
#[derive(Debug, Error)]
pub enum DurableLogError {
    #[error("record {id:?} version {version} already exists")]
    DuplicateKey { id: Id, version: u32 },
    #[error("record {id:?} version {version} not found")]
    VersionNotFound { id: Id, version: u32 },
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("record body truncated for {0:?}")]
    StorageBodyTruncated(Id),
}

/// Errors raised while replaying the log on startup.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Durable(#[from] DurableLogError),
    #[error(transparent)]
    Store(#[from] OrderStoreError),
    #[error(transparent)]
    Book(#[from] BookError),
    #[error("unable to open data directory: {0}")]
    CannotOpenDataDir(String),
}

/// Crate-wide error type for code paths that want a single `Result`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error(transparent)]
    Reference(#[from] ReferenceStoreError),
    #[error(transparent)]
    Store(#[from] OrderStoreError),
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Durable(#[from] DurableLogError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

impl EngineError {
    /// The text propagated into a reject/cancel-reject exec report (spec §9
    /// Open Question: populate `reason` from the triggering error's message
    /// rather than a fixed placeholder).
    pub fn reject_reason(&self) -> String {
        self.to_string()
    }
}
