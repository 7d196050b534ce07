use crate::request::RequestStatus;

/// Failures raised by the ledger store itself. The store owns the
/// non-negativity guard; business preconditions stay with the engines.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("insufficient stock for {key}: {available} on hand, {requested} requested")]
    InsufficientStock {
        key: String,
        available: f64,
        requested: f64,
    },
    #[error("no ledger entry for {0}")]
    MissingEntry(String),
    #[error("request {id} changed before the write: expected {expected:?}, found {found:?}")]
    StaleRequest {
        id: String,
        expected: RequestStatus,
        found: RequestStatus,
    },
    #[error("stock counter for {key} would overflow")]
    CounterOverflow { key: String },
    #[error("failed to mint record id: {0}")]
    IdMint(String),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(String),
    #[error(transparent)]
    Storage(#[from] sled::Error),
}

/// Failures raised by the engines before any ledger mutation.
#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("request {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: String,
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("insufficient raw material: {available}m on hand, {required}m required")]
    InsufficientRawMaterial { available: f64, required: f64 },
    #[error("{party_id} is not authorized to act on {entity} {id}")]
    UnauthorizedParty {
        party_id: String,
        entity: &'static str,
        id: String,
    },
    #[error("quantity must be positive")]
    NonPositiveQuantity,
}
