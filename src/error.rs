use thiserror::Error;

/// Crate-wide error taxonomy for the write pipeline.
///
/// Variants are grouped by the component that raises them (see SPEC_FULL.md §7).
/// `retriable()` tells callers (the worker runtime, the router's fallback path)
/// whether redelivery is expected to make progress.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("scale mismatch: expected {expected}, got {got}")]
    ScaleMismatch { expected: u32, got: u32 },

    #[error("arithmetic overflow computing new balance")]
    Overflow,

    #[error("stale balance update skipped, cache read failed: {0}")]
    StaleBalanceUpdateSkipped(String),

    #[error("concurrent balance update: persisted version did not reach the computed version")]
    ConcurrentBalanceUpdate,

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(String),

    #[error("duplicate operation {0}")]
    DuplicateOperation(String),

    #[error("duplicate outbox entry for {entity_type}/{entity_id}")]
    DuplicateOutboxEntry { entity_type: String, entity_id: String },

    #[error("duplicate metadata for {entity_type}/{entity_id}")]
    DuplicateMetadata { entity_type: String, entity_id: String },

    #[error("index already exists for {entity_type}.{key}")]
    IndexAlreadyExists { entity_type: String, key: String },

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("balances not deletable: {0}")]
    BalancesNotDeletable(String),

    #[error("unknown transaction status: {0}")]
    UnknownStatus(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the worker runtime should NACK/redeliver the message that
    /// produced this error, per SPEC_FULL.md §7's propagation policy.
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            PipelineError::StaleBalanceUpdateSkipped(_)
                | PipelineError::ConcurrentBalanceUpdate
                | PipelineError::PersistenceFailure(_)
        )
    }

    /// Whether this error represents an idempotent no-op that should be
    /// absorbed rather than surfaced as a failure to the caller.
    pub fn is_idempotent_absorbable(&self) -> bool {
        matches!(
            self,
            PipelineError::DuplicateTransaction(_)
                | PipelineError::DuplicateOperation(_)
                | PipelineError::DuplicateOutboxEntry { .. }
                | PipelineError::DuplicateMetadata { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
