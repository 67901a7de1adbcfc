use super::balance_store::{BalanceUpdate, BulkUpdateOutcome};
use crate::error::PipelineError;
use crate::model::{Operation, OutboxEntry, Transaction, TransactionStatus};
use async_trait::async_trait;

/// Outcome of inserting a transaction row (§4.3 step 2).
#[derive(Debug, Clone)]
pub enum InsertTransactionOutcome {
    /// No row existed for this id; the new row is now present.
    Inserted,
    /// A row already existed — the idempotent retry path. Carries the
    /// existing row so the orchestrator can decide on a status transition.
    AlreadyExists(Box<Transaction>),
}

/// A single relational transaction `T` (§4.3, §5). Every mutating call here
/// happens inside one transaction; `commit`/`rollback` end its lifetime.
/// Implementors MUST NOT perform bus I/O from within a `RelationalTransaction`
/// (§5: "MUST NOT call the bus while holding it").
#[async_trait]
pub trait RelationalTransaction: Send + Sync {
    async fn bulk_update_balances(
        &mut self,
        organization_id: &str,
        ledger_id: &str,
        updates: Vec<BalanceUpdate>,
    ) -> Result<BulkUpdateOutcome, PipelineError>;

    async fn insert_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<InsertTransactionOutcome, PipelineError>;

    async fn update_transaction_status(
        &mut self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<(), PipelineError>;

    /// Insert-or-ignore-on-conflict(id). Returns `true` if a new row was added.
    async fn insert_operation_ignore_conflict(
        &mut self,
        operation: &Operation,
    ) -> Result<bool, PipelineError>;

    /// Insert-or-ignore-on-conflict(entity_type, entity_id). Returns `true`
    /// if a new row was added.
    async fn insert_outbox_ignore_conflict(
        &mut self,
        entry: OutboxEntry,
    ) -> Result<bool, PipelineError>;

    async fn commit(&mut self) -> Result<(), PipelineError>;

    async fn rollback(&mut self) -> Result<(), PipelineError>;
}

/// Factory for relational transactions, so the orchestrator never holds more
/// than one at a time (§5 "MUST hold only one relational transaction at a time").
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RelationalTransaction>, PipelineError>;
}
