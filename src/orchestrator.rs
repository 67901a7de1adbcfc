// Write pipeline orchestrator (C8) — the core algorithm.
//
// Drives C1-C7 through one relational transaction per message. Dependencies
// are `Arc<dyn Trait + Send + Sync>` rather than borrowed references because
// the post-commit fanout step (§4.3 step 6) spawns a detached `tokio::spawn`
// task that must be `'static`, the same shape the teacher uses for its
// escrow auto-release loop's background work.

use crate::amount::{self, BalanceAmounts};
use crate::cache::BalanceCache;
use crate::error::PipelineError;
use crate::events::{self, EventPublisher};
use crate::model::{
    AliasAmount, BalanceSnapshotEntry, QueueMessage, Transaction, TransactionStatus,
};
use crate::queue::{self, IntakeQueue};
use crate::store::{BalanceUpdate, RelationalStore, RelationalTransaction};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The capability set the orchestrator needs, bundled so callers (the
/// router, the worker runtime) construct it once at startup.
#[derive(Clone)]
pub struct Dependencies {
    pub relational: Arc<dyn RelationalStore>,
    pub cache: Arc<dyn BalanceCache>,
    pub events: Arc<dyn EventPublisher>,
    pub queue: Arc<dyn IntakeQueue>,
}

/// Runs one message through the full write pipeline (§4.3) and returns the
/// committed transaction plus a handle to the detached post-commit fanout
/// task. Callers may drop the handle to treat fanout as pure fire-and-forget,
/// or await it (as the orchestrator's own tests do) for deterministic checks.
pub async fn orchestrate(
    deps: &Dependencies,
    message: QueueMessage,
) -> Result<(Transaction, JoinHandle<()>), PipelineError> {
    validate_preconditions(&message)?;

    let mut tx = deps.relational.begin().await?;

    let result = run_steps(deps, &mut *tx, &message).await;
    let transaction = match result {
        Ok(transaction) => transaction,
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback after pipeline failure also failed: {rollback_err}");
            }
            return Err(err);
        }
    };

    tx.commit().await?;

    let handle = spawn_post_commit_fanout(deps, &message, &transaction);

    Ok((transaction, handle))
}

async fn run_steps(
    deps: &Dependencies,
    tx: &mut dyn RelationalTransaction,
    message: &QueueMessage,
) -> Result<Transaction, PipelineError> {
    if message.draft_transaction.status != TransactionStatus::Noted {
        update_balances(deps, tx, message).await?;
    }

    let transaction = create_or_update_transaction(tx, message).await?;

    insert_operations(tx, &transaction).await?;
    insert_outbox_entries(tx, &transaction).await?;

    Ok(transaction)
}

fn validate_preconditions(message: &QueueMessage) -> Result<(), PipelineError> {
    let draft = &message.draft_transaction;

    if draft.organization_id != message.organization_id || draft.ledger_id != message.ledger_id {
        return Err(PipelineError::InvalidPayload(
            "draft transaction tenant fields do not match the message tenant".to_string(),
        ));
    }

    if draft.id.is_empty() {
        return Err(PipelineError::InvalidPayload(
            "draft transaction is missing an id".to_string(),
        ));
    }

    if draft.status != TransactionStatus::Noted && message.validated_amounts.is_empty() {
        return Err(PipelineError::InvalidPayload(
            "non-NOTED transaction carries no validated amounts".to_string(),
        ));
    }

    Ok(())
}

struct Candidate<'a> {
    entry: &'a BalanceSnapshotEntry,
    amount: &'a AliasAmount,
    pre: BalanceAmounts,
    version: u64,
    is_stale: bool,
}

async fn update_balances(
    deps: &Dependencies,
    tx: &mut dyn RelationalTransaction,
    message: &QueueMessage,
) -> Result<(), PipelineError> {
    let mut candidates = Vec::new();
    for entry in &message.balance_snapshots {
        let Some(amount) = message.validated_amounts.for_alias(&entry.key.alias) else {
            continue;
        };
        let cached = deps.cache.get(&entry.key).await;
        let is_stale = cached.is_some_and(|c| c.version > entry.snapshot.version);
        candidates.push(Candidate {
            entry,
            amount,
            pre: entry.snapshot.amounts(),
            version: entry.snapshot.version,
            is_stale,
        });
    }

    if candidates.is_empty() {
        return Ok(());
    }

    // Refresh every stale candidate against the cache's current view before
    // computing the new state for anyone — fresh candidates pass through
    // untouched (§4.1: both the "some stale" and "all stale" branches reduce
    // to this per-candidate rule).
    for candidate in candidates.iter_mut().filter(|c| c.is_stale) {
        let refreshed = deps.cache.get(&candidate.entry.key).await.ok_or_else(|| {
            PipelineError::StaleBalanceUpdateSkipped(format!(
                "cache entry vanished during refresh for balance {}",
                candidate.entry.id
            ))
        })?;
        candidate.pre = refreshed.amounts();
        candidate.version = refreshed.version;
    }

    let mut updates = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let post = amount::apply(&candidate.pre, candidate.amount.kind, &candidate.amount.amount)?;
        updates.push(BalanceUpdate {
            id: candidate.entry.id.clone(),
            expected_version: candidate.version,
            new_available: post.available,
            new_on_hold: post.on_hold,
            new_version: candidate.version + 1,
        });
    }

    let outcome = tx
        .bulk_update_balances(&message.organization_id, &message.ledger_id, updates)
        .await?;

    for candidate in &candidates {
        if !outcome.was_applied(&candidate.entry.id) {
            return Err(PipelineError::ConcurrentBalanceUpdate);
        }
    }

    Ok(())
}

async fn create_or_update_transaction(
    tx: &mut dyn RelationalTransaction,
    message: &QueueMessage,
) -> Result<Transaction, PipelineError> {
    let mut draft = message.draft_transaction.clone();
    if draft.status == TransactionStatus::Created {
        draft.status = TransactionStatus::Approved;
    }

    let outcome = tx.insert_transaction(&draft).await?;

    if draft.status == TransactionStatus::Pending && draft.parsed_intent.is_none() {
        let has_existing_body = match &outcome {
            crate::store::InsertTransactionOutcome::AlreadyExists(existing) => {
                existing.parsed_intent.is_some()
            }
            crate::store::InsertTransactionOutcome::Inserted => false,
        };
        if !has_existing_body {
            return Err(PipelineError::InvalidPayload(
                "PENDING draft has no parsed body and no existing row to inherit one from"
                    .to_string(),
            ));
        }
    }

    let transaction = match outcome {
        crate::store::InsertTransactionOutcome::Inserted => draft,
        crate::store::InsertTransactionOutcome::AlreadyExists(existing) => {
            let is_terminal_rewrite = existing.status == TransactionStatus::Pending
                && matches!(
                    draft.status,
                    TransactionStatus::Approved | TransactionStatus::Canceled
                );
            if is_terminal_rewrite {
                tx.update_transaction_status(&existing.id, draft.status).await?;
                let mut updated = *existing;
                updated.status = draft.status;
                // the draft's operations are authoritative for the terminal
                // transition even though the row itself already existed.
                updated.operations = draft.operations;
                updated.parsed_intent = draft.parsed_intent.or(updated.parsed_intent);
                updated.metadata = draft.metadata.or(updated.metadata);
                updated
            } else {
                debug!("transaction {} already exists, not re-inserting", existing.id);
                draft
            }
        }
    };

    Ok(transaction)
}

async fn insert_operations(
    tx: &mut dyn RelationalTransaction,
    transaction: &Transaction,
) -> Result<(), PipelineError> {
    if transaction.status != TransactionStatus::Noted && transaction.operations.is_empty() {
        return Err(PipelineError::InvalidPayload(format!(
            "transaction {} has no operations for status {}",
            transaction.id,
            transaction.status.as_str()
        )));
    }

    for operation in &transaction.operations {
        tx.insert_operation_ignore_conflict(operation).await?;
    }

    Ok(())
}

async fn insert_outbox_entries(
    tx: &mut dyn RelationalTransaction,
    transaction: &Transaction,
) -> Result<(), PipelineError> {
    if transaction.has_metadata() {
        tx.insert_outbox_ignore_conflict(crate::model::OutboxEntry {
            entity_type: crate::model::EntityType::Transaction,
            entity_id: transaction.id.clone(),
            payload: transaction.metadata.clone().unwrap_or_default(),
            created_at: chrono::Utc::now(),
        })
        .await?;
    }

    for operation in &transaction.operations {
        if operation.has_metadata() {
            tx.insert_outbox_ignore_conflict(crate::model::OutboxEntry {
                entity_type: crate::model::EntityType::Operation,
                entity_id: operation.id.clone(),
                payload: operation.metadata.clone().unwrap_or_default(),
                created_at: chrono::Utc::now(),
            })
            .await?;
        }
    }

    Ok(())
}

fn spawn_post_commit_fanout(
    deps: &Dependencies,
    message: &QueueMessage,
    transaction: &Transaction,
) -> JoinHandle<()> {
    let events_publisher = Arc::clone(&deps.events);
    let intake_queue = Arc::clone(&deps.queue);
    let fanout_transaction = transaction.clone();
    let queue_key = queue::queue_key(
        &message.organization_id,
        &message.ledger_id,
        &transaction.id,
    );

    let fanout = async move {
        events::publish_status_change(&*events_publisher, &fanout_transaction).await;
        intake_queue.remove(&queue_key).await;
    };

    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(fanout).catch_unwind().await {
            metrics::counter!("pipeline_fanout_panics_total").increment(1);
            error!("post-commit fanout task panicked: {panic:?}");
        }
    })
}
