// Sync/async write router (C9).
//
// A single entry point chooses between publishing to the work queue (async
// mode, consumed by the worker runtime in `worker.rs`) and calling the
// orchestrator directly in-process (sync mode). If the async publish fails,
// it falls back to the direct path so both routes converge on the same
// post-state — the teacher's escrow module takes the same "best path, with
// an in-process fallback on bus failure" stance for auto-release scheduling.

use crate::config;
use crate::error::PipelineError;
use crate::model::{QueueMessage, Transaction};
use crate::orchestrator::{self, Dependencies};
use crate::queue;
use tokio::task::JoinHandle;

/// Routes one message to either the work queue or the orchestrator,
/// returning the resulting transaction. When the async path is taken and
/// the message is accepted by the queue, the caller gets back the draft
/// transaction as currently known — the worker runtime completes the write
/// later when it dequeues the message.
pub async fn write(
    deps: &Dependencies,
    message: QueueMessage,
) -> Result<RouteOutcome, PipelineError> {
    write_with_mode(deps, message, config::async_mode_enabled()).await
}

/// The routing decision, parameterized on the async-mode flag so it can be
/// exercised directly in tests without depending on process-global env vars
/// (the `lazy_static` config cache is read once per process and can't be
/// flipped mid-suite).
async fn write_with_mode(
    deps: &Dependencies,
    message: QueueMessage,
    async_mode: bool,
) -> Result<RouteOutcome, PipelineError> {
    if async_mode {
        let key = queue::queue_key(
            &message.organization_id,
            &message.ledger_id,
            &message.draft_transaction.id,
        );
        let publish = deps
            .queue
            .enqueue(config::work_exchange(), config::work_routing_key(), &key, &message)
            .await;
        match publish {
            Ok(()) => {
                metrics::counter!("pipeline_router_enqueued_total").increment(1);
                return Ok(RouteOutcome::Enqueued(message.draft_transaction));
            }
            Err(err) => {
                warn!(
                    "async publish failed for transaction {}, falling back to direct orchestration: {err}",
                    message.draft_transaction.id
                );
                metrics::counter!("pipeline_router_fallback_total").increment(1);
            }
        }
    }

    let (transaction, handle) = orchestrator::orchestrate(deps, message).await?;
    Ok(RouteOutcome::Orchestrated(transaction, handle))
}

/// What `write` actually did, so callers can tell a same-process commit from
/// a queued-for-later one without inspecting transaction status.
pub enum RouteOutcome {
    /// Handed off to the work queue; the worker runtime will commit it.
    Enqueued(Transaction),
    /// Orchestrated in-process (sync mode, or async mode's publish-failure fallback).
    Orchestrated(Transaction, JoinHandle<()>),
}

impl RouteOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            RouteOutcome::Enqueued(transaction) => transaction,
            RouteOutcome::Orchestrated(transaction, _) => transaction,
        }
    }
}
