// Worker runtime (C10).
//
// Consumes decoded queue messages and drives the orchestrator, bounding the
// number of messages in flight with a `tokio::sync::Semaphore` — the same
// bounded-concurrency shape the teacher's daemon crate uses for parallel
// task execution (`PARALLEL_EXECUTION_ENABLED`-gated worker pools).

use crate::error::PipelineError;
use crate::model::QueueMessage;
use crate::orchestrator::{self, Dependencies};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs messages through the orchestrator with at most `max_in_flight`
/// concurrently outstanding. One message's failure is logged and counted;
/// it never aborts the others already in flight or yet to be polled.
pub struct Worker {
    deps: Dependencies,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    pub fn new(deps: Dependencies, max_in_flight: usize) -> Self {
        Self {
            deps,
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Drains `messages` to completion, bounded by `max_in_flight`. Returns
    /// once every message has been attempted; does not wait for each
    /// message's post-commit fanout task, only for the orchestrator's own
    /// commit/rollback decision.
    pub async fn drain(&self, messages: Vec<QueueMessage>) {
        let mut handles = Vec::with_capacity(messages.len());
        for message in messages {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("worker semaphore is never closed");
            let deps = self.deps.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                process_one(&deps, message).await;
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!("worker task panicked: {err}");
                metrics::counter!("pipeline_worker_task_panics_total").increment(1);
            }
        }
    }
}

async fn process_one(deps: &Dependencies, message: QueueMessage) {
    let transaction_id = message.draft_transaction.id.clone();
    metrics::counter!("pipeline_worker_messages_received_total").increment(1);

    match orchestrator::orchestrate(deps, message).await {
        Ok((_, fanout)) => {
            metrics::counter!("pipeline_worker_messages_committed_total").increment(1);
            // deliberately not awaited: fanout is best-effort and may outlive
            // this call, per the detached-task design (§5).
            drop(fanout);
        }
        Err(err) => handle_failure(&transaction_id, err),
    }
}

fn handle_failure(transaction_id: &str, err: PipelineError) {
    if err.is_idempotent_absorbable() {
        debug!("absorbed idempotent error for transaction {transaction_id}: {err}");
        return;
    }

    if err.retriable() {
        warn!("retriable failure processing transaction {transaction_id}, message will be redelivered: {err}");
        metrics::counter!("pipeline_worker_retriable_failures_total").increment(1);
    } else {
        error!("non-retriable failure processing transaction {transaction_id}: {err}");
        metrics::counter!("pipeline_worker_fatal_failures_total").increment(1);
    }
}
