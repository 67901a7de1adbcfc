// Intake queue adapter (C7).
//
// `enqueue`/`remove` address a durable queue keyed so that everything for
// one `(org, ledger, transactionId)` collocates on one hash slot — the
// Redis Cluster "hash tag" convention (`{...}` pins the hashed segment).
// Wire encoding uses `bincode` for compactness, matching the teacher's
// daemon crate (which already depends on `bincode` for its own wire types).

use crate::error::PipelineError;
use crate::model::QueueMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One item inside a `Queue` batch (§6 "Intake queue message (binary)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub value: Vec<u8>,
}

/// The self-describing batch envelope carried over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueBatch {
    pub organization_id: String,
    pub ledger_id: String,
    pub items: Vec<QueueItem>,
}

/// Builds the hash-slot-affine queue key for one transaction.
pub fn queue_key(organization_id: &str, ledger_id: &str, transaction_id: &str) -> String {
    format!("{{{organization_id}:{ledger_id}}}:txn:{transaction_id}")
}

pub fn encode_message(message: &QueueMessage) -> Result<Vec<u8>, PipelineError> {
    bincode::serialize(message)
        .map_err(|err| PipelineError::InvalidPayload(format!("encode queue message: {err}")))
}

pub fn decode_message(bytes: &[u8]) -> Result<QueueMessage, PipelineError> {
    bincode::deserialize(bytes)
        .map_err(|err| PipelineError::InvalidPayload(format!("decode queue message: {err}")))
}

pub fn encode_batch(batch: &QueueBatch) -> Result<Vec<u8>, PipelineError> {
    bincode::serialize(batch)
        .map_err(|err| PipelineError::InvalidPayload(format!("encode queue batch: {err}")))
}

pub fn decode_batch(bytes: &[u8]) -> Result<QueueBatch, PipelineError> {
    bincode::deserialize(bytes)
        .map_err(|err| PipelineError::InvalidPayload(format!("decode queue batch: {err}")))
}

/// Durable intake queue contract (§4.7). `remove` failures are logged only —
/// a message left behind is cleaned up by the next successful drain, never
/// by failing the caller. `exchange`/`routing_key` name where the work item
/// is published (§4.10's `WORK_EXCHANGE`/`WORK_ROUTING_KEY`), the same split
/// `EventPublisher::publish` uses for events; `key` is the separate
/// hash-slot-affine address (§4.7) used to address this transaction's entry
/// for later removal.
#[async_trait]
pub trait IntakeQueue: Send + Sync {
    async fn enqueue(
        &self,
        exchange: &str,
        routing_key: &str,
        key: &str,
        message: &QueueMessage,
    ) -> Result<(), PipelineError>;

    async fn remove(&self, key: &str);
}

/// In-memory queue used by tests and by the router's direct (sync) path.
#[derive(Default)]
pub struct InMemoryIntakeQueue {
    items: Mutex<VecDeque<(String, Vec<u8>)>>,
}

impl InMemoryIntakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pop_front(&self) -> Option<QueueMessage> {
        let mut items = self.items.lock().unwrap();
        let (_, bytes) = items.pop_front()?;
        decode_message(&bytes).ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.lock().unwrap().iter().any(|(k, _)| k == key)
    }
}

#[async_trait]
impl IntakeQueue for InMemoryIntakeQueue {
    async fn enqueue(
        &self,
        _exchange: &str,
        _routing_key: &str,
        key: &str,
        message: &QueueMessage,
    ) -> Result<(), PipelineError> {
        let bytes = encode_message(message)?;
        self.items.lock().unwrap().push_back((key.to_string(), bytes));
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let mut items = self.items.lock().unwrap();
        if let Some(pos) = items.iter().position(|(k, _)| k == key) {
            items.remove(pos);
        } else {
            warn!("remove: no queue entry found for key {key}");
        }
    }
}
