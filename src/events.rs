// Event publisher (C6).
//
// Wraps a committed transaction in an envelope and publishes it to a topic
// bus with routing key `<source>.<type>.<status>`. Controlled by the
// `EVENTS_ENABLED` feature flag (default on); failures are logged and
// dropped, matching the teacher's stance that the outbox — not the event
// bus — is the durable record downstream consumers fall back to.

use crate::config;
use crate::error::PipelineError;
use crate::model::Transaction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

const ENVELOPE_SOURCE: &str = "coreledger";
const ENVELOPE_TYPE: &str = "transaction";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub organization_id: String,
    pub ledger_id: String,
    pub payload: Transaction,
}

impl EventEnvelope {
    pub fn for_transaction(transaction: &Transaction) -> Self {
        Self {
            source: ENVELOPE_SOURCE.to_string(),
            event_type: ENVELOPE_TYPE.to_string(),
            action: transaction.status.as_str().to_string(),
            timestamp: Utc::now(),
            version: config::version().to_string(),
            organization_id: transaction.organization_id.clone(),
            ledger_id: transaction.ledger_id.clone(),
            payload: transaction.clone(),
        }
    }

    pub fn routing_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.source,
            self.event_type,
            self.action.to_ascii_lowercase()
        )
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, exchange: &str, routing_key: &str, envelope: &EventEnvelope)
        -> Result<(), PipelineError>;
}

/// Publishes the status-change event for `transaction` if events are
/// enabled, logging (not propagating) any publish failure — §4.5.
pub async fn publish_status_change(
    publisher: &dyn EventPublisher,
    transaction: &Transaction,
) {
    if !config::events_enabled() {
        debug!(
            "events disabled, skipping publish for transaction {}",
            transaction.id
        );
        return;
    }

    let envelope = EventEnvelope::for_transaction(transaction);
    let routing_key = envelope.routing_key();
    match publisher
        .publish(config::events_exchange(), &routing_key, &envelope)
        .await
    {
        Ok(()) => {
            metrics::counter!("pipeline_events_published_total").increment(1);
        }
        Err(err) => {
            warn!(
                "failed to publish event for transaction {}: {err}",
                transaction.id
            );
            metrics::counter!("pipeline_events_publish_failures_total").increment(1);
        }
    }
}

/// In-memory publisher used by tests: records every envelope it receives.
#[derive(Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<(String, String, EventEnvelope)>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, String, EventEnvelope)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: &EventEnvelope,
    ) -> Result<(), PipelineError> {
        self.published
            .lock()
            .unwrap()
            .push((exchange.to_string(), routing_key.to_string(), envelope.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Transaction, TransactionStatus};

    fn sample_transaction(status: TransactionStatus) -> Transaction {
        Transaction {
            id: "txn-1".to_string(),
            organization_id: "org1".to_string(),
            ledger_id: "ledger1".to_string(),
            status,
            asset_code: "USD".to_string(),
            parsed_intent: None,
            metadata: None,
            operations: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn routing_key_uses_lowercase_status() {
        let envelope = EventEnvelope::for_transaction(&sample_transaction(TransactionStatus::Approved));
        assert_eq!(envelope.routing_key(), "coreledger.transaction.approved");
    }

    #[tokio::test]
    async fn publish_records_envelope() {
        let publisher = RecordingEventPublisher::new();
        let txn = sample_transaction(TransactionStatus::Noted);
        publish_status_change(&publisher, &txn).await;
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1, "coreledger.transaction.noted");
    }
}
