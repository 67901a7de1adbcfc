use crate::error::PipelineError;
use crate::model::OutboxEntry;
use async_trait::async_trait;

/// Standalone outbox contract (§4.6), used by the (out-of-scope) worker that
/// drains outbox rows into the metadata store. The write pipeline itself
/// inserts outbox rows through `RelationalTransaction::insert_outbox_ignore_conflict`
/// so the insert is atomic with the transaction/operation row it describes.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns `PipelineError::DuplicateOutboxEntry` on an existing
    /// `(entity_type, entity_id)` pair.
    async fn insert(&self, entry: OutboxEntry) -> Result<(), PipelineError>;

    async fn list_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, PipelineError>;

    async fn remove(&self, entity_type_name: &str, entity_id: &str) -> Result<(), PipelineError>;
}
