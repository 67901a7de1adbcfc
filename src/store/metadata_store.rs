use crate::error::PipelineError;
use crate::model::EntityType;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Document-store contract for free-form entity metadata (§4.6). The write
/// pipeline's core never calls `merge`/`create` directly — metadata writes
/// are deferred through the outbox (§4.3 step 4) so they commit atomically
/// with the relational row they describe. This contract is what the
/// out-of-scope outbox-draining worker uses once the outbox row is durable.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetches the existing document, computes `deepMerge(existing, patch)`
    /// (a `null` value in `patch` deletes the key), and writes the result.
    async fn merge(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        patch: HashMap<String, Value>,
    ) -> Result<(), PipelineError>;

    /// Inserts a document; on an existing `(entity_type, entity_id)` pair
    /// returns `PipelineError::DuplicateMetadata`.
    async fn create(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        document: HashMap<String, Value>,
    ) -> Result<(), PipelineError>;

    async fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<HashMap<String, Value>>, PipelineError>;

    /// Idempotent index creation; returns `PipelineError::IndexAlreadyExists`
    /// if an index for `key` already exists on `entity_type`.
    async fn create_index(
        &self,
        entity_type: EntityType,
        key: &str,
        unique: bool,
        sparse: bool,
    ) -> Result<(), PipelineError>;
}
