//! In-memory fakes for every store contract, used by orchestrator tests and
//! by anything exercising the write pipeline without a real relational,
//! document, or outbox backend (SPEC_FULL.md §9's design note on testability).

use super::balance_admin_store::BalanceAdminStore;
use super::balance_store::{BalanceUpdate, BulkUpdateOutcome};
use super::metadata_store::MetadataStore;
use super::outbox_store::OutboxStore;
use super::transaction_store::{InsertTransactionOutcome, RelationalStore, RelationalTransaction};
use crate::error::PipelineError;
use crate::model::{EntityType, Operation, OutboxEntry, Transaction, TransactionStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct BalanceRow {
    available: crate::amount::FixedDecimal,
    on_hold: crate::amount::FixedDecimal,
    version: u64,
}

#[derive(Default)]
struct RelationalState {
    balances: HashMap<String, BalanceRow>,
    transactions: HashMap<String, Transaction>,
    operation_ids: HashSet<String>,
    outbox_keys: HashSet<(EntityType, String)>,
}

/// In-memory relational store. Seed balances with `seed_balance` before
/// driving the orchestrator against it.
#[derive(Clone)]
pub struct InMemoryRelationalStore {
    state: Arc<Mutex<RelationalState>>,
}

impl Default for InMemoryRelationalStore {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(RelationalState::default())),
        }
    }
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_balance(
        &self,
        id: impl Into<String>,
        available: crate::amount::FixedDecimal,
        on_hold: crate::amount::FixedDecimal,
        version: u64,
    ) {
        self.state.lock().unwrap().balances.insert(
            id.into(),
            BalanceRow {
                available,
                on_hold,
                version,
            },
        );
    }

    pub fn balance_version(&self, id: &str) -> Option<u64> {
        self.state.lock().unwrap().balances.get(id).map(|b| b.version)
    }

    pub fn balance_amounts(
        &self,
        id: &str,
    ) -> Option<(crate::amount::FixedDecimal, crate::amount::FixedDecimal)> {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(id)
            .map(|b| (b.available, b.on_hold))
    }

    pub fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.state.lock().unwrap().transactions.get(id).cloned()
    }

    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operation_ids.len()
    }

    pub fn outbox_len(&self) -> usize {
        self.state.lock().unwrap().outbox_keys.len()
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn begin(&self) -> Result<Box<dyn RelationalTransaction>, PipelineError> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            staged_balance_updates: Vec::new(),
            staged_transaction_insert: None,
            staged_status_update: None,
            staged_operations: Vec::new(),
            staged_outbox: Vec::new(),
            committed: false,
        }))
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<RelationalState>>,
    staged_balance_updates: Vec<BalanceUpdate>,
    staged_transaction_insert: Option<Transaction>,
    staged_status_update: Option<(String, TransactionStatus)>,
    staged_operations: Vec<Operation>,
    staged_outbox: Vec<OutboxEntry>,
    committed: bool,
}

#[async_trait]
impl RelationalTransaction for InMemoryTransaction {
    async fn bulk_update_balances(
        &mut self,
        _organization_id: &str,
        _ledger_id: &str,
        updates: Vec<BalanceUpdate>,
    ) -> Result<BulkUpdateOutcome, PipelineError> {
        let state = self.state.lock().unwrap();
        let mut outcome = BulkUpdateOutcome::default();
        for update in &updates {
            let passes = match state.balances.get(&update.id) {
                Some(row) => row.version == update.expected_version || row.version == update.new_version,
                None => true,
            };
            if passes {
                outcome.applied.push(update.id.clone());
            } else {
                outcome.skipped.push(update.id.clone());
            }
        }
        drop(state);
        self.staged_balance_updates.extend(updates);
        Ok(outcome)
    }

    async fn insert_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> Result<InsertTransactionOutcome, PipelineError> {
        let state = self.state.lock().unwrap();
        if let Some(existing) = state.transactions.get(&transaction.id) {
            return Ok(InsertTransactionOutcome::AlreadyExists(Box::new(
                existing.clone(),
            )));
        }
        drop(state);
        self.staged_transaction_insert = Some(transaction.clone());
        Ok(InsertTransactionOutcome::Inserted)
    }

    async fn update_transaction_status(
        &mut self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<(), PipelineError> {
        self.staged_status_update = Some((id.to_string(), status));
        Ok(())
    }

    async fn insert_operation_ignore_conflict(
        &mut self,
        operation: &Operation,
    ) -> Result<bool, PipelineError> {
        let state = self.state.lock().unwrap();
        let already_committed = state.operation_ids.contains(&operation.id);
        drop(state);
        let already_staged = self
            .staged_operations
            .iter()
            .any(|staged| staged.id == operation.id);
        if already_committed || already_staged {
            return Ok(false);
        }
        self.staged_operations.push(operation.clone());
        Ok(true)
    }

    async fn insert_outbox_ignore_conflict(
        &mut self,
        entry: OutboxEntry,
    ) -> Result<bool, PipelineError> {
        let state = self.state.lock().unwrap();
        let already_committed = state
            .outbox_keys
            .contains(&(entry.entity_type, entry.entity_id.clone()));
        drop(state);
        let already_staged = self
            .staged_outbox
            .iter()
            .any(|staged| staged.entity_type == entry.entity_type && staged.entity_id == entry.entity_id);
        if already_committed || already_staged {
            return Ok(false);
        }
        self.staged_outbox.push(entry);
        Ok(true)
    }

    async fn commit(&mut self) -> Result<(), PipelineError> {
        let mut state = self.state.lock().unwrap();
        for update in self.staged_balance_updates.drain(..) {
            let passes = match state.balances.get(&update.id) {
                Some(row) => row.version == update.expected_version || row.version == update.new_version,
                None => true,
            };
            if passes {
                state.balances.insert(
                    update.id,
                    BalanceRow {
                        available: update.new_available,
                        on_hold: update.new_on_hold,
                        version: update.new_version,
                    },
                );
            }
        }
        if let Some(transaction) = self.staged_transaction_insert.take() {
            state.transactions.insert(transaction.id.clone(), transaction);
        }
        if let Some((id, status)) = self.staged_status_update.take() {
            if let Some(transaction) = state.transactions.get_mut(&id) {
                transaction.status = status;
            }
        }
        for operation in self.staged_operations.drain(..) {
            state.operation_ids.insert(operation.id);
        }
        for entry in self.staged_outbox.drain(..) {
            state.outbox_keys.insert((entry.entity_type, entry.entity_id));
        }
        self.committed = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PipelineError> {
        self.staged_balance_updates.clear();
        self.staged_transaction_insert = None;
        self.staged_status_update = None;
        self.staged_operations.clear();
        self.staged_outbox.clear();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.committed
            && (!self.staged_balance_updates.is_empty()
                || self.staged_transaction_insert.is_some()
                || !self.staged_operations.is_empty())
        {
            warn!("in-memory relational transaction dropped without commit or rollback");
        }
    }
}

/// In-memory metadata store, keyed by `(entity_type, entity_id)`.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    documents: Mutex<HashMap<(EntityType, String), HashMap<String, Value>>>,
    indexes: Mutex<HashSet<(EntityType, String)>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Recursively merges `patch` into `existing`: a nested object merges
/// key-by-key into whatever object already sits there, a `null` deletes the
/// key it lands on at any depth, and any other value replaces whatever was
/// there outright.
fn deep_merge(existing: &mut Value, patch: Value) {
    match patch {
        Value::Object(patch_map) => {
            if !existing.is_object() {
                *existing = Value::Object(serde_json::Map::new());
            }
            let existing_map = existing.as_object_mut().expect("just normalized to an object");
            for (field, patch_value) in patch_map {
                if patch_value.is_null() {
                    existing_map.remove(&field);
                } else if let Some(existing_value) = existing_map.get_mut(&field) {
                    deep_merge(existing_value, patch_value);
                } else {
                    existing_map.insert(field, patch_value);
                }
            }
        }
        other => *existing = other,
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn merge(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        patch: HashMap<String, Value>,
    ) -> Result<(), PipelineError> {
        let mut documents = self.documents.lock().unwrap();
        let key = (entity_type, entity_id.to_string());
        let existing = documents.entry(key).or_default();
        for (field, patch_value) in patch {
            if patch_value.is_null() {
                existing.remove(&field);
            } else if let Some(existing_value) = existing.get_mut(&field) {
                deep_merge(existing_value, patch_value);
            } else {
                existing.insert(field, patch_value);
            }
        }
        Ok(())
    }

    async fn create(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        document: HashMap<String, Value>,
    ) -> Result<(), PipelineError> {
        let mut documents = self.documents.lock().unwrap();
        let key = (entity_type, entity_id.to_string());
        if documents.contains_key(&key) {
            return Err(PipelineError::DuplicateMetadata {
                entity_type: entity_type.as_str().to_string(),
                entity_id: entity_id.to_string(),
            });
        }
        documents.insert(key, document);
        Ok(())
    }

    async fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<HashMap<String, Value>>, PipelineError> {
        let documents = self.documents.lock().unwrap();
        Ok(documents.get(&(entity_type, entity_id.to_string())).cloned())
    }

    async fn create_index(
        &self,
        entity_type: EntityType,
        key: &str,
        _unique: bool,
        _sparse: bool,
    ) -> Result<(), PipelineError> {
        let mut indexes = self.indexes.lock().unwrap();
        let index_key = (entity_type, key.to_string());
        if !indexes.insert(index_key) {
            return Err(PipelineError::IndexAlreadyExists {
                entity_type: entity_type.as_str().to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory outbox store, separate from the relational transaction's own
/// outbox insert so tests can exercise the standalone drain contract.
#[derive(Default)]
pub struct InMemoryOutboxStore {
    entries: Mutex<HashMap<(String, String), OutboxEntry>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, entry: OutboxEntry) -> Result<(), PipelineError> {
        let mut entries = self.entries.lock().unwrap();
        let key = (entry.entity_type.as_str().to_string(), entry.entity_id.clone());
        if entries.contains_key(&key) {
            return Err(PipelineError::DuplicateOutboxEntry {
                entity_type: entry.entity_type.as_str().to_string(),
                entity_id: entry.entity_id,
            });
        }
        entries.insert(key, entry);
        Ok(())
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, PipelineError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.values().take(limit).cloned().collect())
    }

    async fn remove(&self, entity_type_name: &str, entity_id: &str) -> Result<(), PipelineError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(entity_type_name.to_string(), entity_id.to_string()));
        Ok(())
    }
}

/// In-memory admin store backing `delete_all_balances_by_account` tests.
#[derive(Default)]
pub struct InMemoryBalanceAdminStore {
    deleted: Mutex<HashSet<String>>,
    fail_next: Mutex<bool>,
}

impl InMemoryBalanceAdminStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().iter().cloned().collect()
    }

    /// Makes the next `delete_balances` call fail, to exercise §4.9's rollback path.
    pub fn fail_next_call(&self) {
        *self.fail_next.lock().unwrap() = true;
    }
}

#[async_trait]
impl BalanceAdminStore for InMemoryBalanceAdminStore {
    async fn delete_balances(&self, ids: &[String]) -> Result<(), PipelineError> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next {
            *fail_next = false;
            return Err(PipelineError::PersistenceFailure(
                "simulated delete_balances failure".to_string(),
            ));
        }
        drop(fail_next);
        self.deleted.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_recurses_into_nested_objects_instead_of_replacing_them() {
        let store = InMemoryMetadataStore::new();
        let mut existing = HashMap::new();
        existing.insert("a".to_string(), serde_json::json!({"x": 1}));
        store
            .create(EntityType::Transaction, "txn-1", existing)
            .await
            .unwrap();

        let mut patch = HashMap::new();
        patch.insert("a".to_string(), serde_json::json!({"y": 2}));
        store
            .merge(EntityType::Transaction, "txn-1", patch)
            .await
            .unwrap();

        let document = store
            .find_by_entity(EntityType::Transaction, "txn-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(document["a"], serde_json::json!({"x": 1, "y": 2}));
    }

    #[tokio::test]
    async fn merge_deletes_nested_key_on_null_patch_value() {
        let store = InMemoryMetadataStore::new();
        let mut existing = HashMap::new();
        existing.insert("a".to_string(), serde_json::json!({"x": 1, "y": 2}));
        store
            .create(EntityType::Transaction, "txn-2", existing)
            .await
            .unwrap();

        let mut patch = HashMap::new();
        patch.insert("a".to_string(), serde_json::json!({"y": null}));
        store
            .merge(EntityType::Transaction, "txn-2", patch)
            .await
            .unwrap();

        let document = store
            .find_by_entity(EntityType::Transaction, "txn-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(document["a"], serde_json::json!({"x": 1}));
    }
}
