use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Transaction,
    Operation,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Transaction => "Transaction",
            EntityType::Operation => "Operation",
        }
    }
}

/// A row deferring a metadata write so it lands atomically with the row it
/// describes (§3 OutboxEntry, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
