use crate::amount::FixedDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One leg of a double-entry transaction (§3 Operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Debit,
    Credit,
    Release,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Debit => "DEBIT",
            OperationType::Credit => "CREDIT",
            OperationType::Release => "RELEASE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub transaction_id: String,
    pub balance_id: String,
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    pub amount: FixedDecimal,
    pub balance_before: FixedDecimal,
    pub balance_after: FixedDecimal,
    pub asset_code: String,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Operation {
    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }
}
