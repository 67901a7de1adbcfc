use super::Operation;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Transaction lifecycle state (§4.4). `Approved`, `Canceled` and `Noted`
/// are terminal; `Created` and `Pending` are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Created,
    Pending,
    Approved,
    Canceled,
    Noted,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Approved | TransactionStatus::Canceled | TransactionStatus::Noted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Created => "CREATED",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Noted => "NOTED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(TransactionStatus::Created),
            "PENDING" => Ok(TransactionStatus::Pending),
            "APPROVED" => Ok(TransactionStatus::Approved),
            "CANCELED" => Ok(TransactionStatus::Canceled),
            "NOTED" => Ok(TransactionStatus::Noted),
            other => Err(PipelineError::UnknownStatus(other.to_string())),
        }
    }
}

/// The atomic unit of the ledger (§3 Transaction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub organization_id: String,
    pub ledger_id: String,
    pub status: TransactionStatus,
    pub asset_code: String,
    pub parsed_intent: Option<serde_json::Value>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    pub operations: Vec<Operation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn has_metadata(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| !m.is_empty())
    }

    /// Double-entry check for APPROVED transactions (§8 "Double entry").
    /// CANCELED transactions balance DEBIT against RELEASE instead, since a
    /// cancel reverses a hold rather than committing a debit/credit pair.
    pub fn debits_equal_credits(&self) -> bool {
        use super::OperationType::*;
        let mut debit_total = crate::amount::FixedDecimal::zero(0);
        let mut credit_total = crate::amount::FixedDecimal::zero(0);
        let mut scale_set = false;
        for op in &self.operations {
            if !scale_set {
                debit_total = crate::amount::FixedDecimal::zero(op.amount.scale());
                credit_total = crate::amount::FixedDecimal::zero(op.amount.scale());
                scale_set = true;
            }
            match op.operation_type {
                Debit => {
                    if let Ok(sum) = debit_total.checked_add(&op.amount) {
                        debit_total = sum;
                    }
                }
                Credit => {
                    if let Ok(sum) = credit_total.checked_add(&op.amount) {
                        credit_total = sum;
                    }
                }
                Release => {
                    // RELEASE operations reverse a hold and are not part of
                    // the debit/credit balance for an APPROVED transaction.
                }
            }
        }
        debit_total == credit_total
    }
}
