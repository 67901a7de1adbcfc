use super::{BalanceSnapshotEntry, Transaction};
use crate::amount::{FixedDecimal, IntentKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side of the intent an alias amount belongs to, kept only for
/// classification/logging — the orchestrator applies `AliasAmount::kind`
/// regardless of side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountSide {
    From,
    To,
}

/// The per-alias amount and arithmetic kind (§4.1) the upstream validator
/// computed for one leg of the intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasAmount {
    pub side: AmountSide,
    pub kind: IntentKind,
    pub amount: FixedDecimal,
}

/// Per-alias amounts split into source (`from`) and destination (`to`) legs,
/// as validated upstream (§3 TransactionQueueMessage).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatedAmounts {
    pub from: HashMap<String, AliasAmount>,
    pub to: HashMap<String, AliasAmount>,
}

impl ValidatedAmounts {
    /// Looks up the amount for `alias`, checking both legs.
    pub fn for_alias(&self, alias: &str) -> Option<&AliasAmount> {
        self.from.get(alias).or_else(|| self.to.get(alias))
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.to.is_empty()
    }
}

/// What travels over the intake queue (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub organization_id: String,
    pub ledger_id: String,
    pub draft_transaction: Transaction,
    pub validated_amounts: ValidatedAmounts,
    pub balance_snapshots: Vec<BalanceSnapshotEntry>,
    pub parsed_intent: Option<serde_json::Value>,
}
