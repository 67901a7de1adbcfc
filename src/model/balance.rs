use crate::amount::{BalanceAmounts, FixedDecimal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default slice name when the intent does not name one explicitly.
pub const DEFAULT_KEY: &str = "default";

/// Addresses a balance by `(org, ledger, alias#key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub organization_id: String,
    pub ledger_id: String,
    pub alias: String,
    pub key: String,
}

impl BalanceKey {
    pub fn new(
        organization_id: impl Into<String>,
        ledger_id: impl Into<String>,
        alias: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            ledger_id: ledger_id.into(),
            alias: alias.into(),
            key: key.into(),
        }
    }

    /// The `alias#key` cache-facing fragment, independent of tenant.
    pub fn alias_key(&self) -> String {
        format!("{}#{}", self.alias, self.key)
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.organization_id,
            self.ledger_id,
            self.alias_key()
        )
    }
}

/// A durable balance row (§3 Balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: String,
    pub organization_id: String,
    pub ledger_id: String,
    pub alias: String,
    pub key: String,
    pub available: FixedDecimal,
    pub on_hold: FixedDecimal,
    pub version: u64,
    pub allow_sending: bool,
    pub allow_receiving: bool,
}

impl Balance {
    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(
            self.organization_id.clone(),
            self.ledger_id.clone(),
            self.alias.clone(),
            self.key.clone(),
        )
    }

    pub fn amounts(&self) -> BalanceAmounts {
        BalanceAmounts {
            available: self.available,
            on_hold: self.on_hold,
        }
    }
}

/// A point-in-time view of a balance, as carried in a `QueueMessage` or
/// returned by the cache (§4.2). Lighter than `Balance`: no transfer flags,
/// since those are not relevant to staleness detection or arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub version: u64,
    pub available: FixedDecimal,
    pub on_hold: FixedDecimal,
}

impl BalanceSnapshot {
    pub fn amounts(&self) -> BalanceAmounts {
        BalanceAmounts {
            available: self.available,
            on_hold: self.on_hold,
        }
    }
}

/// A balance snapshot tagged with the id and key it addresses, the unit
/// carried inside a `QueueMessage` (§3 TransactionQueueMessage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshotEntry {
    pub id: String,
    pub key: BalanceKey,
    pub snapshot: BalanceSnapshot,
}
