// Balance cache layer (C2) — the staleness oracle.
//
// Grounded in the teacher's workspace-wide use of `dashmap` for shared
// concurrent state (see Cargo.toml workspace.dependencies): a sharded
// concurrent map gives us lock-free reads/writes per key without a
// crate-level Mutex<HashMap>, matching how hot balances are read far more
// often than they are written.

use crate::error::PipelineError;
use crate::model::{Balance, BalanceKey, BalanceSnapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Balance cache contract (§4.2). Implementors MUST make `put` a monotonic
/// overlay: a snapshot is only stored if its version is strictly greater
/// than what is already cached for that key (§8 "Cache monotonicity").
#[async_trait]
pub trait BalanceCache: Send + Sync {
    async fn get(&self, key: &BalanceKey) -> Option<BalanceSnapshot>;

    /// Overwrites the cached snapshot only if `snapshot.version > stored.version`.
    async fn put(&self, key: &BalanceKey, id: &str, snapshot: BalanceSnapshot);

    async fn forget(&self, key: &BalanceKey);

    /// All balances cached under `account_alias` for the tenant, across every slice/key.
    async fn list_by_account(
        &self,
        organization_id: &str,
        ledger_id: &str,
        account_alias: &str,
    ) -> Vec<Balance>;

    /// Transient flip used by the account-retirement lifecycle op (§4.9).
    async fn toggle_transfer(
        &self,
        balance_id: &str,
        allow_sending: bool,
        allow_receiving: bool,
    ) -> Result<(), PipelineError>;

    async fn delete(&self, key: &BalanceKey);
}

#[derive(Debug, Clone)]
struct CachedEntry {
    id: String,
    key: BalanceKey,
    snapshot: BalanceSnapshot,
    allow_sending: bool,
    allow_receiving: bool,
}

/// In-memory reference implementation, driven by tests and usable as the
/// process-local overlay in front of a real distributed cache.
#[derive(Default)]
pub struct InMemoryBalanceCache {
    by_key: DashMap<String, CachedEntry>,
    by_id: DashMap<String, String>,
}

impl InMemoryBalanceCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn cache_key(key: &BalanceKey) -> String {
        key.to_string()
    }

    /// Seeds the cache directly, bypassing the monotonic check — used by
    /// tests and by bootstrap/warm-up paths, never by the orchestrator.
    pub fn seed(&self, key: BalanceKey, id: impl Into<String>, snapshot: BalanceSnapshot) {
        let id = id.into();
        let cache_key = Self::cache_key(&key);
        self.by_id.insert(id.clone(), cache_key.clone());
        self.by_key.insert(
            cache_key,
            CachedEntry {
                id,
                key,
                snapshot,
                allow_sending: true,
                allow_receiving: true,
            },
        );
    }
}

#[async_trait]
impl BalanceCache for InMemoryBalanceCache {
    async fn get(&self, key: &BalanceKey) -> Option<BalanceSnapshot> {
        self.by_key.get(&Self::cache_key(key)).map(|e| e.snapshot)
    }

    async fn put(&self, key: &BalanceKey, id: &str, snapshot: BalanceSnapshot) {
        let cache_key = Self::cache_key(key);
        match self.by_key.get_mut(&cache_key) {
            Some(mut existing) => {
                if snapshot.version > existing.snapshot.version {
                    existing.snapshot = snapshot;
                    existing.id = id.to_string();
                }
            }
            None => {
                self.by_id.insert(id.to_string(), cache_key.clone());
                self.by_key.insert(
                    cache_key,
                    CachedEntry {
                        id: id.to_string(),
                        key: key.clone(),
                        snapshot,
                        allow_sending: true,
                        allow_receiving: true,
                    },
                );
            }
        }
    }

    async fn forget(&self, key: &BalanceKey) {
        if let Some((_, entry)) = self.by_key.remove(&Self::cache_key(key)) {
            self.by_id.remove(&entry.id);
        }
    }

    async fn list_by_account(
        &self,
        organization_id: &str,
        ledger_id: &str,
        account_alias: &str,
    ) -> Vec<Balance> {
        self.by_key
            .iter()
            .filter(|entry| {
                entry.key.organization_id == organization_id
                    && entry.key.ledger_id == ledger_id
                    && entry.key.alias == account_alias
            })
            .map(|entry| Balance {
                id: entry.id.clone(),
                organization_id: entry.key.organization_id.clone(),
                ledger_id: entry.key.ledger_id.clone(),
                alias: entry.key.alias.clone(),
                key: entry.key.key.clone(),
                available: entry.snapshot.available,
                on_hold: entry.snapshot.on_hold,
                version: entry.snapshot.version,
                allow_sending: entry.allow_sending,
                allow_receiving: entry.allow_receiving,
            })
            .collect()
    }

    async fn toggle_transfer(
        &self,
        balance_id: &str,
        allow_sending: bool,
        allow_receiving: bool,
    ) -> Result<(), PipelineError> {
        let cache_key = self
            .by_id
            .get(balance_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| {
                PipelineError::PersistenceFailure(format!(
                    "toggle_transfer: unknown balance id {balance_id}"
                ))
            })?;
        let mut entry = self.by_key.get_mut(&cache_key).ok_or_else(|| {
            PipelineError::PersistenceFailure(format!(
                "toggle_transfer: cache entry missing for {balance_id}"
            ))
        })?;
        entry.allow_sending = allow_sending;
        entry.allow_receiving = allow_receiving;
        Ok(())
    }

    async fn delete(&self, key: &BalanceKey) {
        self.forget(key).await;
    }
}
