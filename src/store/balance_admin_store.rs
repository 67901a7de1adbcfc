use crate::error::PipelineError;
use async_trait::async_trait;

/// Bulk balance-row deletion, used only by the account-retirement lifecycle
/// op (§4.9) — a separate concern from the per-message bulk update in
/// `RelationalTransaction`, since it runs outside the write pipeline's
/// per-message transaction.
#[async_trait]
pub trait BalanceAdminStore: Send + Sync {
    async fn delete_balances(&self, ids: &[String]) -> Result<(), PipelineError>;
}
