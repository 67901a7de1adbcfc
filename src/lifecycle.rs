// Account lifecycle operations (C12 / §4.9): compound, best-effort-rollback
// flows that sit outside the per-message write pipeline. Grounded in the
// teacher's escrow auto-release loop's "snapshot, mutate, compensate on
// failure" shape (escrow::auto_release), adapted to a saga over the cache
// and the balance store instead of a single relational transaction.

use crate::cache::BalanceCache;
use crate::error::PipelineError;
use crate::model::Balance;
use crate::store::BalanceAdminStore;

/// Deletes every balance belonging to `account_alias`, used when retiring an
/// account. Fails fast if any balance still holds funds. Every later step's
/// failure is compensated by best-effort restoration of the prior steps —
/// those compensations never themselves fail the call (§4.9).
pub async fn delete_all_balances_by_account(
    cache: &dyn BalanceCache,
    balances_store: &dyn BalanceAdminStore,
    organization_id: &str,
    ledger_id: &str,
    account_alias: &str,
) -> Result<(), PipelineError> {
    let balances = cache
        .list_by_account(organization_id, ledger_id, account_alias)
        .await;

    if balances.is_empty() {
        return Ok(());
    }

    if let Some(offender) = balances
        .iter()
        .find(|b| b.available.mantissa() != 0 || b.on_hold.mantissa() != 0)
    {
        return Err(PipelineError::BalancesNotDeletable(format!(
            "balance {} still holds available={} onHold={}",
            offender.id, offender.available, offender.on_hold
        )));
    }

    // Step 4: disable transfers for every target balance.
    let mut disabled = Vec::with_capacity(balances.len());
    for balance in &balances {
        match cache.toggle_transfer(&balance.id, false, false).await {
            Ok(()) => disabled.push(balance.clone()),
            Err(err) => {
                revert_transfer_toggle(cache, &disabled).await;
                return Err(err);
            }
        }
    }

    // Step 5: delete each cache entry.
    let mut deleted_from_cache = Vec::with_capacity(balances.len());
    for balance in &balances {
        cache.delete(&balance.balance_key()).await;
        deleted_from_cache.push(balance.clone());
    }

    // Step 6: delete the balance rows in one bulk call.
    let ids: Vec<String> = balances.iter().map(|b| b.id.clone()).collect();
    if let Err(err) = balances_store.delete_balances(&ids).await {
        restore_cache_entries(cache, &deleted_from_cache).await;
        revert_transfer_toggle(cache, &balances).await;
        return Err(err);
    }

    Ok(())
}

async fn revert_transfer_toggle(cache: &dyn BalanceCache, balances: &[Balance]) {
    for balance in balances {
        if let Err(err) = cache
            .toggle_transfer(&balance.id, balance.allow_sending, balance.allow_receiving)
            .await
        {
            warn!(
                "best-effort transfer-toggle rollback failed for balance {}: {err}",
                balance.id
            );
        }
    }
}

async fn restore_cache_entries(cache: &dyn BalanceCache, balances: &[Balance]) {
    for balance in balances {
        cache
            .put(
                &balance.balance_key(),
                &balance.id,
                crate::model::BalanceSnapshot {
                    version: balance.version,
                    available: balance.available,
                    on_hold: balance.on_hold,
                },
            )
            .await;
    }
}
