//! End-to-end coverage of the write pipeline's six canonical scenarios,
//! driven entirely through the public API against the in-memory fakes —
//! no concrete relational/cache/bus driver is wired into this crate.

use chrono::Utc;
use ledger_txn_pipeline::amount::{FixedDecimal, IntentKind};
use ledger_txn_pipeline::cache::InMemoryBalanceCache;
use ledger_txn_pipeline::events::RecordingEventPublisher;
use ledger_txn_pipeline::model::{
    AliasAmount, AmountSide, BalanceKey, BalanceSnapshot, BalanceSnapshotEntry, Operation,
    OperationType, QueueMessage, Transaction, TransactionStatus, ValidatedAmounts,
};
use ledger_txn_pipeline::orchestrator::{orchestrate, Dependencies};
use ledger_txn_pipeline::queue::InMemoryIntakeQueue;
use ledger_txn_pipeline::store::fakes::InMemoryRelationalStore;
use std::sync::Arc;

const ORG: &str = "org-acme";
const LEDGER: &str = "ledger-main";

fn usd(mantissa: i128) -> FixedDecimal {
    FixedDecimal::new(mantissa, 2)
}

fn key(alias: &str) -> BalanceKey {
    BalanceKey::new(ORG, LEDGER, alias, "default")
}

fn snapshot(id: &str, alias: &str, version: u64, available: i128, on_hold: i128) -> BalanceSnapshotEntry {
    BalanceSnapshotEntry {
        id: id.to_string(),
        key: key(alias),
        snapshot: BalanceSnapshot {
            version,
            available: usd(available),
            on_hold: usd(on_hold),
        },
    }
}

fn draft(id: &str, status: TransactionStatus, operations: Vec<Operation>) -> Transaction {
    Transaction {
        id: id.to_string(),
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        status,
        asset_code: "USD".to_string(),
        parsed_intent: Some(serde_json::json!({"dsl": "transfer"})),
        metadata: None,
        operations,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn op(
    id: &str,
    transaction_id: &str,
    balance_id: &str,
    operation_type: OperationType,
    amount: i128,
    before: i128,
    after: i128,
) -> Operation {
    Operation {
        id: id.to_string(),
        transaction_id: transaction_id.to_string(),
        balance_id: balance_id.to_string(),
        operation_type,
        amount: usd(amount),
        balance_before: usd(before),
        balance_after: usd(after),
        asset_code: "USD".to_string(),
        metadata: None,
    }
}

struct Fixture {
    deps: Dependencies,
    relational: InMemoryRelationalStore,
    events: Arc<RecordingEventPublisher>,
}

fn fixture() -> Fixture {
    let relational = InMemoryRelationalStore::new();
    let events = Arc::new(RecordingEventPublisher::new());
    let deps = Dependencies {
        relational: Arc::new(relational.clone()),
        cache: InMemoryBalanceCache::new(),
        events: events.clone(),
        queue: Arc::new(InMemoryIntakeQueue::new()),
    };
    Fixture {
        deps,
        relational,
        events,
    }
}

#[tokio::test]
async fn scenario_1_simple_approved_transfer() {
    let f = fixture();
    f.relational.seed_balance("bal-a", usd(1000), usd(0), 5);
    f.relational.seed_balance("bal-b", usd(500), usd(0), 3);

    let mut amounts = ValidatedAmounts::default();
    amounts.from.insert(
        "@a".to_string(),
        AliasAmount {
            side: AmountSide::From,
            kind: IntentKind::Debit,
            amount: usd(200),
        },
    );
    amounts.to.insert(
        "@b".to_string(),
        AliasAmount {
            side: AmountSide::To,
            kind: IntentKind::Credit,
            amount: usd(200),
        },
    );

    let message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-1",
            TransactionStatus::Created,
            vec![
                op("op-1", "txn-1", "bal-a", OperationType::Debit, 200, 1000, 800),
                op("op-2", "txn-1", "bal-b", OperationType::Credit, 200, 500, 700),
            ],
        ),
        validated_amounts: amounts,
        balance_snapshots: vec![snapshot("bal-a", "@a", 5, 1000, 0), snapshot("bal-b", "@b", 3, 500, 0)],
        parsed_intent: None,
    };

    let (transaction, fanout) = orchestrate(&f.deps, message).await.expect("orchestrate");
    fanout.await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Approved);
    assert!(transaction.debits_equal_credits());
    assert_eq!(f.relational.balance_amounts("bal-a"), Some((usd(800), usd(0))));
    assert_eq!(f.relational.balance_amounts("bal-b"), Some((usd(700), usd(0))));
    assert_eq!(f.relational.balance_version("bal-a"), Some(6));
    assert_eq!(f.relational.balance_version("bal-b"), Some(4));

    let published = f.events.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1, "coreledger.transaction.approved");
}

#[tokio::test]
async fn scenario_2_idempotent_replay_leaves_state_unchanged() {
    let f = fixture();
    f.relational.seed_balance("bal-a", usd(1000), usd(0), 5);
    f.relational.seed_balance("bal-b", usd(500), usd(0), 3);

    let build = || {
        let mut amounts = ValidatedAmounts::default();
        amounts.from.insert(
            "@a".to_string(),
            AliasAmount {
                side: AmountSide::From,
                kind: IntentKind::Debit,
                amount: usd(200),
            },
        );
        amounts.to.insert(
            "@b".to_string(),
            AliasAmount {
                side: AmountSide::To,
                kind: IntentKind::Credit,
                amount: usd(200),
            },
        );
        QueueMessage {
            organization_id: ORG.to_string(),
            ledger_id: LEDGER.to_string(),
            draft_transaction: draft(
                "txn-1",
                TransactionStatus::Created,
                vec![
                    op("op-1", "txn-1", "bal-a", OperationType::Debit, 200, 1000, 800),
                    op("op-2", "txn-1", "bal-b", OperationType::Credit, 200, 500, 700),
                ],
            ),
            validated_amounts: amounts,
            balance_snapshots: vec![snapshot("bal-a", "@a", 5, 1000, 0), snapshot("bal-b", "@b", 3, 500, 0)],
            parsed_intent: None,
        }
    };

    let (_, fanout1) = orchestrate(&f.deps, build()).await.expect("first delivery");
    fanout1.await.unwrap();

    let (transaction, fanout2) = orchestrate(&f.deps, build()).await.expect("redelivery");
    fanout2.await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Approved);
    assert_eq!(f.relational.balance_version("bal-a"), Some(6));
    assert_eq!(f.relational.balance_version("bal-b"), Some(4));
    assert_eq!(f.relational.operation_count(), 2);
}

#[tokio::test]
async fn scenario_3_pending_then_approve_draws_from_hold() {
    let f = fixture();
    f.relational.seed_balance("bal-a", usd(1000), usd(0), 5);

    let mut hold_amounts = ValidatedAmounts::default();
    hold_amounts.from.insert(
        "@a".to_string(),
        AliasAmount {
            side: AmountSide::From,
            kind: IntentKind::Hold,
            amount: usd(300),
        },
    );
    let hold_message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-2",
            TransactionStatus::Pending,
            vec![op("op-hold", "txn-2", "bal-a", OperationType::Debit, 300, 1000, 700)],
        ),
        validated_amounts: hold_amounts,
        balance_snapshots: vec![snapshot("bal-a", "@a", 5, 1000, 0)],
        parsed_intent: None,
    };

    let (pending, fanout1) = orchestrate(&f.deps, hold_message).await.expect("hold message");
    fanout1.await.unwrap();
    assert_eq!(pending.status, TransactionStatus::Pending);
    assert_eq!(f.relational.balance_amounts("bal-a"), Some((usd(700), usd(300))));

    let mut approve_amounts = ValidatedAmounts::default();
    approve_amounts.from.insert(
        "@a".to_string(),
        AliasAmount {
            side: AmountSide::From,
            kind: IntentKind::DebitFromHold,
            amount: usd(300),
        },
    );
    let approve_message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-2",
            TransactionStatus::Approved,
            vec![op("op-commit", "txn-2", "bal-a", OperationType::Debit, 300, 700, 700)],
        ),
        validated_amounts: approve_amounts,
        balance_snapshots: vec![snapshot("bal-a", "@a", 6, 700, 300)],
        parsed_intent: None,
    };

    let (approved, fanout2) = orchestrate(&f.deps, approve_message).await.expect("approve message");
    fanout2.await.unwrap();

    assert_eq!(approved.status, TransactionStatus::Approved);
    assert_eq!(f.relational.balance_amounts("bal-a"), Some((usd(700), usd(0))));
    assert_eq!(f.relational.balance_version("bal-a"), Some(7));
    assert_eq!(f.relational.operation_count(), 2);
}

#[tokio::test]
async fn scenario_4_pending_then_cancel_releases_hold() {
    let f = fixture();
    f.relational.seed_balance("bal-a", usd(700), usd(300), 6);

    let mut amounts = ValidatedAmounts::default();
    amounts.from.insert(
        "@a".to_string(),
        AliasAmount {
            side: AmountSide::From,
            kind: IntentKind::Release,
            amount: usd(300),
        },
    );

    let message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-3",
            TransactionStatus::Canceled,
            vec![op("op-release", "txn-3", "bal-a", OperationType::Release, 300, 700, 1000)],
        ),
        validated_amounts: amounts,
        balance_snapshots: vec![snapshot("bal-a", "@a", 6, 700, 300)],
        parsed_intent: Some(serde_json::json!({"dsl": "transfer"})),
    };

    let (transaction, fanout) = orchestrate(&f.deps, message).await.expect("cancel message");
    fanout.await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Canceled);
    assert_eq!(f.relational.balance_amounts("bal-a"), Some((usd(1000), usd(0))));
    assert_eq!(f.relational.balance_version("bal-a"), Some(7));
    let published = f.events.published();
    assert_eq!(published[0].1, "coreledger.transaction.canceled");
}

#[tokio::test]
async fn scenario_5_stale_cache_is_refreshed_before_applying_the_intent() {
    let f = fixture();
    f.relational.seed_balance("bal-a", usd(900), usd(0), 8);
    f.deps.cache.put(
        &key("@a"),
        "bal-a",
        BalanceSnapshot {
            version: 8,
            available: usd(900),
            on_hold: usd(0),
        },
    ).await;

    let mut amounts = ValidatedAmounts::default();
    amounts.from.insert(
        "@a".to_string(),
        AliasAmount {
            side: AmountSide::From,
            kind: IntentKind::Debit,
            amount: usd(100),
        },
    );

    let message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-4",
            TransactionStatus::Created,
            vec![op("op-4", "txn-4", "bal-a", OperationType::Debit, 100, 900, 800)],
        ),
        validated_amounts: amounts,
        balance_snapshots: vec![snapshot("bal-a", "@a", 5, 1000, 0)],
        parsed_intent: None,
    };

    let (transaction, fanout) = orchestrate(&f.deps, message).await.expect("stale delivery");
    fanout.await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Approved);
    assert_eq!(f.relational.balance_amounts("bal-a"), Some((usd(800), usd(0))));
    assert_eq!(f.relational.balance_version("bal-a"), Some(9));
}

#[tokio::test]
async fn scenario_6_noted_transaction_has_no_balance_effect() {
    let f = fixture();

    let message = QueueMessage {
        organization_id: ORG.to_string(),
        ledger_id: LEDGER.to_string(),
        draft_transaction: draft(
            "txn-5",
            TransactionStatus::Noted,
            vec![
                op("op-n1", "txn-5", "bal-a", OperationType::Debit, 0, 0, 0),
                op("op-n2", "txn-5", "bal-b", OperationType::Credit, 0, 0, 0),
            ],
        ),
        validated_amounts: ValidatedAmounts::default(),
        balance_snapshots: vec![],
        parsed_intent: None,
    };

    let (transaction, fanout) = orchestrate(&f.deps, message).await.expect("noted delivery");
    fanout.await.unwrap();

    assert_eq!(transaction.status, TransactionStatus::Noted);
    assert_eq!(f.relational.operation_count(), 2);
    assert!(f.relational.balance_amounts("bal-a").is_none());
    let published = f.events.published();
    assert_eq!(published[0].1, "coreledger.transaction.noted");
}
