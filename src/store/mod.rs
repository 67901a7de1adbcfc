//! Store contracts (C3/C4/C5), modeled as small async-trait "capability sets"
//! per the teacher's composite `Storage` trait built from small provider
//! traits — so the orchestrator (C8) can be driven entirely by in-memory
//! fakes in tests (SPEC_FULL.md §9).

mod balance_admin_store;
mod balance_store;
mod metadata_store;
mod outbox_store;
mod transaction_store;

pub mod fakes;

pub use balance_admin_store::BalanceAdminStore;
pub use balance_store::{BalanceUpdate, BulkUpdateOutcome};
pub use metadata_store::MetadataStore;
pub use outbox_store::OutboxStore;
pub use transaction_store::{InsertTransactionOutcome, RelationalStore, RelationalTransaction};
