mod balance;
mod operation;
mod outbox;
mod queue_message;
mod transaction;

pub use balance::{Balance, BalanceKey, BalanceSnapshot, BalanceSnapshotEntry, DEFAULT_KEY};
pub use operation::{Operation, OperationType};
pub use outbox::{EntityType, OutboxEntry};
pub use queue_message::{AliasAmount, AmountSide, QueueMessage, ValidatedAmounts};
pub use transaction::{Transaction, TransactionStatus};
