//! Optimistic transactions and the schema fence they pass through at commit.

pub mod error;
pub mod fence;
pub mod sink;
pub mod transaction;

pub use error::{Result, RowSinkError, TxnError};
pub use fence::{SchemaFencer, TransactionSnapshot, check_schema_changes};
pub use sink::{MemoryRowSink, RowSink, RowWrite};
pub use transaction::{CommitInfo, Transaction};
