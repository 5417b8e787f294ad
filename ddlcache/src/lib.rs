//! Sessions executing `ALTER TABLE ... CACHE | NOCACHE` and the surrounding DDL and DML against a
//! shared catalog, with DDL run as asynchronous jobs and transactions fenced on schema changes.

pub mod domain;
pub mod error;
pub mod session;

pub use domain::{Cluster, Domain};
pub use error::{Result, SessionError};
pub use session::{Session, StatementOutcome};
