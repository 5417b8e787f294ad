//! The versioned catalog of databases and tables, along with the checks that gate changes to a
//! table's cache status and structure.

pub mod catalog;
pub mod channel;
pub mod error;
pub mod guard;
pub mod log;
pub mod replica;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod validate;
pub mod version;

pub use catalog::{Catalog, CatalogArgs, CommitOutcome};
pub use error::{CatalogError, ErrorKind, Result};
pub use replica::NodeCatalog;
pub use snapshot::CatalogSnapshot;
pub use version::SchemaVersion;
