use std::sync::Arc;

use crate::{store::CatalogStoreError, version::SchemaVersion};

/// Stable classification of every error surfaced to a client.
///
/// The numeric [`code`][ErrorKind::code] follows the MySQL-compatible error numbers that
/// SQL clients already match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    NoDatabaseSelected,
    DatabaseNotFound,
    DatabaseExists,
    NoSuchTable,
    TableExists,
    WrongObjectType,
    IndexNotFound,
    IndexExists,
    UnsupportedOperationOnCacheTable,
    UnsupportedDdlOperation,
    OperationOnTemporaryTable,
    InfoSchemaChanged,
    WriteConflict,
    JobCancelled,
    DdlWaitTimeout,
    Internal,
}

impl ErrorKind {
    pub const fn code(self) -> u16 {
        match self {
            Self::ParseError => 1064,
            Self::NoDatabaseSelected => 1046,
            Self::DatabaseNotFound => 1049,
            Self::DatabaseExists => 1007,
            Self::NoSuchTable => 1146,
            Self::TableExists => 1050,
            Self::WrongObjectType => 1347,
            Self::IndexNotFound => 1176,
            Self::IndexExists => 1061,
            Self::UnsupportedOperationOnCacheTable => 8242,
            Self::UnsupportedDdlOperation => 8200,
            Self::OperationOnTemporaryTable => 8006,
            Self::InfoSchemaChanged => 8028,
            Self::WriteConflict => 9007,
            Self::JobCancelled => 8214,
            Self::DdlWaitTimeout | Self::Internal => 1105,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown database '{0}'")]
    DatabaseNotFound(Arc<str>),

    #[error("Can't create database '{0}'; database exists")]
    DatabaseAlreadyExists(Arc<str>),

    #[error("Table '{db_name}.{table_name}' doesn't exist")]
    NoSuchTable {
        db_name: Arc<str>,
        table_name: Arc<str>,
    },

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(Arc<str>),

    #[error("'{db_name}.{table_name}' is not {expected}")]
    WrongObjectType {
        db_name: Arc<str>,
        table_name: Arc<str>,
        expected: &'static str,
    },

    #[error("Key '{index_name}' doesn't exist in table '{table_name}'")]
    IndexNotFound {
        index_name: Arc<str>,
        table_name: Arc<str>,
    },

    #[error("Duplicate key name '{0}'")]
    IndexAlreadyExists(Arc<str>),

    #[error("'{0}' is unsupported on cache tables.")]
    UnsupportedOperationOnCacheTable(&'static str),

    #[error("Unsupported {0}")]
    UnsupportedDdlOperation(&'static str),

    #[error("`{0}` is unsupported on temporary tables.")]
    OperationOnTemporaryTable(&'static str),

    #[error("Write conflict: catalog version {attempted} was claimed by another writer")]
    WriteConflict { attempted: SchemaVersion },

    #[error("catalog store error: {0}")]
    Store(#[source] Arc<CatalogStoreError>),

    #[error("unexpected catalog state: {0}")]
    Unexpected(Arc<str>),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DatabaseNotFound(_) => ErrorKind::DatabaseNotFound,
            Self::DatabaseAlreadyExists(_) => ErrorKind::DatabaseExists,
            Self::NoSuchTable { .. } => ErrorKind::NoSuchTable,
            Self::TableAlreadyExists(_) => ErrorKind::TableExists,
            Self::WrongObjectType { .. } => ErrorKind::WrongObjectType,
            Self::IndexNotFound { .. } => ErrorKind::IndexNotFound,
            Self::IndexAlreadyExists(_) => ErrorKind::IndexExists,
            Self::UnsupportedOperationOnCacheTable(_) => ErrorKind::UnsupportedOperationOnCacheTable,
            Self::UnsupportedDdlOperation(_) => ErrorKind::UnsupportedDdlOperation,
            Self::OperationOnTemporaryTable(_) => ErrorKind::OperationOnTemporaryTable,
            Self::WriteConflict { .. } => ErrorKind::WriteConflict,
            Self::Store(_) | Self::Unexpected(_) => ErrorKind::Internal,
        }
    }

    pub fn no_such_table(db_name: impl Into<Arc<str>>, table_name: impl Into<Arc<str>>) -> Self {
        Self::NoSuchTable {
            db_name: db_name.into(),
            table_name: table_name.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(Arc::from(message.into()))
    }
}

impl From<CatalogStoreError> for CatalogError {
    fn from(error: CatalogStoreError) -> Self {
        Self::Store(Arc::new(error))
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_client_expectations() {
        let err = CatalogError::no_such_table("test", "t2");
        assert_eq!(err.to_string(), "Table 'test.t2' doesn't exist");
        assert_eq!(err.kind().code(), 1146);

        let err = CatalogError::OperationOnTemporaryTable("alter temporary table cache");
        assert_eq!(
            err.to_string(),
            "`alter temporary table cache` is unsupported on temporary tables."
        );
        assert_eq!(err.kind().code(), 8006);

        let err = CatalogError::UnsupportedOperationOnCacheTable("drop index");
        assert_eq!(err.to_string(), "'drop index' is unsupported on cache tables.");
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperationOnCacheTable);
    }
}
