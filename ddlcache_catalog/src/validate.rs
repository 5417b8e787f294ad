//! Admission checks for `ALTER TABLE ... CACHE | NOCACHE`.

use tracing::debug;

use crate::{
    CatalogError, Result,
    table::{CacheStatus, TableKind, TableMeta},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CacheAction {
    Enable,
    Disable,
}

impl CacheAction {
    pub fn target_status(&self) -> CacheStatus {
        match self {
            Self::Enable => CacheStatus::Enabled,
            Self::Disable => CacheStatus::Disabled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "cache",
            Self::Disable => "nocache",
        }
    }
}

impl std::fmt::Display for CacheAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation name reported for temporary tables of either kind
pub const ALTER_TEMPORARY_TABLE_CACHE: &str = "alter temporary table cache";

/// Decide whether `action` may be queued against `table`.
///
/// `table` is the result of resolving `db_name.table_name` against the current snapshot (or
/// the session's temporary tables). Both directions are checked the same way: kinds that may
/// never be cached can never be altered either. A request that would not change the status is
/// accepted.
pub fn validate_alter_cache(
    db_name: &str,
    table_name: &str,
    table: Option<&TableMeta>,
    action: CacheAction,
) -> Result<()> {
    let Some(table) = table else {
        debug!(db_name, table_name, %action, "alter cache rejected: no such table");
        return Err(CatalogError::no_such_table(db_name, table_name));
    };
    let rejection = match table.kind {
        TableKind::Ordinary => return Ok(()),
        TableKind::View => CatalogError::WrongObjectType {
            db_name: db_name.into(),
            table_name: table_name.into(),
            expected: "BASE TABLE",
        },
        TableKind::Partitioned(_) => CatalogError::UnsupportedOperationOnCacheTable("partition mode"),
        TableKind::LocalTemporary => CatalogError::UnsupportedDdlOperation(ALTER_TEMPORARY_TABLE_CACHE),
        TableKind::GlobalTemporary => {
            CatalogError::OperationOnTemporaryTable(ALTER_TEMPORARY_TABLE_CACHE)
        }
    };
    debug!(
        table_id = %table.id,
        kind = table.kind.as_str(),
        %action,
        error = %rejection,
        "alter cache rejected"
    );
    Err(rejection)
}

#[cfg(test)]
mod tests {
    use ddlcache_id::{DbId, TableId};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        ErrorKind,
        table::{PartitionStrategy, TableSpec},
        version::SchemaVersion,
    };

    fn table_of(kind: TableKind) -> TableMeta {
        TableMeta::new(
            TableId::from(1),
            DbId::from(0),
            "test".into(),
            TableSpec::ordinary("t").with_kind(kind),
            SchemaVersion::new(1),
        )
        .unwrap()
    }

    fn kind_of_rejection(kind: TableKind, action: CacheAction) -> Option<ErrorKind> {
        let table = table_of(kind);
        validate_alter_cache("test", "t", Some(&table), action)
            .err()
            .map(|e| e.kind())
    }

    #[test]
    fn missing_table() {
        let err = validate_alter_cache("test", "t2", None, CacheAction::Enable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchTable);
        assert_eq!(err.to_string(), "Table 'test.t2' doesn't exist");
    }

    #[test]
    fn rejections_by_kind_apply_in_both_directions() {
        let cases = [
            (TableKind::Ordinary, None),
            (TableKind::View, Some(ErrorKind::WrongObjectType)),
            (
                TableKind::Partitioned(PartitionStrategy::Hash),
                Some(ErrorKind::UnsupportedOperationOnCacheTable),
            ),
            (
                TableKind::Partitioned(PartitionStrategy::Range),
                Some(ErrorKind::UnsupportedOperationOnCacheTable),
            ),
            (
                TableKind::Partitioned(PartitionStrategy::List),
                Some(ErrorKind::UnsupportedOperationOnCacheTable),
            ),
            (
                TableKind::LocalTemporary,
                Some(ErrorKind::UnsupportedDdlOperation),
            ),
            (
                TableKind::GlobalTemporary,
                Some(ErrorKind::OperationOnTemporaryTable),
            ),
        ];
        for (kind, expected) in cases {
            for action in [CacheAction::Enable, CacheAction::Disable] {
                assert_eq!(
                    kind_of_rejection(kind, action),
                    expected,
                    "{} / {action}",
                    kind.as_str()
                );
            }
        }
    }

    #[test]
    fn view_and_temporary_messages() {
        let view = table_of(TableKind::View);
        let err = validate_alter_cache("test", "v", Some(&view), CacheAction::Enable).unwrap_err();
        assert_eq!(err.to_string(), "'test.v' is not BASE TABLE");

        let global = table_of(TableKind::GlobalTemporary);
        let err =
            validate_alter_cache("test", "t", Some(&global), CacheAction::Enable).unwrap_err();
        assert!(err.to_string().contains(ALTER_TEMPORARY_TABLE_CACHE));
    }

    #[test]
    fn no_op_requests_are_accepted() {
        let mut table = table_of(TableKind::Ordinary);
        validate_alter_cache("test", "t", Some(&table), CacheAction::Disable).unwrap();
        table.cache_status = CacheStatus::Enabled;
        validate_alter_cache("test", "t", Some(&table), CacheAction::Enable).unwrap();
    }
}
