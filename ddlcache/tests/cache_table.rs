use std::{sync::Arc, time::Duration};

use ddlcache::{Cluster, Domain, Session, SessionError, StatementOutcome};
use ddlcache_catalog::{
    Catalog, CatalogArgs, ErrorKind,
    store::CatalogStore,
    table::{CacheStatus, TableKind, TableRef},
    validate::CacheAction,
};
use ddlcache_jobs::{ExecutorArgs, JobRequest, JobState};
use ddlcache_txn::MemoryRowSink;
use pretty_assertions::assert_eq;

async fn setup() -> (Arc<Domain>, Session) {
    let domain = Domain::new_in_memory().await;
    let mut tk = domain.new_session();
    must_exec(&mut tk, "create database test").await;
    must_exec(&mut tk, "use test").await;
    (domain, tk)
}

async fn must_exec(tk: &mut Session, sql: &str) -> StatementOutcome {
    match tk.execute(sql).await {
        Ok(outcome) => outcome,
        Err(e) => panic!("{sql}: {e}"),
    }
}

async fn exec_err(tk: &mut Session, sql: &str) -> SessionError {
    match tk.execute(sql).await {
        Ok(outcome) => panic!("{sql}: expected an error, got {outcome:?}"),
        Err(e) => e,
    }
}

fn cache_status(domain: &Domain, table: &str) -> CacheStatus {
    domain.reload();
    domain
        .table_by_name("test", table)
        .unwrap_or_else(|| panic!("table {table} not found"))
        .cache_status
}

#[test_log::test(tokio::test)]
async fn alter_partitioned_tables() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "drop table if exists cache_partition_table").await;
    must_exec(
        &mut tk,
        "create table cache_partition_table (a int, b int) partition by hash(a) partitions 3;",
    )
    .await;
    must_exec(
        &mut tk,
        "create table cache_partition_range_table (c1 smallint(6) not null, c2 char(5) default null) \
         partition by range ( c1 ) ( partition p0 values less than (10), \
         partition p2 values less than (20), partition p3 values less than (MAXVALUE))",
    )
    .await;
    must_exec(&mut tk, "set @@session.tidb_enable_list_partition = ON").await;
    must_exec(
        &mut tk,
        "create table cache_partition_list_table (id int) partition by list (id) \
         (partition p0 values in (1,2), partition p1 values in (3,4), partition p3 values in (5,null))",
    )
    .await;

    for table in [
        "cache_partition_table",
        "cache_partition_range_table",
        "cache_partition_list_table",
    ] {
        let version = domain.catalog().current_version();
        let err = exec_err(&mut tk, &format!("alter table {table} cache")).await;
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperationOnCacheTable);
        assert_eq!(err.to_string(), "'partition mode' is unsupported on cache tables.");
        assert_eq!(domain.catalog().current_version(), version);
        assert_eq!(cache_status(&domain, table), CacheStatus::Disabled);
        assert!(matches!(
            domain.table_by_name("test", table).unwrap().kind,
            TableKind::Partitioned(_)
        ));
    }
}

#[test_log::test(tokio::test)]
async fn alter_view() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table cache_view_t (id int)").await;
    must_exec(&mut tk, "create view v as select * from cache_view_t").await;
    let err = exec_err(&mut tk, "alter table v cache").await;
    assert_eq!(err.kind(), ErrorKind::WrongObjectType);
    assert_eq!(err.code(), 1347);
    assert_eq!(err.to_string(), "'test.v' is not BASE TABLE");
    assert_eq!(cache_status(&domain, "v"), CacheStatus::Disabled);
}

#[test_log::test(tokio::test)]
async fn nocache_and_cache_are_idempotent() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table nocache_t1 ( n int auto_increment primary key)").await;

    let first = must_exec(&mut tk, "alter table nocache_t1 nocache").await;
    let second = must_exec(&mut tk, "alter table nocache_t1 nocache").await;
    assert!(matches!(
        (first, second),
        (StatementOutcome::SchemaChanged(a), StatementOutcome::SchemaChanged(b)) if a < b
    ));
    assert_eq!(cache_status(&domain, "nocache_t1"), CacheStatus::Disabled);

    must_exec(&mut tk, "alter table nocache_t1 cache").await;
    must_exec(&mut tk, "alter table nocache_t1 cache").await;
    assert_eq!(cache_status(&domain, "nocache_t1"), CacheStatus::Enabled);

    must_exec(&mut tk, "alter table nocache_t1 nocache").await;
    assert_eq!(cache_status(&domain, "nocache_t1"), CacheStatus::Disabled);
}

#[test_log::test(tokio::test)]
async fn structural_ddl_on_cached_table() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "drop table if exists cache_index").await;
    must_exec(
        &mut tk,
        "create table cache_index (c1 int primary key, c2 int, c3 int, index ok2(c2))",
    )
    .await;
    must_exec(&mut tk, "alter table cache_index cache").await;
    let indexes = domain
        .table_by_name("test", "cache_index")
        .unwrap()
        .index_names();
    assert_eq!(
        indexes.iter().map(|n| &**n).collect::<Vec<&str>>(),
        vec!["PRIMARY", "ok2"]
    );

    for sql in [
        "create index cache_c2 on cache_index(c2)",
        "alter table cache_index add index k2(c2)",
        "alter table cache_index drop index ok2",
        "alter table cache_index rename index ok2 to ok",
    ] {
        let err = exec_err(&mut tk, sql).await;
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperationOnCacheTable, "{sql}");
        assert_eq!(err.code(), 8242);
    }
    assert_eq!(
        domain
            .table_by_name("test", "cache_index")
            .unwrap()
            .index_names(),
        indexes
    );

    must_exec(&mut tk, "drop table if exists cache_index_1").await;
    must_exec(
        &mut tk,
        "create table cache_index_1 (id int, c1 int, c2 int, primary key(id), key i1(c1), key i2(c2));",
    )
    .await;
    must_exec(&mut tk, "alter table cache_index_1 cache").await;
    let err = exec_err(&mut tk, "alter table cache_index_1 drop index i1, drop index i2;").await;
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperationOnCacheTable);
    assert_eq!(
        domain
            .table_by_name("test", "cache_index_1")
            .unwrap()
            .index_names()
            .len(),
        3
    );

    // once the cache is disabled the index set may change again
    must_exec(&mut tk, "alter table cache_index_1 nocache").await;
    must_exec(&mut tk, "alter table cache_index_1 drop index i1, drop index i2;").await;
    domain.reload();
    assert_eq!(
        domain
            .table_by_name("test", "cache_index_1")
            .unwrap()
            .index_names()
            .len(),
        1
    );
}

#[test_log::test(tokio::test)]
async fn parse_error_and_missing_table() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t1 (a int)").await;

    let err = exec_err(&mut tk, "alter table t1 ca").await;
    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert_eq!(err.code(), 1064);

    let version = domain.catalog().current_version();
    let err = exec_err(&mut tk, "alter table t2 cache").await;
    assert_eq!(err.kind(), ErrorKind::NoSuchTable);
    assert_eq!(err.to_string(), "Table 'test.t2' doesn't exist");
    assert_eq!(domain.catalog().current_version(), version);
    assert_eq!(domain.executor().queue().pending_len(), 0);
}

#[test_log::test(tokio::test)]
async fn concurrent_cache_change_aborts_transaction() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t1 (a int)").await;
    let mut tk2 = domain.new_session();
    must_exec(&mut tk2, "use test").await;

    must_exec(&mut tk, "begin").await;
    assert_eq!(
        must_exec(&mut tk, "insert into t1 set a=1").await,
        StatementOutcome::Buffered { rows: 1 }
    );
    must_exec(&mut tk2, "alter table t1 cache").await;

    let err = exec_err(&mut tk, "commit").await;
    assert_eq!(err.kind(), ErrorKind::InfoSchemaChanged);
    assert_eq!(err.code(), 8028);
    assert!(
        err.to_string()
            .starts_with("Information schema is changed during the execution of the statement")
    );
    assert!(tk.transaction().is_none());

    // the row was discarded; the session can retry from scratch
    must_exec(&mut tk, "begin").await;
    must_exec(&mut tk, "insert into t1 set a=1").await;
    let StatementOutcome::Committed(info) = must_exec(&mut tk, "commit").await else {
        panic!("expected a commit");
    };
    assert_eq!(info.rows, 1);
}

#[test_log::test(tokio::test)]
async fn unrelated_cache_change_skips_checker() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t1 (a int)").await;
    must_exec(&mut tk, "create table t2 (a int)").await;
    let mut tk2 = domain.new_session();
    must_exec(&mut tk2, "use test").await;

    must_exec(&mut tk, "begin").await;
    must_exec(&mut tk, "insert into t1 set a=1").await;
    must_exec(&mut tk2, "alter table t2 cache").await;
    let StatementOutcome::Committed(info) = must_exec(&mut tk, "commit").await else {
        panic!("expected a commit");
    };
    assert_eq!(info.rows, 1);
    assert_eq!(info.schema_version, domain.catalog().current_version());

    // DDL inside the transaction commits it first
    must_exec(&mut tk, "begin").await;
    must_exec(&mut tk, "drop table if exists t1").await;
    assert!(tk.transaction().is_none());
    must_exec(&mut tk, "CREATE TABLE t1 (a int)").await;
    must_exec(&mut tk, "insert into t1 set a=2").await;
    must_exec(&mut tk2, "alter table t2 nocache").await;
    assert_eq!(must_exec(&mut tk, "commit").await, StatementOutcome::Ok);
}

#[test_log::test(tokio::test)]
async fn reads_are_fenced_too() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t1 (a int)").await;
    must_exec(&mut tk, "create table t2 (a int)").await;
    let mut tk2 = domain.new_session();
    must_exec(&mut tk2, "use test").await;

    must_exec(&mut tk, "begin").await;
    must_exec(&mut tk, "select * from t2").await;
    must_exec(&mut tk, "insert into t1 values (1)").await;
    must_exec(&mut tk2, "alter table t2 cache").await;
    let err = exec_err(&mut tk, "commit").await;
    assert_eq!(err.kind(), ErrorKind::InfoSchemaChanged);
}

#[test_log::test(tokio::test)]
async fn temporary_tables() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "drop table if exists t").await;
    must_exec(
        &mut tk,
        "create temporary table t (id int primary key auto_increment, u int unique, v int)",
    )
    .await;
    // session private, never published
    assert!(domain.table_by_name("test", "t").is_none());
    assert!(tk.temporary_table("test", "t").is_some());

    let err = exec_err(&mut tk, "alter table t cache").await;
    assert_eq!(err.kind(), ErrorKind::UnsupportedDdlOperation);
    assert_eq!(err.code(), 8200);
    assert_eq!(err.to_string(), "Unsupported alter temporary table cache");
    must_exec(&mut tk, "drop table if exists t").await;
    assert!(tk.temporary_table("test", "t").is_none());

    must_exec(&mut tk, "drop table if exists tmp1").await;
    must_exec(
        &mut tk,
        "create global temporary table tmp1 (id int not null primary key, code int not null, \
         value int default null, unique key code(code))on commit delete rows",
    )
    .await;
    let err = exec_err(&mut tk, "alter table tmp1 cache").await;
    assert_eq!(err.kind(), ErrorKind::OperationOnTemporaryTable);
    assert_eq!(err.code(), 8006);
    assert_eq!(
        err.to_string(),
        "`alter temporary table cache` is unsupported on temporary tables."
    );
    assert_eq!(
        domain.table_by_name("test", "tmp1").unwrap().kind,
        TableKind::GlobalTemporary
    );
}

#[test_log::test(tokio::test)]
async fn other_nodes_converge() {
    let catalog = Arc::new(Catalog::new_in_memory());
    let cluster = Cluster::start(Arc::clone(&catalog), ExecutorArgs::default());
    let node_a = cluster.join("a", Arc::new(MemoryRowSink::default())).await;
    let node_b = cluster.join("b", Arc::new(MemoryRowSink::default())).await;
    assert!(Arc::ptr_eq(node_a.executor(), node_b.executor()));

    let mut tk = node_a.new_session();
    must_exec(&mut tk, "create database test").await;
    must_exec(&mut tk, "use test").await;
    must_exec(&mut tk, "create table t (a int)").await;
    must_exec(&mut tk, "alter table t cache").await;

    assert_eq!(node_b.reload(), catalog.current_version());
    assert_eq!(cache_status(&node_b, "t"), CacheStatus::Enabled);

    node_a.shutdown().await;
    node_b.shutdown().await;
    cluster.shutdown().await;
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn jobs_from_different_nodes_serialize_per_table() {
    let catalog = Arc::new(Catalog::new(
        CatalogStore::in_memory(),
        CatalogArgs {
            schema_lease: Duration::from_millis(300),
            ..Default::default()
        },
    ));
    let cluster = Cluster::start(Arc::clone(&catalog), ExecutorArgs::default());
    let node_a = cluster.join("a", Arc::new(MemoryRowSink::default())).await;
    let node_b = cluster.join("b", Arc::new(MemoryRowSink::default())).await;

    let mut tk = node_a.new_session();
    must_exec(&mut tk, "create database test").await;
    must_exec(&mut tk, "use test").await;
    must_exec(&mut tk, "create table t (a int)").await;
    let table = TableRef::of(&node_b.table_by_name("test", "t").unwrap());

    // never acknowledges, so every commit holds its job running for a full lease
    let _stuck = catalog.subscribe("stuck").await;

    let a = node_a
        .executor()
        .submit(JobRequest::AlterCache {
            table: table.clone(),
            action: CacheAction::Enable,
        })
        .unwrap();
    let b = node_b
        .executor()
        .submit(JobRequest::AlterCache {
            table,
            action: CacheAction::Disable,
        })
        .unwrap();
    assert_ne!(a, b);

    let mut running = false;
    for _ in 0..100 {
        if node_a.executor().job(a).unwrap().state() == JobState::Running {
            running = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(running, "first job never started");
    assert_eq!(node_b.executor().job(b).unwrap().state(), JobState::Queued);

    let version_a = node_a.executor().await_job(a).await.unwrap();
    let version_b = node_b.executor().await_job(b).await.unwrap();
    assert!(version_a < version_b);
    assert_eq!(cache_status(&node_b, "t"), CacheStatus::Disabled);

    node_a.shutdown().await;
    node_b.shutdown().await;
    cluster.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn several_cache_clauses_are_rejected() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t (a int)").await;
    let version = domain.catalog().current_version();

    for sql in ["alter table t cache, nocache", "alter table t nocache, nocache"] {
        let err = exec_err(&mut tk, sql).await;
        assert_eq!(err.kind(), ErrorKind::UnsupportedDdlOperation, "{sql}");
        assert_eq!(
            err.to_string(),
            "Unsupported multi schema change for alter table cache"
        );
    }
    assert_eq!(domain.catalog().current_version(), version);
    assert_eq!(cache_status(&domain, "t"), CacheStatus::Disabled);
}

#[test_log::test(tokio::test)]
async fn cache_status_survives_restart() {
    let (domain, mut tk) = setup().await;
    must_exec(&mut tk, "create table t (a int)").await;
    must_exec(&mut tk, "alter table t cache").await;
    let store = domain.catalog().store().clone();
    let version = domain.catalog().current_version();
    domain.shutdown().await;

    let catalog = Catalog::load(store, CatalogArgs::default()).await.unwrap();
    assert_eq!(catalog.current_version(), version);
    assert_eq!(
        catalog.table_by_name("test", "t").unwrap().cache_status,
        CacheStatus::Enabled
    );
}

#[test_log::test(tokio::test)]
async fn no_database_selected() {
    let domain = Domain::new_in_memory().await;
    let mut tk = domain.new_session();
    let err = exec_err(&mut tk, "alter table t cache").await;
    assert_eq!(err.kind(), ErrorKind::NoDatabaseSelected);
    let err = exec_err(&mut tk, "use nope").await;
    assert_eq!(err.kind(), ErrorKind::DatabaseNotFound);
}
