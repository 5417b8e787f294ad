//! The per-node wiring of catalog, DDL executor and transaction fencing.

use std::sync::Arc;

use ddlcache_catalog::{Catalog, NodeCatalog, SchemaVersion, table::TableMeta};
use ddlcache_id::{TxnId, TxnIdAllocator};
use ddlcache_jobs::{DdlExecutor, ExecutorArgs};
use ddlcache_txn::{MemoryRowSink, RowSink, SchemaFencer};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use crate::session::Session;

/// The DDL owner shared by every node of a cluster.
///
/// There is exactly one job queue and executor per [`Catalog`], so job ids are unique and at
/// most one job runs per table no matter which node a statement arrives on.
#[derive(Debug)]
pub struct Cluster {
    catalog: Arc<Catalog>,
    executor: Arc<DdlExecutor>,
    txn_ids: TxnIdAllocator,
}

impl Cluster {
    /// Start the DDL workers for `catalog`.
    pub fn start(catalog: Arc<Catalog>, executor_args: ExecutorArgs) -> Arc<Self> {
        let executor = DdlExecutor::new(Arc::clone(&catalog), executor_args);
        executor.start();
        Arc::new(Self {
            catalog,
            executor,
            txn_ids: TxnIdAllocator::default(),
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn executor(&self) -> &Arc<DdlExecutor> {
        &self.executor
    }

    /// Bring up node `node_id`. The node shares this cluster's executor and leaves it running
    /// when it shuts down.
    pub async fn join(self: &Arc<Self>, node_id: &str, sink: Arc<dyn RowSink>) -> Arc<Domain> {
        Domain::join(Arc::clone(self), node_id, sink, false).await
    }

    /// Stop the DDL workers. Running jobs finish first.
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}

/// Everything a node needs to serve sessions.
///
/// A domain submits DDL to its [`Cluster`] and keeps a [`NodeCatalog`] replica that sessions
/// resolve names against. Tests join several domains to one cluster to stand in for the nodes
/// of a deployment.
#[derive(Debug)]
pub struct Domain {
    cluster: Arc<Cluster>,
    /// Whether shutting this node down also stops the cluster's executor
    owns_cluster: bool,
    fencer: SchemaFencer,
    sink: Arc<dyn RowSink>,
    node: Arc<NodeCatalog>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Domain {
    /// Start a single node cluster over `catalog`.
    pub async fn start(
        node_id: &str,
        catalog: Arc<Catalog>,
        executor_args: ExecutorArgs,
        sink: Arc<dyn RowSink>,
    ) -> Arc<Self> {
        let cluster = Cluster::start(catalog, executor_args);
        Self::join(cluster, node_id, sink, true).await
    }

    /// A single node over a fresh in-memory catalog, writing rows to a [`MemoryRowSink`].
    pub async fn new_in_memory() -> Arc<Self> {
        Self::start(
            "local",
            Arc::new(Catalog::new_in_memory()),
            ExecutorArgs::default(),
            Arc::new(MemoryRowSink::default()),
        )
        .await
    }

    async fn join(
        cluster: Arc<Cluster>,
        node_id: &str,
        sink: Arc<dyn RowSink>,
        owns_cluster: bool,
    ) -> Arc<Self> {
        let catalog = Arc::clone(cluster.catalog());
        let tasks = TaskTracker::new();
        let shutdown = CancellationToken::new();
        let node = NodeCatalog::new(node_id, Arc::clone(&catalog));
        node.start(&tasks, shutdown.clone()).await;
        info!(node_id, version = %catalog.current_version(), "domain started");
        Arc::new(Self {
            fencer: SchemaFencer::new(catalog),
            cluster,
            owns_cluster,
            sink,
            node,
            tasks,
            shutdown,
        })
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.cluster.catalog()
    }

    pub fn executor(&self) -> &Arc<DdlExecutor> {
        self.cluster.executor()
    }

    pub fn fencer(&self) -> &SchemaFencer {
        &self.fencer
    }

    pub fn sink(&self) -> &Arc<dyn RowSink> {
        &self.sink
    }

    pub fn node(&self) -> &Arc<NodeCatalog> {
        &self.node
    }

    pub(crate) fn next_txn_id(&self) -> TxnId {
        self.cluster.txn_ids.allocate()
    }

    /// Force this node's catalog to the latest committed version.
    pub fn reload(&self) -> SchemaVersion {
        self.node.reload()
    }

    /// Look up a table in this node's catalog.
    pub fn table_by_name(&self, db_name: &str, table_name: &str) -> Option<Arc<TableMeta>> {
        self.node.table_by_name(db_name, table_name)
    }

    pub fn new_session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// Stop the replica refresh loop, and the DDL workers if this node started the cluster.
    pub async fn shutdown(&self) {
        if self.owns_cluster {
            self.cluster.shutdown().await;
        }
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!(node_id = self.node.node_id(), "domain stopped");
    }
}
