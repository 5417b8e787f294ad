//! Node-local catalog replicas.
//!
//! Each node serves reads from its own [`NodeCatalog`], which holds the snapshot the node last
//! converged to. A replica converges when it applies a broadcast update, on [`reload`], and on a
//! timer running at half the schema lease, so that a node that misses a broadcast still observes
//! every version within one lease.
//!
//! [`reload`]: NodeCatalog::reload

use std::{sync::Arc, time::Instant};

use parking_lot::{Mutex, RwLock};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog, snapshot::CatalogSnapshot, table::TableMeta, version::SchemaVersion,
};

#[derive(Debug)]
pub struct NodeCatalog {
    node_id: Arc<str>,
    catalog: Arc<Catalog>,
    local: RwLock<Arc<CatalogSnapshot>>,
    last_reload: Mutex<Instant>,
}

impl NodeCatalog {
    pub fn new(node_id: impl Into<Arc<str>>, catalog: Arc<Catalog>) -> Arc<Self> {
        let local = catalog.snapshot();
        Arc::new(Self {
            node_id: node_id.into(),
            catalog,
            local: RwLock::new(local),
            last_reload: Mutex::new(Instant::now()),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Converge to the latest committed catalog version and return it.
    pub fn reload(&self) -> SchemaVersion {
        let latest = self.catalog.snapshot();
        let version = latest.version();
        {
            let mut local = self.local.write();
            // never move backwards if a concurrent reload already got further
            if local.version() < version {
                debug!(node_id = %self.node_id, from = %local.version(), to = %version, "replica reloaded");
                *local = latest;
            }
        }
        *self.last_reload.lock() = Instant::now();
        self.version()
    }

    pub fn version(&self) -> SchemaVersion {
        self.local.read().version()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.local.read())
    }

    pub fn table_by_name(&self, db_name: &str, table_name: &str) -> Option<Arc<TableMeta>> {
        self.local.read().table_by_name(db_name, table_name)
    }

    pub fn is_stale(&self) -> bool {
        self.version() < self.catalog.current_version()
    }

    /// Subscribe to catalog updates and keep this replica converged until `shutdown` fires.
    pub async fn start(self: &Arc<Self>, tasks: &TaskTracker, shutdown: CancellationToken) {
        let mut updates = self
            .catalog
            .subscribe(format!("node-catalog-{}", self.node_id))
            .await;
        let lease = self.catalog.schema_lease();
        let replica = Arc::clone(self);
        info!(node_id = %self.node_id, ?lease, "starting catalog replica");
        tasks.spawn(async move {
            let mut refresh = tokio::time::interval(lease / 2);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = updates.recv() => {
                        let Some(msg) = msg else { break };
                        if msg.version() > replica.version() {
                            replica.reload();
                        }
                        // ACK on drop
                        drop(msg);
                    }
                    _ = refresh.tick() => {
                        let since_last = replica.last_reload.lock().elapsed();
                        if replica.is_stale() && since_last > lease {
                            warn!(
                                node_id = %replica.node_id,
                                ?since_last,
                                "catalog replica lagged beyond the schema lease"
                            );
                        }
                        replica.reload();
                    }
                }
            }
            debug!(node_id = %replica.node_id, "catalog replica stopped");
        });
    }
}
