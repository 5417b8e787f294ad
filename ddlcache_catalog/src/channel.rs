//! Schema change notification.
//!
//! Every node replica registers with the [`SchemaNotifier`] of its catalog. A commit hands the
//! resulting [`SchemaUpdate`] to all registered nodes and waits, at most one schema lease, for
//! each of them to acknowledge it.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{log::SchemaChange, table::TableMeta, version::SchemaVersion};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("nodes {nodes:?} went away before acknowledging version {version}")]
    NodesGone {
        version: SchemaVersion,
        nodes: Vec<Arc<str>>,
    },

    #[error("nodes {nodes:?} did not acknowledge version {version} within {lease:?}")]
    LeaseExpired {
        version: SchemaVersion,
        lease: Duration,
        nodes: Vec<Arc<str>>,
    },
}

/// Updates a node may have outstanding before the committer blocks on sending
const NODE_UPDATE_BUFFER: usize = 1024;

pub type SchemaUpdateReceiver = mpsc::Receiver<SchemaUpdateMessage>;

/// A committed schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdate {
    pub version: SchemaVersion,
    pub change: SchemaChange,
    /// The affected table as of `version`. `None` for drops and database level changes.
    pub table: Option<Arc<TableMeta>>,
}

/// One [`SchemaUpdate`] delivered to one node.
///
/// Dropping the message acknowledges it, so a node acknowledges by finishing with it.
#[derive(Debug)]
pub struct SchemaUpdateMessage {
    update: Arc<SchemaUpdate>,
    ack: Option<oneshot::Sender<()>>,
}

impl SchemaUpdateMessage {
    pub fn update(&self) -> &SchemaUpdate {
        &self.update
    }

    pub fn version(&self) -> SchemaVersion {
        self.update.version
    }
}

impl Drop for SchemaUpdateMessage {
    fn drop(&mut self) {
        if let Some(ack) = self.ack.take() {
            // the committer stops listening once the lease is up
            if ack.send(()).is_err() {
                debug!(version = %self.update.version, "schema update acknowledged late");
            }
        }
    }
}

#[derive(Debug)]
struct NodeSubscription {
    node: Arc<str>,
    tx: mpsc::Sender<SchemaUpdateMessage>,
}

#[derive(Debug, Default)]
pub(crate) struct SchemaNotifier {
    nodes: Vec<NodeSubscription>,
}

enum Delivery {
    Acked,
    Gone(Arc<str>),
}

impl SchemaNotifier {
    /// Register `node` for schema updates.
    ///
    /// A node that registers again replaces its earlier subscription, whose receiver then sees
    /// the channel close.
    pub(crate) fn subscribe(&mut self, node: Arc<str>) -> SchemaUpdateReceiver {
        self.nodes.retain(|sub| !sub.tx.is_closed());
        if let Some(pos) = self.nodes.iter().position(|sub| sub.node == node) {
            warn!(%node, "node re-subscribed to schema updates");
            self.nodes.swap_remove(pos);
        }
        let (tx, rx) = mpsc::channel(NODE_UPDATE_BUFFER);
        self.nodes.push(NodeSubscription { node, tx });
        rx
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deliver `update` to every node and wait up to `lease` for all acknowledgements.
    pub(crate) async fn notify(
        &self,
        update: Arc<SchemaUpdate>,
        lease: Duration,
    ) -> Result<(), NotifyError> {
        let version = update.version;
        let mut acks = Vec::with_capacity(self.nodes.len());
        let mut gone = vec![];
        for sub in &self.nodes {
            let (ack, acked) = oneshot::channel();
            let msg = SchemaUpdateMessage {
                update: Arc::clone(&update),
                ack: Some(ack),
            };
            match sub.tx.try_send(msg) {
                Ok(()) => acks.push((Arc::clone(&sub.node), acked)),
                Err(mpsc::error::TrySendError::Closed(_)) => gone.push(Arc::clone(&sub.node)),
                Err(mpsc::error::TrySendError::Full(msg)) => {
                    // a full buffer counts against the lease like a slow ACK
                    let tx = sub.tx.clone();
                    tokio::spawn(async move {
                        if let Err(mpsc::error::SendError(mut msg)) = tx.send(msg).await {
                            msg.ack.take();
                        }
                    });
                    acks.push((Arc::clone(&sub.node), acked));
                }
            }
        }

        let nodes: Vec<_> = acks.iter().map(|(node, _)| Arc::clone(node)).collect();
        let waiting = join_all(acks.into_iter().map(|(node, acked)| async move {
            match acked.await {
                Ok(()) => Delivery::Acked,
                Err(_) => Delivery::Gone(node),
            }
        }));
        let Ok(deliveries) = tokio::time::timeout(lease, waiting).await else {
            return Err(NotifyError::LeaseExpired {
                version,
                lease,
                nodes,
            });
        };
        gone.extend(deliveries.into_iter().filter_map(|d| match d {
            Delivery::Acked => None,
            Delivery::Gone(node) => Some(node),
        }));
        if gone.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::NodesGone {
                version,
                nodes: gone,
            })
        }
    }
}
