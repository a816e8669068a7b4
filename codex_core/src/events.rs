//! Store change notifications.
//!
//! The store emits events for every applied mutation, after the mutation is
//! visible to snapshots. A single operation may emit more than one: the first
//! chunk of a session reports the move to `streaming` and then the append.
//! Observers typically react by taking a new snapshot.

use serde::{Deserialize, Serialize};
use topic_model::{NodeId, NodeStatus};

/// A change applied to the topic graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    NodeCreated { id: NodeId },
    EdgeAdded { source_id: NodeId, target_id: NodeId },
    StatusChanged { id: NodeId, status: NodeStatus },
    ContentAppended { id: NodeId, length: usize },
    FocusChanged { id: NodeId },
}

impl StoreEvent {
    /// The node the event is about; for edges, the target.
    pub fn node_id(&self) -> &NodeId {
        match self {
            StoreEvent::NodeCreated { id }
            | StoreEvent::StatusChanged { id, .. }
            | StoreEvent::ContentAppended { id, .. }
            | StoreEvent::FocusChanged { id } => id,
            StoreEvent::EdgeAdded { target_id, .. } => target_id,
        }
    }
}
