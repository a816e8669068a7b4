//! Session registry - at most one running session task per node.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

use super::SessionOutcome;
use crate::store::SessionToken;
use topic_model::NodeId;

/// Handle to a spawned session task.
#[derive(Debug)]
pub struct SessionHandle {
    node_id: NodeId,
    token: SessionToken,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Wait for the session to end.
    ///
    /// A task aborted by a newer session reports
    /// [`SessionOutcome::Superseded`].
    pub async fn wait(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => SessionOutcome::Superseded,
            Err(err) => {
                tracing::error!(node_id = %self.node_id, error = %err, "session task panicked");
                SessionOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Tracks the running session task of each node.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: Mutex<HashMap<NodeId, (SessionToken, AbortHandle)>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a session task for a node, aborting the node's previous task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(
        self: &Arc<Self>,
        node_id: NodeId,
        token: SessionToken,
        session: F,
    ) -> SessionHandle
    where
        F: Future<Output = SessionOutcome> + Send + 'static,
    {
        let registry = Arc::clone(self);
        let release_id = node_id.clone();
        let wrapped = async move {
            let outcome = session.await;
            registry.release(&release_id, token);
            outcome
        };

        // The lock is held across spawn so the task cannot release its entry
        // before it is registered.
        let mut active = self.active.lock();
        let task = tokio::spawn(wrapped);
        let entry = (token, task.abort_handle());
        if let Some((previous, abort)) = active.insert(node_id.clone(), entry) {
            tracing::debug!(
                node_id = %node_id,
                superseded = %previous,
                "aborting superseded session task"
            );
            abort.abort();
        }
        drop(active);

        SessionHandle {
            node_id,
            token,
            task,
        }
    }

    /// Forget a finished session, unless a newer one already replaced it.
    pub fn release(&self, node_id: &NodeId, token: SessionToken) {
        let mut active = self.active.lock();
        if active.get(node_id).is_some_and(|(current, _)| *current == token) {
            active.remove(node_id);
        }
    }

    /// Whether a session task is running for the node.
    pub fn is_active(&self, node_id: &NodeId) -> bool {
        self.active.lock().contains_key(node_id)
    }

    /// Number of running session tasks.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}
