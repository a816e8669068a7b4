//! Session leases - the only write path a content session has into the store.
//!
//! Starting a session on a node issues a fresh [`SessionToken`] and revokes
//! any earlier one. Every leased write checks the token under the store's
//! write lock, so a superseded session can never touch the node again.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::GraphStore;
use crate::error::StoreError;
use topic_model::{NodeId, TopicNode};

/// Identifies one content session for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    /// Create a new random session token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a leased write.
#[derive(Debug, Clone, PartialEq)]
pub enum Leased<T> {
    /// The lease is current and the write was applied.
    Applied(T),
    /// The lease was superseded or already released; nothing changed.
    Stale,
}

impl<T> Leased<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Leased::Stale)
    }
}

/// Write access to one node for the lifetime of one content session.
#[derive(Debug, Clone)]
pub struct SessionLease {
    store: Arc<GraphStore>,
    node_id: NodeId,
    token: SessionToken,
}

impl SessionLease {
    pub(super) fn new(store: Arc<GraphStore>, node_id: NodeId, token: SessionToken) -> Self {
        Self {
            store,
            node_id,
            token,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// Whether this lease still owns the node.
    pub fn is_current(&self) -> bool {
        self.store.is_current(&self.node_id, self.token)
    }

    /// Append a chunk of content; returns the new content length.
    pub fn append_chunk(&self, text: &str) -> Result<Leased<usize>, StoreError> {
        self.store.leased_append(&self.node_id, self.token, text)
    }

    /// Complete the node and release the lease.
    pub fn finalize(
        &self,
        category: Option<String>,
        content_override: Option<String>,
    ) -> Result<Leased<TopicNode>, StoreError> {
        self.store
            .leased_finalize(&self.node_id, self.token, category, content_override)
    }

    /// Fail the node with fallback content and release the lease.
    pub fn mark_failed(&self, fallback: String) -> Result<Leased<TopicNode>, StoreError> {
        self.store
            .leased_mark_failed(&self.node_id, self.token, fallback)
    }
}
