//! Graph Store - the shared, observable topic graph.
//!
//! The store is the single source of truth for the renderer. Every public
//! operation takes the lock once, so observers never see a half-applied
//! mutation, and emits its [`StoreEvent`]s once the change is visible. Most
//! operations emit a single event; the first chunk of a session emits
//! `StatusChanged` before `ContentAppended`, and no-ops emit nothing.
//!
//! Content sessions write through a [`SessionLease`]; plain
//! [`GraphStore::append_chunk`] and friends remain available for callers
//! that manage their own exclusivity.

mod graph;
mod lease;

pub use graph::*;
pub use lease::*;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::events::StoreEvent;
use topic_model::{Edge, NodeId, NodeStatus, TopicNode};

/// Default capacity of the store event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Immutable point-in-time view of the graph for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphSnapshot {
    /// Number of mutations applied before this snapshot was taken.
    pub version: u64,
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<Edge>,
    pub focused: Option<NodeId>,
}

impl GraphSnapshot {
    /// Find a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&TopicNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Edges leaving a node.
    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.source_id == id)
    }

    /// The focused node, if any.
    pub fn focused_node(&self) -> Option<&TopicNode> {
        self.focused.as_ref().and_then(|id| self.node(id))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    graph: TopicGraph,
    focused: Option<NodeId>,
    sessions: HashMap<NodeId, SessionToken>,
    version: u64,
}

/// Shared topic graph with change notification.
#[derive(Debug)]
pub struct GraphStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl GraphStore {
    /// Create an empty store whose event channel holds `event_buffer` events
    /// per lagging subscriber.
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Subscribe to store change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Create a stub node, or return the existing node with the same id.
    pub fn create_stub(&self, id: NodeId, name: &str, parent_id: Option<NodeId>) -> TopicNode {
        self.ensure_node(id, name, parent_id).0
    }

    /// Like [`GraphStore::create_stub`], also reporting whether the node was
    /// created by this call.
    pub fn ensure_node(
        &self,
        id: NodeId,
        name: &str,
        parent_id: Option<NodeId>,
    ) -> (TopicNode, bool) {
        let mut state = self.state.write();
        let (node, created) = state.graph.create_stub(id, name, parent_id);
        let node = node.clone();
        if created {
            tracing::debug!(node_id = %node.id, name = %node.name, "created stub node");
            self.emit(&mut state, StoreEvent::NodeCreated { id: node.id.clone() });
        }
        (node, created)
    }

    /// Add the edge `source -> target`.
    ///
    /// Duplicates are ignored. A missing endpoint is an anomaly in the caller
    /// and is logged, never raised.
    pub fn add_edge(&self, source_id: &NodeId, target_id: &NodeId) -> EdgeInsert {
        let mut state = self.state.write();
        let result = state.graph.add_edge(source_id, target_id);
        match result {
            EdgeInsert::Added => self.emit(
                &mut state,
                StoreEvent::EdgeAdded {
                    source_id: source_id.clone(),
                    target_id: target_id.clone(),
                },
            ),
            EdgeInsert::Duplicate => {}
            EdgeInsert::MissingEndpoint => {
                tracing::warn!(
                    source_id = %source_id,
                    target_id = %target_id,
                    "ignoring edge with a missing endpoint"
                );
            }
        }
        result
    }

    /// Append streamed text to a pending or streaming node.
    pub fn append_chunk(&self, id: &NodeId, text: &str) -> Result<usize, StoreError> {
        let mut state = self.state.write();
        self.apply_append(&mut state, id, text)
    }

    /// Complete a pending or streaming node.
    pub fn finalize(
        &self,
        id: &NodeId,
        category: Option<String>,
        content_override: Option<String>,
    ) -> Result<TopicNode, StoreError> {
        let mut state = self.state.write();
        let node = self.apply_finalize(&mut state, id, category, content_override)?;
        state.sessions.remove(id);
        Ok(node)
    }

    /// Fail a pending or streaming node, replacing its content.
    pub fn mark_failed(&self, id: &NodeId, fallback: String) -> Result<TopicNode, StoreError> {
        let mut state = self.state.write();
        let node = self.apply_mark_failed(&mut state, id, fallback)?;
        state.sessions.remove(id);
        Ok(node)
    }

    /// Start a content session on a node.
    ///
    /// The node is reset to `pending` and any previous session's lease is
    /// revoked.
    pub fn begin_session(self: &Arc<Self>, id: &NodeId) -> Result<SessionLease, StoreError> {
        let token = SessionToken::new();
        let mut state = self.state.write();
        state.graph.begin_content(id)?;
        if let Some(previous) = state.sessions.insert(id.clone(), token) {
            tracing::debug!(
                node_id = %id,
                superseded = %previous,
                token = %token,
                "session superseded"
            );
        }
        self.emit(
            &mut state,
            StoreEvent::StatusChanged {
                id: id.clone(),
                status: NodeStatus::Pending,
            },
        );
        Ok(SessionLease::new(Arc::clone(self), id.clone(), token))
    }

    /// Start a content session for a node that has no usable content yet:
    /// a `stub`, or a `failed` node being retried.
    ///
    /// Returns `None` while a session is in flight or once the node is
    /// complete, so concurrent activations fetch a topic at most once.
    pub fn claim_fetch(self: &Arc<Self>, id: &NodeId) -> Result<Option<SessionLease>, StoreError> {
        let token = SessionToken::new();
        let mut state = self.state.write();
        match state.graph.get(id).map(|n| n.status) {
            None => return Err(StoreError::NodeNotFound(id.clone())),
            Some(NodeStatus::Stub | NodeStatus::Failed) => {}
            Some(_) => return Ok(None),
        }
        state.graph.begin_content(id)?;
        state.sessions.insert(id.clone(), token);
        self.emit(
            &mut state,
            StoreEvent::StatusChanged {
                id: id.clone(),
                status: NodeStatus::Pending,
            },
        );
        Ok(Some(SessionLease::new(Arc::clone(self), id.clone(), token)))
    }

    /// Move focus to an existing node.
    pub fn focus(&self, id: &NodeId) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.graph.contains(id) {
            return Err(StoreError::NodeNotFound(id.clone()));
        }
        if state.focused.as_ref() != Some(id) {
            state.focused = Some(id.clone());
            self.emit(&mut state, StoreEvent::FocusChanged { id: id.clone() });
        }
        Ok(())
    }

    /// The node the detail panel should display.
    pub fn focused(&self) -> Option<NodeId> {
        self.state.read().focused.clone()
    }

    /// Get a copy of a node.
    pub fn node(&self, id: &NodeId) -> Option<TopicNode> {
        self.state.read().graph.get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.state.read().graph.contains(id)
    }

    pub fn has_edge(&self, source_id: &NodeId, target_id: &NodeId) -> bool {
        self.state.read().graph.has_edge(source_id, target_id)
    }

    /// Token of the session currently owning a node, if any.
    pub fn active_session(&self, id: &NodeId) -> Option<SessionToken> {
        self.state.read().sessions.get(id).copied()
    }

    /// Take an immutable snapshot of the whole graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        GraphSnapshot {
            version: state.version,
            nodes: state.graph.nodes().cloned().collect(),
            edges: state.graph.edges().to_vec(),
            focused: state.focused.clone(),
        }
    }

    pub(crate) fn is_current(&self, id: &NodeId, token: SessionToken) -> bool {
        self.state.read().sessions.get(id) == Some(&token)
    }

    pub(crate) fn leased_append(
        &self,
        id: &NodeId,
        token: SessionToken,
        text: &str,
    ) -> Result<Leased<usize>, StoreError> {
        let mut state = self.state.write();
        if !Self::holds(&state, id, token) {
            return Ok(Leased::Stale);
        }
        self.apply_append(&mut state, id, text).map(Leased::Applied)
    }

    pub(crate) fn leased_finalize(
        &self,
        id: &NodeId,
        token: SessionToken,
        category: Option<String>,
        content_override: Option<String>,
    ) -> Result<Leased<TopicNode>, StoreError> {
        let mut state = self.state.write();
        if !Self::holds(&state, id, token) {
            return Ok(Leased::Stale);
        }
        let node = self.apply_finalize(&mut state, id, category, content_override)?;
        state.sessions.remove(id);
        Ok(Leased::Applied(node))
    }

    pub(crate) fn leased_mark_failed(
        &self,
        id: &NodeId,
        token: SessionToken,
        fallback: String,
    ) -> Result<Leased<TopicNode>, StoreError> {
        let mut state = self.state.write();
        if !Self::holds(&state, id, token) {
            return Ok(Leased::Stale);
        }
        let node = self.apply_mark_failed(&mut state, id, fallback)?;
        state.sessions.remove(id);
        Ok(Leased::Applied(node))
    }

    fn holds(state: &StoreState, id: &NodeId, token: SessionToken) -> bool {
        let current = state.sessions.get(id) == Some(&token);
        if !current {
            tracing::debug!(node_id = %id, token = %token, "discarding write from stale session");
        }
        current
    }

    fn apply_append(
        &self,
        state: &mut StoreState,
        id: &NodeId,
        text: &str,
    ) -> Result<usize, StoreError> {
        let was_pending = state.graph.get(id).map(|n| n.status) == Some(NodeStatus::Pending);
        let length = state.graph.append_chunk(id, text)?;
        if was_pending {
            self.emit(
                state,
                StoreEvent::StatusChanged {
                    id: id.clone(),
                    status: NodeStatus::Streaming,
                },
            );
        }
        self.emit(state, StoreEvent::ContentAppended { id: id.clone(), length });
        Ok(length)
    }

    fn apply_finalize(
        &self,
        state: &mut StoreState,
        id: &NodeId,
        category: Option<String>,
        content_override: Option<String>,
    ) -> Result<TopicNode, StoreError> {
        let node = state.graph.finalize(id, category, content_override)?.clone();
        self.emit(
            state,
            StoreEvent::StatusChanged {
                id: id.clone(),
                status: NodeStatus::Complete,
            },
        );
        Ok(node)
    }

    fn apply_mark_failed(
        &self,
        state: &mut StoreState,
        id: &NodeId,
        fallback: String,
    ) -> Result<TopicNode, StoreError> {
        let node = state.graph.mark_failed(id, fallback)?.clone();
        self.emit(
            state,
            StoreEvent::StatusChanged {
                id: id.clone(),
                status: NodeStatus::Failed,
            },
        );
        Ok(node)
    }

    fn emit(&self, state: &mut StoreState, event: StoreEvent) {
        state.version += 1;
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
