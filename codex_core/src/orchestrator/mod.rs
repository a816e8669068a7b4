//! Graph Expansion Orchestrator - the entry point for user interaction.
//!
//! Activating a topic works as follows:
//! 1. **Validate**: Reject blank terms before touching the graph
//! 2. **Resolve**: Normalize the term into a node id
//! 3. **Existing node**: Focus it and link it to the parent; fetch only if it is a stub or failed
//! 4. **New node**: Create a stub, link it, focus it and start its content session
//! 5. **Completion**: Every reference in the finished article becomes a stub child, without fetching
//!
//! One activation therefore costs at most one content request, however many
//! references the article contains.

use std::sync::Arc;
use tracing::Instrument;

use crate::backend::ContentBackend;
use crate::config::GraphConfig;
use crate::error::{CodexResult, StoreError};
use crate::session::{
    ReferenceSink, SessionHandle, SessionOutcome, SessionRegistry, StreamingSession,
};
use crate::store::{GraphSnapshot, GraphStore, SessionLease};
use topic_model::{validate_term, NodeId};

/// Result of activating a topic.
#[derive(Debug)]
pub struct Activation {
    pub node_id: NodeId,
    /// Whether the activation created the node.
    pub created: bool,
    /// The content session started by this activation, if any. Dropping it
    /// does not cancel the session.
    pub session: Option<SessionHandle>,
}

impl Activation {
    /// Wait for the started session, if any.
    pub async fn wait(self) -> Option<SessionOutcome> {
        match self.session {
            Some(session) => Some(session.wait().await),
            None => None,
        }
    }
}

/// Grows the topic graph in response to user interaction.
#[derive(Clone)]
pub struct ExpansionOrchestrator {
    store: Arc<GraphStore>,
    backend: Arc<dyn ContentBackend>,
    sessions: Arc<SessionRegistry>,
    extract_while_streaming: bool,
}

impl ExpansionOrchestrator {
    /// Create an orchestrator over a store and a content backend.
    pub fn new(store: Arc<GraphStore>, backend: Arc<dyn ContentBackend>) -> Self {
        Self {
            store,
            backend,
            sessions: Arc::new(SessionRegistry::new()),
            extract_while_streaming: false,
        }
    }

    /// Create an orchestrator with a fresh store sized from `config`.
    pub fn from_config(config: &GraphConfig, backend: Arc<dyn ContentBackend>) -> Self {
        let store = Arc::new(GraphStore::new(config.event_buffer));
        Self::new(store, backend).with_partial_extraction(config.extract_while_streaming)
    }

    /// Also create reference stubs while articles are still streaming.
    pub fn with_partial_extraction(mut self, enabled: bool) -> Self {
        self.extract_while_streaming = enabled;
        self
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Activate a topic in response to a click.
    ///
    /// Must be called from within a tokio runtime. Completion is observed
    /// through the store; the returned [`Activation`] may be dropped.
    pub fn activate_or_expand(
        &self,
        term: &str,
        parent_id: Option<&NodeId>,
    ) -> CodexResult<Activation> {
        let (name, id) = validate_term(term)?;
        let parent_id = parent_id.filter(|parent| self.known_parent(parent));

        let (node, created) = self.store.ensure_node(id.clone(), name, parent_id.cloned());
        if let Some(parent) = parent_id {
            if parent != &id {
                self.store.add_edge(parent, &id);
            }
        }
        self.store.focus(&id)?;

        let session = match self.store.claim_fetch(&id)? {
            Some(lease) => Some(self.spawn_session(lease, node.name.clone())),
            None => None,
        };

        if created {
            tracing::info!(node_id = %id, name = %node.name, "expanding new topic");
        } else if session.is_some() {
            tracing::info!(
                node_id = %id,
                status = %node.status,
                "fetching content for existing topic"
            );
        } else {
            tracing::debug!(node_id = %id, status = %node.status, "focusing existing topic");
        }

        Ok(Activation {
            node_id: id,
            created,
            session,
        })
    }

    /// Activate a parentless starting topic.
    pub fn seed_root(&self, term: &str) -> CodexResult<Activation> {
        self.activate_or_expand(term, None)
    }

    /// Fetch a node's content again, superseding any session in flight.
    pub fn refresh(&self, id: &NodeId) -> CodexResult<SessionHandle> {
        let node = self
            .store
            .node(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        let lease = self.store.begin_session(id)?;
        tracing::info!(node_id = %id, "refreshing topic content");
        Ok(self.spawn_session(lease, node.name))
    }

    /// Link a referenced term under `parent_id` as a stub, without fetching.
    ///
    /// Returns the child's id, or `None` for blank terms and
    /// self-references.
    pub fn link_child(&self, parent_id: &NodeId, term: &str) -> Option<NodeId> {
        let (name, id) = match validate_term(term) {
            Ok(valid) => valid,
            Err(err) => {
                tracing::debug!(parent_id = %parent_id, error = %err, "skipping reference");
                return None;
            }
        };
        if &id == parent_id {
            return None;
        }
        self.store.ensure_node(id.clone(), name, Some(parent_id.clone()));
        self.store.add_edge(parent_id, &id);
        Some(id)
    }

    /// Current graph for the renderer.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.store.snapshot()
    }

    /// The node the detail panel should display.
    pub fn focused_node_id(&self) -> Option<NodeId> {
        self.store.focused()
    }

    fn known_parent(&self, parent_id: &NodeId) -> bool {
        let known = self.store.contains(parent_id);
        if !known {
            tracing::warn!(parent_id = %parent_id, "ignoring unknown parent");
        }
        known
    }

    fn spawn_session(&self, lease: SessionLease, topic: String) -> SessionHandle {
        let node_id = lease.node_id().clone();
        let token = lease.token();

        let mut session = StreamingSession::new(lease, topic);
        if self.extract_while_streaming {
            session = session.with_partial_references(Arc::new(self.clone()));
        }

        let backend = Arc::clone(&self.backend);
        let orchestrator = self.clone();
        let span = tracing::info_span!("session", node_id = %node_id, token = %token);
        let task = async move {
            let outcome = session.run(backend).await;
            if let SessionOutcome::Completed { node, references } = &outcome {
                orchestrator.link_references(&node.id, references);
            }
            outcome
        }
        .instrument(span);

        self.sessions.spawn(node_id, token, task)
    }
}

impl ReferenceSink for ExpansionOrchestrator {
    fn link_references(&self, parent_id: &NodeId, terms: &[String]) {
        let linked = terms
            .iter()
            .filter_map(|term| self.link_child(parent_id, term))
            .count();
        tracing::debug!(parent_id = %parent_id, linked, "linked references");
    }
}

impl std::fmt::Debug for ExpansionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpansionOrchestrator")
            .field("store", &self.store)
            .field("sessions", &self.sessions)
            .field("extract_while_streaming", &self.extract_while_streaming)
            .finish_non_exhaustive()
    }
}
