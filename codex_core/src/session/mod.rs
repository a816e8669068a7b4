//! Streaming Content Session - one content request for one node.
//!
//! ```text
//! Idle -> Requested -> Streaming -> Completed
//!            |             |
//!            +-------------+------> Failed
//! ```
//!
//! The session writes to its node only through a [`SessionLease`]. Once a
//! newer session takes over the node, every further write is discarded and
//! the session ends as [`SessionOutcome::Superseded`].

mod registry;

pub use registry::*;

use futures::StreamExt;
use std::sync::Arc;

use crate::backend::{Article, BackendEvent, ContentBackend};
use crate::error::BackendError;
use crate::store::{Leased, SessionLease};
use topic_model::{extract_references, NodeId, TopicNode};

/// States of a content session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Requested,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The node is complete; `references` are the distinct terms in its
    /// final content.
    Completed {
        node: TopicNode,
        references: Vec<String>,
    },
    /// The node holds fallback content.
    Failed { reason: String },
    /// A newer session took over the node; nothing was written after that.
    Superseded,
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed { .. })
    }
}

/// Receives references discovered in still-streaming content.
pub trait ReferenceSink: Send + Sync {
    fn link_references(&self, parent_id: &NodeId, terms: &[String]);
}

/// Content shown on a node whose request failed.
pub fn fallback_content(topic: &str) -> String {
    format!(
        "# {topic}\n\n\
         The article for \"{topic}\" could not be generated right now.\n\n\
         Activate the topic again later to retry, or continue exploring from a related topic."
    )
}

/// One in-flight content request.
pub struct StreamingSession {
    lease: SessionLease,
    topic: String,
    state: SessionState,
    partial_sink: Option<Arc<dyn ReferenceSink>>,
}

impl StreamingSession {
    /// Create a session for `topic` writing through `lease`.
    pub fn new(lease: SessionLease, topic: impl Into<String>) -> Self {
        Self {
            lease,
            topic: topic.into(),
            state: SessionState::Idle,
            partial_sink: None,
        }
    }

    /// Report references found in partial content to `sink` as chunks arrive.
    pub fn with_partial_references(mut self, sink: Arc<dyn ReferenceSink>) -> Self {
        self.partial_sink = Some(sink);
        self
    }

    pub fn node_id(&self) -> &NodeId {
        self.lease.node_id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to its end.
    pub async fn run(mut self, backend: Arc<dyn ContentBackend>) -> SessionOutcome {
        self.state = SessionState::Requested;
        tracing::info!(topic = %self.topic, "requesting content");

        let mut events = match backend.open(&self.topic).await {
            Ok(events) => events,
            Err(err) => return self.fail(&err),
        };
        if !self.lease.is_current() {
            return self.superseded();
        }

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => return self.fail(&err),
            };
            match event {
                BackendEvent::Chunk(text) => {
                    if let Some(outcome) = self.apply_chunk(&text) {
                        return outcome;
                    }
                }
                BackendEvent::Complete(article) => return self.complete(article),
                BackendEvent::Error(message) => return self.fail(&BackendError::Remote(message)),
            }
        }

        self.fail(&BackendError::Truncated)
    }

    /// Apply one chunk; returns an outcome when the session must stop.
    fn apply_chunk(&mut self, text: &str) -> Option<SessionOutcome> {
        match self.lease.append_chunk(text) {
            Ok(Leased::Applied(length)) => {
                if self.state == SessionState::Requested {
                    self.state = SessionState::Streaming;
                    tracing::debug!("first chunk received");
                }
                tracing::trace!(length, "chunk applied");
                if text.contains(']') {
                    self.report_partial_references();
                }
                None
            }
            Ok(Leased::Stale) => Some(self.superseded()),
            Err(err) => {
                tracing::error!(error = %err, "store rejected chunk");
                self.state = SessionState::Failed;
                Some(SessionOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    fn report_partial_references(&self) {
        let Some(sink) = &self.partial_sink else {
            return;
        };
        let Some(node) = self.lease.store().node(self.lease.node_id()) else {
            return;
        };
        let terms = extract_references(&node.content);
        if !terms.is_empty() {
            sink.link_references(self.lease.node_id(), &terms);
        }
    }

    fn complete(mut self, article: Article) -> SessionOutcome {
        // An empty final payload keeps whatever was streamed.
        let content_override = (!article.content.is_empty()).then_some(article.content);
        match self.lease.finalize(Some(article.category), content_override) {
            Ok(Leased::Applied(node)) => {
                self.state = SessionState::Completed;
                let references = extract_references(&node.content);
                tracing::info!(
                    category = node.category.as_deref().unwrap_or("-"),
                    length = node.content.len(),
                    references = references.len(),
                    "content complete"
                );
                SessionOutcome::Completed { node, references }
            }
            Ok(Leased::Stale) => self.superseded(),
            Err(err) => {
                tracing::error!(error = %err, "store rejected completion");
                self.state = SessionState::Failed;
                SessionOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn fail(mut self, cause: &BackendError) -> SessionOutcome {
        tracing::warn!(topic = %self.topic, error = %cause, "content request failed");
        match self.lease.mark_failed(fallback_content(&self.topic)) {
            Ok(Leased::Applied(_)) => {
                self.state = SessionState::Failed;
                SessionOutcome::Failed {
                    reason: cause.to_string(),
                }
            }
            Ok(Leased::Stale) => self.superseded(),
            Err(err) => {
                tracing::error!(error = %err, "store rejected failure");
                self.state = SessionState::Failed;
                SessionOutcome::Failed {
                    reason: cause.to_string(),
                }
            }
        }
    }

    fn superseded(&mut self) -> SessionOutcome {
        tracing::debug!("session superseded; dropping its remaining events");
        self.state = SessionState::Failed;
        SessionOutcome::Superseded
    }
}
