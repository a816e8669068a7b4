//! Topic nodes and reference edges.

use serde::{Deserialize, Serialize};

use crate::presentation;

/// Stable identifier of a topic node, derived from its display name by
/// [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle status of a topic node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Referenced, but no content has been requested yet.
    #[default]
    Stub,
    /// A content session is attached and waiting for its first chunk.
    Pending,
    /// Content is arriving.
    Streaming,
    /// Content is final.
    Complete,
    /// The content session failed; `content` holds a fallback notice.
    Failed,
}

impl NodeStatus {
    /// Whether a content session may currently write to the node.
    pub fn accepts_content(self) -> bool {
        matches!(self, NodeStatus::Pending | NodeStatus::Streaming)
    }

    /// Whether the node has reached a terminal status.
    pub fn is_settled(self) -> bool {
        matches!(self, NodeStatus::Complete | NodeStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Stub => "stub",
            NodeStatus::Pending => "pending",
            NodeStatus::Streaming => "streaming",
            NodeStatus::Complete => "complete",
            NodeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One explorable topic in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: NodeId,

    /// Display name, as first encountered.
    pub name: String,

    /// Classification label, known once content has arrived.
    pub category: Option<String>,

    /// Accumulated article text.
    pub content: String,

    pub status: NodeStatus,

    /// Rendering size hint.
    pub size_hint: u32,

    /// Rendering color hint (`#rrggbb`).
    pub color_hint: String,

    /// The node whose expansion first referenced this topic.
    pub parent_id: Option<NodeId>,
}

impl TopicNode {
    /// Create a stub node.
    pub fn stub(id: NodeId, name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        let mut node = Self {
            id,
            name: name.into(),
            category: None,
            content: String::new(),
            status: NodeStatus::Stub,
            size_hint: 0,
            color_hint: String::new(),
            parent_id,
        };
        node.refresh_hints();
        node
    }

    /// Whether this node was created without a parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Recompute the presentation hints from category and status.
    pub fn refresh_hints(&mut self) {
        self.size_hint = presentation::size_hint(self.status, self.is_root());
        self.color_hint =
            presentation::color_hint(self.category.as_deref(), self.status).to_string();
    }
}

/// Directed "source references target" relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: NodeId,
    pub target_id: NodeId,
}

impl Edge {
    /// Create a new edge.
    pub fn new(source_id: NodeId, target_id: NodeId) -> Self {
        Self {
            source_id,
            target_id,
        }
    }
}
