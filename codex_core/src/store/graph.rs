//! Topic Graph - the plain, single-owner graph structure.
//!
//! `TopicGraph` enforces the structural invariants (one node per id, one edge
//! per ordered pair, no dangling edges, content only written while a node is
//! pending or streaming). Sharing, locking and notification live in
//! [`super::GraphStore`].

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::error::StoreError;
use topic_model::{Edge, NodeId, NodeStatus, TopicNode};

/// Result of inserting an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Added,
    /// The ordered pair already exists.
    Duplicate,
    /// One of the endpoints does not exist; nothing was added.
    MissingEndpoint,
}

/// Nodes keyed by id in creation order, plus the edge list.
#[derive(Debug, Clone, Default)]
pub struct TopicGraph {
    nodes: IndexMap<NodeId, TopicNode>,
    edges: Vec<Edge>,
    edge_index: HashSet<(NodeId, NodeId)>,
}

impl TopicGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stub node unless the id already exists.
    ///
    /// Returns the node and whether it was created. An existing node keeps
    /// its name and parent.
    pub fn create_stub(
        &mut self,
        id: NodeId,
        name: &str,
        parent_id: Option<NodeId>,
    ) -> (&TopicNode, bool) {
        if self.nodes.contains_key(&id) {
            return (&self.nodes[&id], false);
        }
        let node = TopicNode::stub(id.clone(), name, parent_id);
        let (index, _) = self.nodes.insert_full(id, node);
        (&self.nodes[index], true)
    }

    /// Add the edge `source -> target` if both ends exist and it is new.
    pub fn add_edge(&mut self, source_id: &NodeId, target_id: &NodeId) -> EdgeInsert {
        if !self.nodes.contains_key(source_id) || !self.nodes.contains_key(target_id) {
            return EdgeInsert::MissingEndpoint;
        }
        if !self.edge_index.insert((source_id.clone(), target_id.clone())) {
            return EdgeInsert::Duplicate;
        }
        self.edges.push(Edge::new(source_id.clone(), target_id.clone()));
        EdgeInsert::Added
    }

    /// Reset a node for a new content session: status `pending`, empty
    /// content, no category.
    pub fn begin_content(&mut self, id: &NodeId) -> Result<&TopicNode, StoreError> {
        let node = self.node_mut(id)?;
        node.status = NodeStatus::Pending;
        node.content.clear();
        node.category = None;
        node.refresh_hints();
        Ok(node)
    }

    /// Append streamed text. The first chunk moves the node to `streaming`.
    ///
    /// Returns the new content length.
    pub fn append_chunk(&mut self, id: &NodeId, text: &str) -> Result<usize, StoreError> {
        let node = self.writable(id, "append to")?;
        if node.status == NodeStatus::Pending {
            node.status = NodeStatus::Streaming;
            node.refresh_hints();
        }
        node.content.push_str(text);
        Ok(node.content.len())
    }

    /// Mark a node complete, optionally replacing the accumulated content.
    pub fn finalize(
        &mut self,
        id: &NodeId,
        category: Option<String>,
        content_override: Option<String>,
    ) -> Result<&TopicNode, StoreError> {
        let node = self.writable(id, "finalize")?;
        if let Some(content) = content_override {
            node.content = content;
        }
        node.category = category.filter(|c| !c.trim().is_empty());
        node.status = NodeStatus::Complete;
        node.refresh_hints();
        Ok(node)
    }

    /// Mark a node failed and replace its content with a fallback text.
    pub fn mark_failed(&mut self, id: &NodeId, fallback: String) -> Result<&TopicNode, StoreError> {
        let node = self.writable(id, "fail")?;
        node.content = fallback;
        node.status = NodeStatus::Failed;
        node.refresh_hints();
        Ok(node)
    }

    /// Get a node by id.
    pub fn get(&self, id: &NodeId) -> Option<&TopicNode> {
        self.nodes.get(id)
    }

    /// Check if a node exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Check if the ordered edge exists.
    pub fn has_edge(&self, source_id: &NodeId, target_id: &NodeId) -> bool {
        self.edge_index.contains(&(source_id.clone(), target_id.clone()))
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &TopicNode> {
        self.nodes.values()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges leaving a node.
    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| &e.source_id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut TopicNode, StoreError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))
    }

    fn writable(
        &mut self,
        id: &NodeId,
        operation: &'static str,
    ) -> Result<&mut TopicNode, StoreError> {
        let node = self.node_mut(id)?;
        if !node.status.accepts_content() {
            return Err(StoreError::InvalidState {
                id: id.clone(),
                status: node.status,
                operation,
            });
        }
        Ok(node)
    }
}
