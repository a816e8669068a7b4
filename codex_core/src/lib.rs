//! # Codex Core
//!
//! The engine behind the Codex topic explorer. Activating a topic streams an
//! AI-generated article for it from a content backend, and the `[[Term]]`
//! references in that article grow the graph with new topic nodes.
//!
//! ## Core Components
//!
//! - **store**: The authoritative topic graph, observed by the renderer via snapshots and events
//! - **session**: One content request per node, from request to completion or failure
//! - **orchestrator**: The entry point for user interaction; decides between focus, fetch and stub creation
//! - **backend**: The content-generation boundary (single-shot JSON or server-sent events)
//!
//! ## Design Philosophy
//!
//! - **Create once, fetch once**: a topic gets one node and at most one successful content fetch
//! - **Contained failure**: a failed request degrades one node's content and nothing else
//! - **Bounded fan-out**: a click fetches one article; its references only become stubs

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use backend::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use orchestrator::*;
pub use session::*;
pub use store::*;

pub use topic_model;
