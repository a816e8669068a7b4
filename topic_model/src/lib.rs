//! # Topic Model
//!
//! The data model of the Codex explorer - topic nodes, reference edges, topic
//! identity and the `[[Term]]` cross-reference marker grammar.
//! This crate is pure: it performs no I/O and holds no shared state.

pub mod error;
pub mod identity;
pub mod markers;
pub mod presentation;
pub mod topic;

pub use error::*;
pub use identity::*;
pub use markers::*;
pub use presentation::*;
pub use topic::*;
