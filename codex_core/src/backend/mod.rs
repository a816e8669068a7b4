//! Content backend - the boundary with the article generation service.
//!
//! A backend turns a topic into a stream of [`BackendEvent`]s. Streaming
//! backends emit chunks followed by a completion; single-shot backends are
//! adapted into a degenerate stream of one chunk and one completion, so a
//! session consumes both the same way.

mod http;
mod scripted;
mod sse;

pub use http::*;
pub use scripted::*;
pub use sse::*;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A generated article as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub name: String,
    pub category: String,
    /// Full article text with `[[Term]]` markers.
    pub content: String,
}

impl Article {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            content: content.into(),
        }
    }
}

/// One semantic event of a content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Append text to the article.
    Chunk(String),
    /// The article is complete; its content is authoritative.
    Complete(Article),
    /// The backend gave up on the topic.
    Error(String),
}

/// Events as they appear on the wire, one JSON object per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    Chunk { text: String },
    Complete { data: Article },
    Error { message: String },
    /// Keep-alives and any other event type carry no content.
    #[serde(other)]
    Ignored,
}

impl WireEvent {
    /// Convert into a semantic event; `None` for keep-alives.
    pub fn into_event(self) -> Option<BackendEvent> {
        match self {
            WireEvent::Chunk { text } => Some(BackendEvent::Chunk(text)),
            WireEvent::Complete { data } => Some(BackendEvent::Complete(data)),
            WireEvent::Error { message } => Some(BackendEvent::Error(message)),
            WireEvent::Ignored => None,
        }
    }
}

/// Stream of events for one content request. Dropping it closes the
/// underlying connection.
pub type EventStream = BoxStream<'static, Result<BackendEvent, BackendError>>;

/// Adapt a single-shot article into a one-chunk event stream.
pub fn single_shot_stream(article: Article) -> EventStream {
    let chunk = BackendEvent::Chunk(article.content.clone());
    stream::iter([Ok(chunk), Ok(BackendEvent::Complete(article))]).boxed()
}

/// A source of generated topic articles.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Open a content request for `topic`.
    ///
    /// Errors here mean the request could not be started at all; errors
    /// after that arrive as stream items.
    async fn open(&self, topic: &str) -> Result<EventStream, BackendError>;
}
