//! Scripted backend - an in-process stand-in for the generation service.
//!
//! Used by tests. Topics are matched by
//! their normalized identity. A `manual` topic hands each opened request to
//! the caller as a [`Feed`], so event timing can be driven step by step.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Notify;

use super::{single_shot_stream, Article, BackendEvent, ContentBackend, EventStream};
use crate::error::BackendError;
use topic_model::{normalize, NodeId};

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Event(BackendEvent),
    /// The connection breaks with this message.
    TransportError(String),
}

/// What the backend does when a topic is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Answer with a single-shot article.
    Article(Article),
    /// Replay these steps as a stream.
    Steps(Vec<ScriptStep>),
    /// Refuse to open the request with this HTTP status.
    Refuse(u16),
    /// Hand the request to the caller via [`ScriptedBackend::next_feed`].
    Manual,
}

/// Sender side of a manually driven request.
#[derive(Debug, Clone)]
pub struct Feed {
    sender: mpsc::UnboundedSender<Result<BackendEvent, BackendError>>,
}

impl Feed {
    /// Send a chunk; returns `false` once the session stopped listening.
    pub fn chunk(&self, text: &str) -> bool {
        self.send(Ok(BackendEvent::Chunk(text.to_string())))
    }

    pub fn complete(&self, article: Article) -> bool {
        self.send(Ok(BackendEvent::Complete(article)))
    }

    pub fn error(&self, message: &str) -> bool {
        self.send(Ok(BackendEvent::Error(message.to_string())))
    }

    pub fn break_connection(&self) -> bool {
        self.send(Err(BackendError::Remote("connection reset".into())))
    }

    /// End the stream without a completion event.
    pub fn close(&self) {
        self.sender.close_channel();
    }

    fn send(&self, item: Result<BackendEvent, BackendError>) -> bool {
        self.sender.unbounded_send(item).is_ok()
    }
}

/// In-process content backend driven by scripts.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<NodeId, Script>>,
    opened: Mutex<HashMap<NodeId, usize>>,
    feeds: Mutex<HashMap<NodeId, VecDeque<Feed>>>,
    feed_ready: Notify,
}

impl ScriptedBackend {
    /// Create a backend with no scripts; every topic is refused with 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script for a topic.
    pub fn script(&self, topic: &str, script: Script) -> &Self {
        self.scripts.lock().insert(normalize(topic), script);
        self
    }

    /// Answer `topic` with a single-shot article.
    pub fn with_article(self, topic: &str, category: &str, content: &str) -> Self {
        self.script(topic, Script::Article(Article::new(topic, category, content)));
        self
    }

    /// Answer `topic` with a stream of chunks and a completion carrying
    /// their concatenation.
    pub fn with_chunks(self, topic: &str, category: &str, chunks: &[&str]) -> Self {
        let mut steps: Vec<_> = chunks
            .iter()
            .map(|c| ScriptStep::Event(BackendEvent::Chunk(c.to_string())))
            .collect();
        steps.push(ScriptStep::Event(BackendEvent::Complete(Article::new(
            topic,
            category,
            chunks.concat(),
        ))));
        self.script(topic, Script::Steps(steps));
        self
    }

    /// Answer `topic` with a backend-reported error.
    pub fn with_error(self, topic: &str, message: &str) -> Self {
        self.script(
            topic,
            Script::Steps(vec![ScriptStep::Event(BackendEvent::Error(message.to_string()))]),
        );
        self
    }

    /// Drive `topic` by hand.
    pub fn with_manual(self, topic: &str) -> Self {
        self.script(topic, Script::Manual);
        self
    }

    /// How many requests have been opened for a topic.
    pub fn open_count(&self, topic: &str) -> usize {
        self.opened.lock().get(&normalize(topic)).copied().unwrap_or(0)
    }

    /// How many requests have been opened in total.
    pub fn total_opens(&self) -> usize {
        self.opened.lock().values().sum()
    }

    /// Wait for the next request opened for a manual topic.
    pub async fn next_feed(&self, topic: &str) -> Feed {
        let key = normalize(topic);
        loop {
            let ready = self.feed_ready.notified();
            let feed = self.feeds.lock().get_mut(&key).and_then(VecDeque::pop_front);
            if let Some(feed) = feed {
                return feed;
            }
            ready.await;
        }
    }
}

#[async_trait]
impl ContentBackend for ScriptedBackend {
    async fn open(&self, topic: &str) -> Result<EventStream, BackendError> {
        let key = normalize(topic);
        *self.opened.lock().entry(key.clone()).or_default() += 1;

        let script = self.scripts.lock().get(&key).cloned();
        match script {
            Some(Script::Article(article)) => Ok(single_shot_stream(article)),
            Some(Script::Steps(steps)) => {
                let items = steps.into_iter().map(|step| match step {
                    ScriptStep::Event(event) => Ok(event),
                    ScriptStep::TransportError(message) => Err(BackendError::Remote(message)),
                });
                Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
            }
            Some(Script::Refuse(status)) => Err(BackendError::Status {
                status,
                body: format!("refused: {topic}"),
            }),
            Some(Script::Manual) => {
                let (sender, receiver) = mpsc::unbounded();
                self.feeds
                    .lock()
                    .entry(key)
                    .or_default()
                    .push_back(Feed { sender });
                self.feed_ready.notify_waiters();
                Ok(receiver.boxed())
            }
            None => Err(BackendError::Status {
                status: 404,
                body: format!("no script for {topic}"),
            }),
        }
    }
}
