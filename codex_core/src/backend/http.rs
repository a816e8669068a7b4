//! HTTP content backend.
//!
//! - Single-shot: `GET {endpoint}/expand?topic=...` returns one JSON
//!   [`Article`].
//! - Stream: `GET {endpoint}/expand/stream?topic=...` returns
//!   `text/event-stream` whose `data:` payloads are [`WireEvent`]s.
//!
//! `timeout_secs` bounds connecting and every wait for the next bytes. A
//! single-shot request must also finish within it; a stream may stay open as
//! long as the backend keeps sending chunks or keep-alives.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::VecDeque;
use std::time::Duration;

use super::{
    single_shot_stream, Article, BackendEvent, ContentBackend, EventStream, SseDecoder, SseFrame,
};
use crate::config::{BackendConfig, BackendProtocol};
use crate::error::BackendError;

/// Content backend speaking HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    config: BackendConfig,
    http: Client,
}

impl HttpBackend {
    /// Create a new HTTP backend with the given configuration.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// Fetch a complete article in one request.
    pub async fn fetch_article(&self, topic: &str) -> Result<Article, BackendError> {
        let response = self
            .http
            .get(self.url("expand"))
            .query(&[("topic", topic)])
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Open a server-sent events stream for a topic.
    pub async fn open_stream(&self, topic: &str) -> Result<EventStream, BackendError> {
        let response = self
            .http
            .get(self.url("expand/stream"))
            .query(&[("topic", topic)])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_event_stream(response))
    }
}

#[async_trait]
impl ContentBackend for HttpBackend {
    async fn open(&self, topic: &str) -> Result<EventStream, BackendError> {
        match self.config.protocol {
            BackendProtocol::SingleShot => {
                let article = self.fetch_article(topic).await?;
                Ok(single_shot_stream(article))
            }
            BackendProtocol::Stream => self.open_stream(topic).await,
        }
    }
}

struct StreamState<S> {
    bytes: S,
    decoder: SseDecoder,
    ready: VecDeque<Result<BackendEvent, BackendError>>,
    finished: bool,
}

fn decode_event_stream(response: reqwest::Response) -> EventStream {
    let state = StreamState {
        bytes: Box::pin(response.bytes_stream()),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let frames = state.decoder.push(&bytes);
                    enqueue(&mut state.ready, frames);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.ready.push_back(Err(BackendError::Http(err)));
                }
                None => {
                    state.finished = true;
                    enqueue(&mut state.ready, state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

fn enqueue(
    ready: &mut VecDeque<Result<BackendEvent, BackendError>>,
    frames: impl IntoIterator<Item = SseFrame>,
) {
    for frame in frames {
        match frame.decode() {
            Ok(Some(event)) => ready.push_back(Ok(event)),
            Ok(None) => tracing::trace!("ignoring keep-alive frame"),
            Err(err) => ready.push_back(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::ExpansionOrchestrator;
    use crate::store::GraphStore;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use topic_model::NodeStatus;

    const SSE_HEAD: &str =
        "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    /// What the loopback server does after reading the request.
    enum Reply {
        Send(String),
        Pause(u64),
    }

    fn send(text: &str) -> Reply {
        Reply::Send(text.to_string())
    }

    fn json_response(status: &str, body: &str) -> Reply {
        Reply::Send(format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    fn chunk_frame(text: &str) -> String {
        format!("data: {{\"type\":\"chunk\",\"text\":\"{text}\"}}\n\n")
    }

    fn complete_frame(content: &str) -> String {
        format!(
            "data: {{\"type\":\"complete\",\"data\":{{\"name\":\"AI\",\"category\":\"Core AI\",\"content\":\"{content}\"}}}}\n\n"
        )
    }

    /// Serve one connection on loopback and return the endpoint URL.
    async fn serve(replies: Vec<Reply>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            for reply in replies {
                match reply {
                    Reply::Send(text) => {
                        if socket.write_all(text.as_bytes()).await.is_err() {
                            return;
                        }
                        let _ = socket.flush().await;
                    }
                    Reply::Pause(millis) => {
                        tokio::time::sleep(Duration::from_millis(millis)).await;
                    }
                }
            }
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/api")
    }

    fn backend(endpoint: String, protocol: BackendProtocol, timeout_secs: u64) -> HttpBackend {
        HttpBackend::new(BackendConfig {
            endpoint,
            protocol,
            timeout_secs,
        })
        .unwrap()
    }

    async fn collect(backend: &HttpBackend) -> Vec<Result<BackendEvent, BackendError>> {
        backend.open("AI").await.unwrap().collect().await
    }

    #[test]
    fn test_url_building() {
        let backend = HttpBackend::new(BackendConfig {
            endpoint: "http://localhost:3001/api/".into(),
            ..BackendConfig::default()
        })
        .unwrap();

        assert_eq!(backend.url("expand"), "http://localhost:3001/api/expand");
        assert_eq!(backend.url("expand/stream"), "http://localhost:3001/api/expand/stream");
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails() {
        let backend = backend("http://127.0.0.1:9".into(), BackendProtocol::SingleShot, 2);

        assert!(matches!(backend.open("Rust").await, Err(BackendError::Http(_))));
    }

    #[tokio::test]
    async fn test_single_shot_article() {
        let body = r#"{"name":"AI","category":"Core AI","content":"Intro [[Robotics]]"}"#;
        let endpoint = serve(vec![json_response("200 OK", body)]).await;
        let backend = backend(endpoint, BackendProtocol::SingleShot, 5);

        let article = backend.fetch_article("AI").await.unwrap();

        assert_eq!(article, Article::new("AI", "Core AI", "Intro [[Robotics]]"));
    }

    #[tokio::test]
    async fn test_single_shot_error_status() {
        let endpoint = serve(vec![json_response("503 Service Unavailable", "overloaded")]).await;
        let backend = backend(endpoint, BackendProtocol::SingleShot, 5);

        match backend.open("AI").await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_single_shot_malformed_json() {
        let endpoint = serve(vec![json_response("200 OK", "{\"name\": \"AI\"")]).await;
        let backend = backend(endpoint, BackendProtocol::SingleShot, 5);

        assert!(matches!(
            backend.fetch_article("AI").await,
            Err(BackendError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_chunk_then_complete() {
        let endpoint = serve(vec![
            send(SSE_HEAD),
            Reply::Send(chunk_frame("Intro ")),
            send(": keep-alive\n\nevent: ping\ndata: {}\n\n"),
            Reply::Send(complete_frame("Intro [[Robotics]]")),
        ])
        .await;
        let backend = backend(endpoint, BackendProtocol::Stream, 5);

        let events = collect(&backend).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Ok(BackendEvent::Chunk(text)) if text == "Intro "));
        assert!(matches!(
            &events[1],
            Ok(BackendEvent::Complete(article)) if article.content == "Intro [[Robotics]]"
        ));
    }

    #[tokio::test]
    async fn test_stream_trailing_frame_without_blank_line() {
        let complete = complete_frame("Done");
        let endpoint = serve(vec![
            send(SSE_HEAD),
            Reply::Send(complete.trim_end().to_string()),
        ])
        .await;
        let backend = backend(endpoint, BackendProtocol::Stream, 5);

        let events = collect(&backend).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(BackendEvent::Complete(article)) if article.content == "Done"
        ));
    }

    #[tokio::test]
    async fn test_stream_cut_mid_body() {
        let endpoint = serve(vec![
            send(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 4096\r\n\r\n",
            ),
            Reply::Send(chunk_frame("Intro ")),
        ])
        .await;
        let backend = backend(endpoint, BackendProtocol::Stream, 5);

        let events = collect(&backend).await;

        assert!(matches!(&events[0], Ok(BackendEvent::Chunk(_))));
        assert!(matches!(events.last(), Some(Err(BackendError::Http(_)))));
    }

    #[tokio::test]
    async fn test_stream_outlives_timeout_with_keepalives() {
        let mut replies = vec![send(SSE_HEAD), Reply::Send(chunk_frame("Intro "))];
        for _ in 0..6 {
            replies.push(Reply::Pause(300));
            replies.push(send(": keep-alive\n\n"));
        }
        replies.push(Reply::Send(complete_frame("Intro [[Robotics]]")));
        let endpoint = serve(replies).await;
        let backend = backend(endpoint, BackendProtocol::Stream, 1);

        let orchestrator =
            ExpansionOrchestrator::new(Arc::new(GraphStore::default()), Arc::new(backend));
        let activation = orchestrator.activate_or_expand("AI", None).unwrap();
        let id = activation.node_id.clone();
        let outcome = activation.wait().await.unwrap();

        assert!(outcome.is_completed(), "unexpected outcome {outcome:?}");
        let node = orchestrator.store().node(&id).unwrap();
        assert_eq!(node.status, NodeStatus::Complete);
        assert_eq!(node.content, "Intro [[Robotics]]");
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let endpoint = serve(vec![
            send(SSE_HEAD),
            Reply::Send(chunk_frame("Intro ")),
            Reply::Pause(2500),
            Reply::Send(complete_frame("too late")),
        ])
        .await;
        let backend = backend(endpoint, BackendProtocol::Stream, 1);

        let events = collect(&backend).await;

        assert!(matches!(&events[0], Ok(BackendEvent::Chunk(_))));
        assert!(matches!(events.last(), Some(Err(BackendError::Http(_)))));
    }
}
