//! OpenAI-compatible Chat Completions provider (Ollama, llama.cpp, vLLM, OpenAI)

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    providers::{ChatProvider, FragmentStream},
    registry::CancellationRegistry,
    session::StreamSession,
    types::{Message, ModelInfo, Role},
};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";

/// Client for servers speaking the OpenAI chat completions protocol
pub struct OpenAICompatProvider {
    client: reqwest::Client,
    config: ClientConfig,
    registry: CancellationRegistry,
}

impl OpenAICompatProvider {
    /// Create a provider with its own cancellation registry
    pub fn new(config: ClientConfig) -> Self {
        Self::with_registry(config, CancellationRegistry::new())
    }

    /// Create a provider that shares an existing registry
    pub fn with_registry(config: ClientConfig, registry: CancellationRegistry) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            registry,
        }
    }

    /// Create from `PARLEY_BASE_URL` / `PARLEY_API_KEY`
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| Error::InvalidConfig("API key is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request(history: &[Message], model: &str) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: history
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAICompatProvider {
    fn stream_completion(&self, history: &[Message], model: &str) -> FragmentStream {
        let request = Self::build_request(history, model);
        let url = self.config.endpoint(COMPLETIONS_PATH);
        let headers = self.headers();
        let client = self.client.clone();
        let registry = self.registry.clone();

        Box::pin(stream! {
            // Registered before dispatch so abort_all also reaches pending requests.
            let session = StreamSession::start(&registry);

            let headers = match headers {
                Ok(headers) => headers,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            tracing::debug!(
                session = %session.key(),
                url = %url,
                model = %request.model,
                messages = request.messages.len(),
                "Sending completion request"
            );

            let send = client.post(&url).headers(headers).json(&request).send();
            let sent = tokio::select! {
                biased;
                _ = session.cancelled() => None,
                result = send => Some(result),
            };

            let response = match sent {
                None => {
                    tracing::debug!(session = %session.key(), "Request cancelled before response");
                    return;
                }
                Some(Err(e)) => {
                    yield Err(Error::Http(e));
                    return;
                }
                Some(Ok(response)) => response,
            };

            let status = response.status();
            if !status.is_success() {
                let body = tokio::select! {
                    biased;
                    _ = session.cancelled() => None,
                    body = response.text() => Some(body.unwrap_or_default()),
                };
                let Some(body) = body else {
                    tracing::debug!(session = %session.key(), "Request cancelled while reading error body");
                    return;
                };
                yield Err(Error::from_error_body(status.as_u16(), &body));
                return;
            }

            if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
                yield Err(Error::EmptyResponse);
                return;
            }

            let mut fragments = std::pin::pin!(session.fragments(response.bytes_stream()));
            while let Some(fragment) = fragments.next().await {
                yield fragment;
            }
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.config.endpoint(MODELS_PATH))
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_error_body(status.as_u16(), &body));
        }

        let list: ModelList = response.json().await?;
        Ok(list.data)
    }

    fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    /// What the fake server received
    struct Captured {
        head: String,
        body: String,
    }

    /// Serve one connection: read the request, then write `parts` one by one.
    /// With `hold`, the socket stays open until the sender fires or drops.
    async fn serve(
        parts: Vec<Vec<u8>>,
        hold: Option<oneshot::Receiver<()>>,
    ) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];

            let head_end = loop {
                let n = socket.read(&mut tmp).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let lower = l.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);

            while buf.len() < head_end + content_length {
                let n = socket.read(&mut tmp).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
            }
            let body = String::from_utf8_lossy(&buf[head_end..]).to_string();

            for part in parts {
                socket.write_all(&part).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }

            if let Some(hold) = hold {
                let _ = hold.await;
            }
            let _ = socket.shutdown().await;

            Captured { head, body }
        });

        (base_url, handle)
    }

    fn frame(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"id": "chatcmpl-1", "choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    const SSE_HEAD: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

    fn provider(base_url: &str) -> OpenAICompatProvider {
        OpenAICompatProvider::new(ClientConfig::new(base_url, "secret"))
    }

    #[test]
    fn test_build_request_keeps_only_role_and_content() {
        let history = vec![
            Message::system("Be brief."),
            Message::user("Hi").stamped(),
            Message::assistant("Hello!").stamped().with_model("llama3").mark_edited(),
        ];
        let request = OpenAICompatProvider::build_request(&history, "llama3");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn test_invalid_api_key_header() {
        let provider = OpenAICompatProvider::new(ClientConfig::new("http://localhost:1", "bad\nkey"));
        assert!(matches!(provider.headers(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_stream_completion_end_to_end() {
        let first = frame("Hello");
        let second = frame(", world");
        let (a, b) = second.split_at(17);
        let parts = vec![
            SSE_HEAD.as_bytes().to_vec(),
            first.into_bytes(),
            a.as_bytes().to_vec(),
            b.as_bytes().to_vec(),
            b"data: [DONE]\n\n".to_vec(),
        ];
        let (base_url, server) = serve(parts, None).await;
        let provider = provider(&base_url);

        let history = vec![Message::user("Say hello").stamped()];
        let out: Vec<String> = provider
            .stream_completion(&history, "llama3")
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec!["Hello", ", world"]);
        assert!(provider.registry().is_empty());

        let captured = server.await.unwrap();
        let head = captured.head.to_ascii_lowercase();
        assert!(head.starts_with("post /v1/chat/completions "), "head: {}", captured.head);
        assert!(head.contains("authorization: bearer secret"));
        assert!(head.contains("content-type: application/json"));

        let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], true);
        assert_eq!(
            body["messages"],
            serde_json::json!([{"role": "user", "content": "Say hello"}])
        );
    }

    #[tokio::test]
    async fn test_server_error_uses_error_message() {
        let payload = r#"{"error":{"message":"model \"nope\" not found","type":"invalid_request_error"}}"#;
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            payload.len(),
            payload
        );
        let (base_url, _server) = serve(vec![response.into_bytes()], None).await;
        let provider = provider(&base_url);

        let results: Vec<Result<String>> = provider
            .stream_completion(&[Message::user("hi")], "nope")
            .collect()
            .await;
        assert_eq!(results.len(), 1);
        match &results[0] {
            Err(Error::Api { status, message }) => {
                assert_eq!(*status, 404);
                assert_eq!(message, "model \"nope\" not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(provider.registry().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_without_message() {
        let response = "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 5\r\nConnection: close\r\n\r\noops!";
        let (base_url, _server) = serve(vec![response.as_bytes().to_vec()], None).await;
        let provider = provider(&base_url);

        let mut stream = provider.stream_completion(&[Message::user("hi")], "m");
        match stream.next().await {
            Some(Err(Error::Api { status: 500, message })) => assert_eq!(message, "Unknown error"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_response_body() {
        let response = "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let (base_url, _server) = serve(vec![response.as_bytes().to_vec()], None).await;
        let provider = provider(&base_url);

        let mut stream = provider.stream_completion(&[Message::user("hi")], "m");
        assert!(matches!(stream.next().await, Some(Err(Error::EmptyResponse))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let provider = provider(&base_url);

        let mut stream = provider.stream_completion(&[Message::user("hi")], "m");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_transport(), "got: {err:?}");
        assert!(stream.next().await.is_none());
        assert!(provider.registry().is_empty());
    }

    #[tokio::test]
    async fn test_abort_all_ends_stream_mid_flight() {
        let (release, hold) = oneshot::channel();
        let parts = vec![SSE_HEAD.as_bytes().to_vec(), frame("first").into_bytes()];
        let (base_url, server) = serve(parts, Some(hold)).await;
        let provider = provider(&base_url);

        let mut stream = provider.stream_completion(&[Message::user("hi")], "m");
        let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert_eq!(first.unwrap().unwrap(), "first");
        assert_eq!(provider.registry().len(), 1);

        assert_eq!(provider.registry().abort_all(), 1);
        let next = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(provider.registry().is_empty());

        let _ = release.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_abort_before_response() {
        let (release, hold) = oneshot::channel();
        // headers never arrive until released
        let (base_url, server) = serve(vec![], Some(hold)).await;
        let provider = provider(&base_url);

        let registry = provider.registry().clone();
        let stream = provider.stream_completion(&[Message::user("hi")], "m");
        let collector = tokio::spawn(async move { stream.collect::<Vec<_>>().await });

        // wait for the session to register
        for _ in 0..100 {
            if !registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(registry.abort_all(), 1);

        let results = tokio::time::timeout(Duration::from_secs(5), collector)
            .await
            .unwrap()
            .unwrap();
        assert!(results.is_empty());

        // the connection may never have been accepted
        drop(release);
        server.abort();
    }

    #[tokio::test]
    async fn test_abort_while_error_body_stalls() {
        let (release, hold) = oneshot::channel();
        // status line arrives, the promised body never completes
        let head = b"HTTP/1.1 500 Internal Server Error\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"err".to_vec();
        let (base_url, server) = serve(vec![head], Some(hold)).await;
        let provider = provider(&base_url);

        let registry = provider.registry().clone();
        let stream = provider.stream_completion(&[Message::user("hi")], "m");
        let collector = tokio::spawn(async move { stream.collect::<Vec<_>>().await });

        for _ in 0..100 {
            if !registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // give the client time to read the status line and start on the body
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(registry.abort_all(), 1);

        let results = tokio::time::timeout(Duration::from_secs(5), collector)
            .await
            .unwrap()
            .unwrap();
        assert!(results.is_empty());
        assert!(registry.is_empty());

        let _ = release.send(());
        server.abort();
    }

    #[tokio::test]
    async fn test_list_models() {
        let payload = r#"{"object":"list","data":[{"id":"llama3:8b","object":"model","created":1718000000,"owned_by":"library"},{"id":"qwen3:4b","object":"model","created":1718000001,"owned_by":"library"}]}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            payload.len(),
            payload
        );
        let (base_url, server) = serve(vec![response.into_bytes()], None).await;
        let provider = provider(&base_url);

        let models = provider.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "llama3:8b");
        assert_eq!(models[1].owned_by, "library");

        let captured = server.await.unwrap();
        assert!(captured.head.to_ascii_lowercase().starts_with("get /v1/models "));
    }
}
