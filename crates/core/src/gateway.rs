//! OpenRouter chat-completions client.
//!
//! A request is built in two steps: [`LlmClient::prepare`] checks the
//! preconditions and snapshots everything the call needs, then
//! [`LlmClient::execute`] performs the single HTTP attempt. The split lets
//! the host reject bad submissions synchronously and run only the network
//! part in the background.

use crate::config::Configuration;
use crate::content::CapturedContent;
use crate::error::{AppError, GatewayError, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const APP_TITLE: &str = "Paste Helper";

/// Outcome of one request.
pub type ApiResult = std::result::Result<ApiAnswer, GatewayError>;

/// Text returned to the popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiAnswer {
    pub text: String,
    /// The body lacked `choices[0].message.content`; `text` is the raw body.
    pub degraded: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub provider: ProviderPreference,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProviderPreference {
    pub order: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

/// Either a plain string or a list of typed parts.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// A validated request, detached from the captured-content slot.
#[derive(Clone)]
pub struct PreparedRequest {
    api_key: String,
    pub body: ChatRequest,
}

impl fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("api_key", &"<redacted>")
            .field("body", &self.body)
            .finish()
    }
}

/// Builds the message list: one content message, then the prompt if any.
pub fn build_messages(
    input_text: Option<&str>,
    input_image: Option<&str>,
    prompt_text: &str,
) -> Vec<ChatMessage> {
    let mut parts = Vec::new();
    if let Some(text) = input_text {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
    if let Some(url) = input_image {
        parts.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
            },
        });
    }

    let mut messages = vec![ChatMessage {
        role: "user",
        content: MessageContent::Parts(parts),
    }];
    if !prompt_text.is_empty() {
        messages.push(ChatMessage {
            role: "user",
            content: MessageContent::Text(prompt_text.to_string()),
        });
    }
    messages
}

/// Maps a 2xx body to an answer.
///
/// A body without the expected shape is returned verbatim as a degraded
/// answer; only a body that is not JSON at all is a [`GatewayError::Parse`].
pub fn parse_answer(body: &str) -> ApiResult {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))?;

    match value
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
    {
        Some(text) => Ok(ApiAnswer {
            text: text.to_string(),
            degraded: false,
        }),
        None => {
            warn!("Response lacks choices[0].message.content, showing raw body");
            Ok(ApiAnswer {
                text: body.to_string(),
                degraded: true,
            })
        }
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(err.to_string())
    }
}

/// HTTP client for the chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks preconditions and builds the request body.
    ///
    /// # Errors
    /// [`GatewayError::ConfigMissing`] without an API key, then
    /// [`GatewayError::NoContent`] when there is neither text nor image.
    pub fn prepare(
        &self,
        config: &Configuration,
        input_text: Option<&str>,
        input_image: Option<&CapturedContent>,
        prompt_text: &str,
    ) -> std::result::Result<PreparedRequest, GatewayError> {
        if !config.has_api_key() {
            return Err(GatewayError::ConfigMissing);
        }

        let input_text = input_text.filter(|t| !t.is_empty());
        let image_url = input_image.and_then(CapturedContent::as_data_url);
        if input_text.is_none() && image_url.is_none() {
            return Err(GatewayError::NoContent);
        }

        let body = ChatRequest {
            model: config.model.clone(),
            messages: build_messages(input_text, image_url, prompt_text),
            provider: ProviderPreference {
                order: config.provider_order.clone(),
            },
        };
        debug!(
            "Prepared request: model={}, text={:?} bytes, image={}, prompt={} bytes",
            body.model,
            input_text.map(str::len),
            image_url.is_some(),
            prompt_text.len()
        );

        Ok(PreparedRequest {
            api_key: config.api_key.trim().to_string(),
            body,
        })
    }

    /// Performs the single HTTP attempt.
    pub async fn execute(&self, request: PreparedRequest) -> ApiResult {
        info!("Calling {} ({})", self.endpoint, request.body.model);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .header("X-Title", APP_TITLE)
            .timeout(self.timeout)
            .json(&request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        info!("API response status: {}", status);

        if !status.is_success() {
            warn!("API request failed with {}: {}", status, body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_answer(&body)
    }

    /// Prepares and executes in one go.
    pub async fn send(
        &self,
        config: &Configuration,
        input_text: Option<&str>,
        input_image: Option<&CapturedContent>,
        prompt_text: &str,
    ) -> ApiResult {
        let request = self.prepare(config, input_text, input_image, prompt_text)?;
        self.execute(request).await
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal one-shot HTTP responder for exercising the client.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use std::time::Duration;

    pub fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = find(&buf, b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves one canned response; the handle yields the raw request.
    pub async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{}/api/v1/chat/completions", addr), handle)
    }

    /// Accepts and reads, then never answers.
    pub async fn serve_silent() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = read_request(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });
        format!("http://{}/api/v1/chat/completions", addr)
    }

    /// An address nothing listens on.
    pub async fn closed_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api/v1/chat/completions", addr)
    }
}
