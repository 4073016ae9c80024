use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::parse_base_url;
use crate::sse::sse_to_text_stream;

/// Models that take the output limit as `max_completion_tokens`.
const COMPLETION_TOKENS_MODEL_PREFIXES: &[&str] = &["gpt-4o", "gpt-5", "o1-", "o3-"];

/// Family order used when listing models; anything else sorts after these.
const MODEL_FAMILY_PRIORITY: &[&str] = &["gpt-4o", "gpt-4", "gpt-3.5"];

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("the API key was rejected")]
    InvalidApiKey,
    #[error("rate limit reached; wait a moment and try again")]
    RateLimited,
    #[error("API quota exhausted")]
    InsufficientQuota,
    #[error("connection failed, check your internet connection: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("API error: {0}")]
    Service(String),
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Classifies an error message carried inside an otherwise successful stream.
    pub(crate) fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("invalid_api_key") || lower.contains("incorrect api key") {
            ApiError::InvalidApiKey
        } else if lower.contains("insufficient_quota") {
            ApiError::InsufficientQuota
        } else if lower.contains("rate_limit") || lower.contains("rate limit") {
            ApiError::RateLimited
        } else {
            ApiError::Service(message.to_owned())
        }
    }

    /// Classifies a non-success HTTP response from its status and JSON error body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorBody>(body).ok().map(|b| b.error);
        let code = detail
            .as_ref()
            .and_then(|d| d.code.clone().or_else(|| d.kind.clone()))
            .unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED || code == "invalid_api_key" {
            return ApiError::InvalidApiKey;
        }
        if code == "insufficient_quota" {
            return ApiError::InsufficientQuota;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited;
        }

        let message = match detail {
            Some(detail) => detail.describe(),
            None if body.trim().is_empty() => status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_owned(),
            None => body.trim().chars().take(200).collect(),
        };
        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }

    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Connection(err.to_string())
        } else if err.is_decode() {
            ApiError::MalformedResponse(err.to_string())
        } else {
            ApiError::Connection(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}

impl ErrorDetail {
    pub(crate) fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .or_else(|| self.kind.clone())
            .unwrap_or_else(|| "unknown error".to_owned())
    }
}

/// One chat-completion request, assembled by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

fn uses_completion_tokens(model: &str) -> bool {
    COMPLETION_TOKENS_MODEL_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

fn completion_body(request: &ChatRequest) -> ChatCompletionBody<'_> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.trim().is_empty() {
        messages.push(Message {
            role: "system",
            content: &request.system_prompt,
        });
    }
    messages.push(Message {
        role: "user",
        content: &request.prompt,
    });

    let (max_tokens, max_completion_tokens) = if uses_completion_tokens(&request.model) {
        (None, Some(request.max_tokens))
    } else {
        (Some(request.max_tokens), None)
    };

    ChatCompletionBody {
        model: &request.model,
        messages,
        temperature: request.temperature,
        max_tokens,
        max_completion_tokens,
        stream: true,
    }
}

/// Keeps `gpt-*` ids and orders them by family priority, then by name.
pub fn sort_models(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut models: Vec<String> = ids.into_iter().filter(|id| id.starts_with("gpt-")).collect();
    models.sort_by(|a, b| {
        let rank = |id: &str| {
            MODEL_FAMILY_PRIORITY
                .iter()
                .position(|prefix| id.starts_with(prefix))
                .unwrap_or(MODEL_FAMILY_PRIORITY.len())
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
    models.dedup();
    models
}

/// Thin client for an OpenAI-compatible chat-completion API.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ApiError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ApiError::MissingApiKey);
        }
        parse_base_url(base_url).map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

        let http = Client::builder()
            .user_agent(concat!("ClipChat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Opens one streaming completion. The returned stream is finite and cannot be restarted;
    /// dropping it closes the connection.
    pub async fn stream_completion(&self, request: &ChatRequest) -> Result<TextStream, ApiError> {
        let url = self.endpoint("chat/completions");
        let body = completion_body(request);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ApiError::from_transport(&err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }

        Ok(Box::pin(sse_to_text_stream(response.bytes_stream())))
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| ApiError::from_transport(&err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|err| ApiError::MalformedResponse(err.to_string()))?;
        Ok(sort_models(list.data.into_iter().map(|m| m.id)))
    }
}

/// Events flowing from a request task to the UI, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Finished,
    Failed(ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Completed { chunks: usize },
    Failed,
    /// The consumer went away before the stream ended.
    Abandoned,
}

/// Runs one completion and hands every event to `emit`.
///
/// `emit` returns `false` once its consumer is gone; forwarding then stops and the response
/// stream is dropped.
pub async fn forward_completion<F>(
    client: &ChatClient,
    request: &ChatRequest,
    request_id: u64,
    mut emit: F,
) -> ForwardOutcome
where
    F: FnMut(StreamEvent) -> bool,
{
    info!(request_id, model = %request.model, "completion request started");

    let mut stream = match client.stream_completion(request).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(request_id, "completion request failed: {err}");
            if !emit(StreamEvent::Failed(err)) {
                return ForwardOutcome::Abandoned;
            }
            return ForwardOutcome::Failed;
        }
    };

    let mut chunks = 0_usize;
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => {
                chunks += 1;
                if !emit(StreamEvent::Chunk(text)) {
                    info!(request_id, chunks, "consumer gone; dropping completion stream");
                    return ForwardOutcome::Abandoned;
                }
            }
            Err(err) => {
                warn!(request_id, chunks, "completion stream failed: {err}");
                if !emit(StreamEvent::Failed(err)) {
                    return ForwardOutcome::Abandoned;
                }
                return ForwardOutcome::Failed;
            }
        }
    }

    info!(request_id, chunks, "completion finished");
    if !emit(StreamEvent::Finished) {
        return ForwardOutcome::Abandoned;
    }
    ForwardOutcome::Completed { chunks }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, system_prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: "Good morning".to_owned(),
            system_prompt: system_prompt.to_owned(),
            model: model.to_owned(),
            temperature: 0.3,
            max_tokens: 256,
        }
    }

    #[test]
    fn body_has_system_then_user_message_and_streams() {
        let req = request("gpt-3.5-turbo", "Translate.");
        let json = serde_json::to_value(completion_body(&req)).expect("serialize");

        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 256);
        assert!(json.get("max_completion_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "Translate.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Good morning");
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let req = request("gpt-3.5-turbo", "  ");
        let json = serde_json::to_value(completion_body(&req)).expect("serialize");
        let messages = json["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn newer_models_use_max_completion_tokens() {
        for model in ["gpt-4o-mini", "gpt-5", "o1-preview", "o3-mini"] {
            let req = request(model, "");
            let json = serde_json::to_value(completion_body(&req)).expect("serialize");
            assert_eq!(json["max_completion_tokens"], 256, "model {model}");
            assert!(json.get("max_tokens").is_none(), "model {model}");
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            ApiError::from_response(StatusCode::UNAUTHORIZED, ""),
            ApiError::InvalidApiKey
        );
        assert_eq!(
            ApiError::from_response(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#
            ),
            ApiError::InsufficientQuota
        );
        assert_eq!(
            ApiError::from_response(StatusCode::TOO_MANY_REQUESTS, "{}"),
            ApiError::RateLimited
        );
        assert_eq!(
            ApiError::from_response(
                StatusCode::NOT_FOUND,
                r#"{"error":{"message":"The model `nope` does not exist","type":"invalid_request_error","code":"model_not_found"}}"#
            ),
            ApiError::Status {
                status: 404,
                message: "The model `nope` does not exist".to_owned()
            }
        );
        assert_eq!(
            ApiError::from_response(StatusCode::BAD_GATEWAY, ""),
            ApiError::Status {
                status: 502,
                message: "Bad Gateway".to_owned()
            }
        );
    }

    #[test]
    fn in_stream_messages_are_classified() {
        assert_eq!(
            ApiError::from_message("Rate limit reached for requests"),
            ApiError::RateLimited
        );
        assert_eq!(
            ApiError::from_message("server overloaded"),
            ApiError::Service("server overloaded".to_owned())
        );
    }

    #[test]
    fn models_are_filtered_and_ranked() {
        let ids = [
            "whisper-1",
            "gpt-3.5-turbo",
            "gpt-4-turbo",
            "gpt-4o-mini",
            "gpt-4o",
            "gpt-image-1",
            "dall-e-3",
        ]
        .map(str::to_owned);
        assert_eq!(
            sort_models(ids),
            [
                "gpt-4o",
                "gpt-4o-mini",
                "gpt-4-turbo",
                "gpt-3.5-turbo",
                "gpt-image-1"
            ]
        );
    }

    #[test]
    fn client_requires_key_and_http_url() {
        assert_eq!(
            ChatClient::new("https://api.openai.com/v1", "  ").err(),
            Some(ApiError::MissingApiKey)
        );
        assert!(matches!(
            ChatClient::new("file:///tmp", "sk-test"),
            Err(ApiError::InvalidRequest(_))
        ));
        let client = ChatClient::new("https://api.openai.com/v1/", "sk-test").expect("client");
        assert_eq!(
            client.endpoint("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
