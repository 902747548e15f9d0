use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::CompletionConfig;

/// Name of the single function the completion service is asked to call.
pub const CREATE_EVENT_FUNCTION: &str = "createEvent";

const SYSTEM_PROMPT: &str = "You turn natural-language requests into calendar events. \
Always answer by calling the createEvent function. Resolve relative dates against the \
current date given in the request and return absolute ISO 8601 date-times.";

/// A structured function call returned by the completion service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text of the arguments, as produced by the model.
    pub arguments: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Transport, auth or rate-limit failure, or any non-2xx answer.
    #[error("Completion service unavailable: {0}")]
    Unavailable(String),

    /// The service answered 2xx but the body is not a completion response.
    #[error("Invalid completion response: {0}")]
    InvalidEnvelope(String),
}

/// Opaque capability: given context text, return a structured event proposal
/// or nothing. Exactly one upstream request is made per call.
#[async_trait]
pub trait CompletionService: Send + Sync + 'static {
    async fn propose_event(&self, context: &str) -> Result<Option<FunctionCall>, CompletionError>;
}

// ============================================================================
// Wire types (OpenAI-compatible chat completions)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: Value,
    tool_choice: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    tool_calls: Option<Vec<ToolCall>>,
    // Older gateways still answer with the legacy single function call.
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

/// JSON schema of `createEvent(title, start, end, description?)`.
pub fn create_event_tool() -> Value {
    json!([{
        "type": "function",
        "function": {
            "name": CREATE_EVENT_FUNCTION,
            "description": "Create a calendar event from the user's request",
            "parameters": {
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Short title of the event"
                    },
                    "start": {
                        "type": "string",
                        "format": "date-time",
                        "description": "Start of the event, ISO 8601"
                    },
                    "end": {
                        "type": "string",
                        "format": "date-time",
                        "description": "End of the event, ISO 8601"
                    },
                    "description": {
                        "type": "string",
                        "description": "Optional longer description"
                    }
                },
                "required": ["title", "start", "end"]
            }
        }
    }])
}

fn extract_function_call(response: ChatCompletionResponse) -> Option<FunctionCall> {
    let message = response.choices.into_iter().next()?.message;
    message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| call.function)
        .chain(message.function_call)
        .find(|call| call.name == CREATE_EVENT_FUNCTION)
}

// ============================================================================
// OpenAI implementation
// ============================================================================

#[derive(Clone)]
pub struct OpenAiCompletionService {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompletionService {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                CompletionError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn propose_event(&self, context: &str) -> Result<Option<FunctionCall>, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            tools: create_event_tool(),
            tool_choice: json!({
                "type": "function",
                "function": { "name": CREATE_EVENT_FUNCTION }
            }),
            temperature: self.temperature,
        };

        tracing::debug!("Requesting event proposal from {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CompletionError::Unavailable(format!("Failed to reach completion service: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            CompletionError::Unavailable(format!("Failed to read completion response: {}", e))
        })?;

        if !status.is_success() {
            return Err(CompletionError::Unavailable(format!(
                "Completion API error ({}): {}",
                status, text
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::InvalidEnvelope(e.to_string()))?;

        Ok(extract_function_call(parsed))
    }
}
