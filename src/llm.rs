//! Model Client Adapter
//!
//! Turns conversation history plus tool declarations into the model's next
//! message. The wire transport sits behind `ModelTransport`; `LlmClient`
//! layers the preflight check and the retry policy on top.

use crate::agent::contracts::{ModelMessage, ToolCall, Turn};
use crate::config::AgentConfig;
use crate::error::{AstroError, Result};
use crate::execution_loop::{ErrorClassifier, RetryLoop, TransportError, TransportErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_VERTEX_LOCATION: &str = "us-central1";
const GENERATIVE_LANGUAGE_URL: &str = "https://generativelanguage.googleapis.com";

/// Function declaration sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Everything one model call needs.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub model: &'a str,
    pub system_prompt: Option<&'a str>,
    pub turns: &'a [Turn],
    pub tools: &'a [FunctionDefinition],
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// Wire transport toward a hosted model.
///
/// Implementations classify their own failures; the retry policy only looks
/// at `TransportError::kind`.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    async fn generate(&self, request: ModelRequest<'_>) -> std::result::Result<ModelMessage, TransportError>;
}

/// Which Gemini endpoint to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    GenerativeLanguage,
    Vertex { project: String, location: String },
}

impl Backend {
    /// Vertex when a project is given, the public endpoint otherwise.
    pub fn from_routing(project: Option<String>, location: Option<String>) -> Self {
        match project.filter(|p| !p.trim().is_empty()) {
            Some(project) => Backend::Vertex {
                project,
                location: location
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_VERTEX_LOCATION.to_string()),
            },
            None => Backend::GenerativeLanguage,
        }
    }

    pub fn endpoint(&self, model: &str) -> String {
        match self {
            Backend::GenerativeLanguage => format!(
                "{}/v1beta/models/{}:generateContent",
                GENERATIVE_LANGUAGE_URL, model
            ),
            Backend::Vertex { project, location } => format!(
                "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
                loc = location,
                project = project,
                model = model
            ),
        }
    }
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiTransport {
    client: reqwest::Client,
    api_key: String,
    backend: Backend,
    classifier: ErrorClassifier,
}

impl GeminiTransport {
    pub fn new(api_key: impl Into<String>, backend: Backend) -> Self {
        if let Backend::Vertex { project, location } = &backend {
            info!(
                "Using Vertex AI backend (project={}, location={})",
                project, location
            );
        }
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            backend,
            classifier: ErrorClassifier::new(),
        }
    }

    fn classify_reqwest(&self, err: &reqwest::Error) -> TransportError {
        let message = format!("Model API call failed: {}", err);
        if err.is_timeout() || err.is_connect() {
            return TransportError::transient(message);
        }
        let status = err.status().map(|s| s.as_u16());
        TransportError::new(self.classifier.classify(status, &message), message)
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    async fn generate(&self, request: ModelRequest<'_>) -> std::result::Result<ModelMessage, TransportError> {
        let url = self.backend.endpoint(request.model);
        let body = build_request_body(&request);
        debug!("POST {} ({} turns)", url, request.turns.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.classify_reqwest(&e))?;

        if !status.is_success() {
            let message = format!("Model API error ({}): {}", status, error_message(&text));
            let kind = self.classifier.classify(Some(status.as_u16()), &message);
            return Err(TransportError::new(kind, message));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| TransportError::fatal(format!("Failed to parse model response: {}", e)))?;
        parse_response(&json)
    }
}

/// Pull `error.message` and `error.status` out of an error body, if present.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let error = &json["error"];
            match (error["status"].as_str(), error["message"].as_str()) {
                (Some(status), Some(message)) => format!("{} {}", status, message),
                (None, Some(message)) => message.to_string(),
                _ => body.to_string(),
            }
        }
        Err(_) => body.to_string(),
    }
}

/// `None` for a turn with nothing to send; the API rejects empty `parts`.
fn turn_to_content(turn: &Turn) -> Option<Value> {
    let (role, parts) = match turn {
        Turn::User { text } => ("user", vec![json!({"text": text})]),
        Turn::Model(message) => {
            let mut parts: Vec<Value> = message
                .text_parts
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| json!({"text": t}))
                .collect();
            parts.extend(message.tool_calls.iter().map(|c| {
                json!({"functionCall": {"name": c.name, "args": c.args}})
            }));
            ("model", parts)
        }
        Turn::ToolResults { results } => {
            let parts: Vec<Value> = results
                .iter()
                .map(|r| {
                    json!({
                        "functionResponse": {
                            "name": r.name,
                            "response": {"result": r.response},
                        }
                    })
                })
                .collect();
            ("user", parts)
        }
    };

    if parts.is_empty() {
        return None;
    }
    Some(json!({"role": role, "parts": parts}))
}

/// Build the `generateContent` request body.
pub fn build_request_body(request: &ModelRequest<'_>) -> Value {
    let contents: Vec<Value> = request.turns.iter().filter_map(turn_to_content).collect();
    let mut body = json!({ "contents": contents });

    if !request.tools.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": request.tools }]);
    }

    if let Some(system) = request.system_prompt {
        body["systemInstruction"] = json!({ "parts": [{"text": system}] });
    }

    let mut generation = serde_json::Map::new();
    if let Some(t) = request.temperature {
        generation.insert("temperature".to_string(), json!(t));
    }
    if let Some(n) = request.max_output_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(n));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    body
}

/// Parse the first candidate of a `generateContent` response.
///
/// A candidate with no content (e.g. blocked by a safety filter) yields an
/// empty message rather than an error.
pub fn parse_response(json: &Value) -> std::result::Result<ModelMessage, TransportError> {
    if let Some(error) = json.get("error") {
        return Err(TransportError::from_message(format!("Model API error: {}", error)));
    }

    let candidate = match json.get("candidates").and_then(Value::as_array) {
        Some(candidates) if !candidates.is_empty() => &candidates[0],
        _ => {
            warn!("Model response carried no candidates");
            return Ok(ModelMessage::default());
        }
    };

    let mut message = ModelMessage::default();
    let parts = candidate["content"]["parts"].as_array().cloned().unwrap_or_default();

    for part in parts {
        if let Some(call) = part.get("functionCall") {
            let name = call["name"]
                .as_str()
                .ok_or_else(|| TransportError::fatal("functionCall without a name"))?;
            let args = match call.get("args") {
                Some(Value::Null) | None => json!({}),
                Some(args) => args.clone(),
            };
            message.tool_calls.push(ToolCall::new(name, args));
        } else if let Some(text) = part.get("text").and_then(Value::as_str) {
            message.text_parts.push(text.to_string());
        }
    }

    Ok(message)
}

/// Model client with preflight and retry
pub struct LlmClient {
    transport: Box<dyn ModelTransport>,
    model: String,
    temperature: f32,
    retry: RetryLoop,
}

impl LlmClient {
    pub fn new(transport: Box<dyn ModelTransport>, model: impl Into<String>, config: &AgentConfig) -> Self {
        Self {
            transport,
            model: model.into(),
            temperature: config.temperature,
            retry: RetryLoop::new(config.max_retries, config.backoff_base),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-token liveness call. Auth failures here get the setup walkthrough.
    pub async fn preflight(&self) -> Result<()> {
        let turns = [Turn::User {
            text: "ping".to_string(),
        }];
        let request = ModelRequest {
            model: &self.model,
            system_prompt: None,
            turns: &turns,
            tools: &[],
            temperature: None,
            max_output_tokens: Some(1),
        };

        match self.transport.generate(request).await {
            Ok(_) => {
                debug!("Preflight succeeded for model {}", self.model);
                Ok(())
            }
            Err(e) if e.kind == TransportErrorKind::Authentication => {
                Err(AstroError::PreflightAuthentication(e.message))
            }
            Err(e) => Err(AstroError::Model(e.message)),
        }
    }

    /// Produce the next model message for `turns`, retrying transient failures.
    pub async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[FunctionDefinition],
    ) -> Result<ModelMessage> {
        self.retry
            .run(|_| {
                let request = ModelRequest {
                    model: &self.model,
                    system_prompt: Some(system_prompt),
                    turns,
                    tools,
                    temperature: Some(self.temperature),
                    max_output_tokens: None,
                };
                self.transport.generate(request)
            })
            .await
    }
}
