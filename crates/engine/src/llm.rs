//! Model-backed instruction interpretation
//!
//! [`LlmInterpreter`] sends an instruction to a hosted chat model and parses
//! the JSON actions it answers with. Any failure on that path (no API key,
//! transport errors, non-success status, an unparseable or empty reply) is
//! logged and the keyword rules of [`RuleInterpreter`] answer instead, so
//! interpretation itself never fails.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use retrace_common::Action;

use crate::config::LlmSettings;
use crate::error::LlmError;
use crate::interpreter::{Interpreter, RuleInterpreter};

const SYSTEM_PROMPT: &str = r#"You translate natural-language browser test instructions into browser actions.
Answer with a JSON object {"actions": [...]} where every action has this shape:
{
  "type": "navigate|click|type|select|wait|scroll|screenshot|assert_text|assert_element|extract",
  "selector": "CSS selector or XPath, for actions that target an element",
  "value": "URL to open, text to type, option to select, wait mode or screenshot name",
  "text": "expected text for assert_text",
  "timeout": 30000
}

Examples:
- "go to https://example.com" -> {"actions": [{"type": "navigate", "value": "https://example.com"}]}
- "click the login button" -> {"actions": [{"type": "click", "selector": "button[data-testid='login']"}]}
- "type 'admin' in username field" -> {"actions": [{"type": "type", "selector": "input[name='username']", "value": "admin"}]}

Be deterministic and prefer data-testid selectors."#;

const TEMPERATURE: f64 = 0.1;
const ANTHROPIC_MAX_TOKENS: u32 = 2000;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Hosted model vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4-turbo-preview",
            LlmProvider::Anthropic => "claude-3-opus-20240229",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(format!(
                "unknown model provider: {} (expected openai or anthropic)",
                other
            )),
        }
    }
}

/// One request/response exchange with a chat model
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Raw text of the model's answer
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Chat completion over the vendor's HTTP API
#[derive(Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    provider: LlmProvider,
    api_key: String,
    model: String,
    base_url: String,
}

impl HttpCompletionClient {
    pub fn new(settings: &LlmSettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let provider = settings.provider;
        Ok(Self {
            http,
            provider,
            api_key: api_key.into(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Client for the configured provider, or `None` when its key is unset
    pub fn from_env(settings: &LlmSettings) -> Result<Option<Self>, LlmError> {
        match std::env::var(settings.provider.api_key_var()) {
            Ok(key) if !key.trim().is_empty() => Self::new(settings, key.trim()).map(Some),
            _ => Ok(None),
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, system: &str, user: &str) -> reqwest::RequestBuilder {
        match self.provider {
            LlmProvider::OpenAi => self
                .http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "temperature": TEMPERATURE,
                    "response_format": {"type": "json_object"},
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user},
                    ],
                })),
            LlmProvider::Anthropic => self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": ANTHROPIC_MAX_TOKENS,
                    "temperature": TEMPERATURE,
                    "system": system,
                    "messages": [{"role": "user", "content": user}],
                })),
        }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        debug!("Requesting interpretation from {} ({})", self.provider, self.model);
        let resp = self.request(system, user).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        reply_text(self.provider, &body)
    }
}

/// Pull the model's text out of a vendor response body
pub fn reply_text(provider: LlmProvider, body: &Value) -> Result<String, LlmError> {
    let text = match provider {
        LlmProvider::OpenAi => body.pointer("/choices/0/message/content"),
        LlmProvider::Anthropic => body.pointer("/content/0/text"),
    };
    text.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::MalformedReply(format!("no {} message text in response", provider)))
}

/// Parse `{"actions": [...]}` or a bare action array, tolerating code fences
pub fn parse_actions(reply: &str) -> Result<Vec<Action>, LlmError> {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(unfenced.trim())
        .map_err(|e| LlmError::MalformedReply(e.to_string()))?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("actions")
            .ok_or_else(|| LlmError::MalformedReply("missing \"actions\"".to_string()))?,
        _ => {
            return Err(LlmError::MalformedReply(
                "expected an object or an array".to_string(),
            ))
        }
    };

    serde_json::from_value(list).map_err(|e| LlmError::MalformedReply(e.to_string()))
}

/// Model first, keyword rules when the model cannot answer
pub struct LlmInterpreter<C = HttpCompletionClient> {
    client: Option<C>,
    fallback: RuleInterpreter,
}

impl<C: CompletionClient> LlmInterpreter<C> {
    pub fn new(client: Option<C>, fallback: RuleInterpreter) -> Self {
        Self { client, fallback }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    async fn ask(
        &self,
        client: &C,
        instruction: &str,
        context: Option<&Value>,
    ) -> Result<Vec<Action>, LlmError> {
        let mut user = format!("Instruction: {}", instruction);
        if let Some(context) = context {
            let pretty = serde_json::to_string_pretty(context)
                .map_err(|e| LlmError::MalformedReply(e.to_string()))?;
            user.push_str(&format!("\n\nContext: {}", pretty));
        }

        let reply = client.complete(SYSTEM_PROMPT, &user).await?;
        let actions = parse_actions(&reply)?;
        if actions.is_empty() {
            return Err(LlmError::MalformedReply("no actions".to_string()));
        }
        Ok(actions
            .into_iter()
            .map(|action| action.with_metadata("interpreter", "llm"))
            .collect())
    }
}

#[async_trait]
impl<C: CompletionClient> Interpreter for LlmInterpreter<C> {
    async fn interpret(&self, instruction: &str, context: Option<&Value>) -> Vec<Action> {
        let Some(client) = &self.client else {
            return self.fallback.translate(instruction);
        };

        match self.ask(client, instruction, context).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!("Model interpretation failed: {}. Falling back to rules", e);
                self.fallback.translate(instruction)
            }
        }
    }
}
