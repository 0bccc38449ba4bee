use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EvalError;

/// Judge API family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

impl FromStr for Provider {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(EvalError::construction(format!("unsupported provider: {}", other))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1000
}

/// Everything needed to reach a judge model. Credentials are resolved by the
/// caller and handed in here.
#[derive(Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl JudgeConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: default_timeout_secs(),
            base_url: None,
            max_tokens: default_max_tokens(),
        }
    }

    /// Like [`JudgeConfig::new`] but takes the provider by identifier.
    pub fn for_provider(
        provider: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EvalError> {
        Ok(Self::new(provider.parse()?, api_key, model))
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

impl fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge request timed out after {0:?}")]
    Timeout(Duration),
    #[error("judge request failed: {0}")]
    Http(String),
    #[error("judge returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("judge returned no content")]
    EmptyResponse,
    #[error("could not decode judge response: {0}")]
    Decode(String),
}

/// Sends one grading prompt to a judge model and returns its raw reply.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// `provider:model`, recorded in result metadata.
    fn model_id(&self) -> String;

    async fn complete(&self, prompt: &str) -> Result<String, JudgeError>;
}

/// [`JudgeClient`] over the providers' HTTP APIs, always at temperature 0.
pub struct HttpJudgeClient {
    http: Client,
    config: JudgeConfig,
    base_url: String,
}

impl HttpJudgeClient {
    pub fn new(config: JudgeConfig) -> Result<Self, EvalError> {
        if config.api_key.trim().is_empty() {
            return Err(EvalError::construction(format!(
                "no API key configured for {} judge",
                config.provider
            )));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::construction(format!("failed to build HTTP client: {}", e)))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { http, config, base_url })
    }

    fn map_send_error(&self, e: reqwest::Error) -> JudgeError {
        if e.is_timeout() {
            JudgeError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else {
            JudgeError::Http(e.to_string())
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<R, JudgeError> {
        let resp = request
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(JudgeError::Status { status: status.as_u16(), body });
        }
        resp.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                JudgeError::Timeout(Duration::from_secs(self.config.timeout_secs))
            } else {
                JudgeError::Decode(e.to_string())
            }
        })
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, JudgeError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
        };
        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key);
        let resp: ChatResponse = self.post(request, &body).await?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(JudgeError::EmptyResponse)
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String, JudgeError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };
        let request = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01");
        let resp: MessagesResponse = self.post(request, &body).await?;
        resp.content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(JudgeError::EmptyResponse)
    }
}

#[async_trait]
impl JudgeClient for HttpJudgeClient {
    fn model_id(&self) -> String {
        format!("{}:{}", self.config.provider, self.config.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String, JudgeError> {
        tracing::debug!(provider = %self.config.provider, model = %self.config.model, "calling judge");
        match self.config.provider {
            Provider::OpenAi => self.complete_openai(prompt).await,
            Provider::Anthropic => self.complete_anthropic(prompt).await,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}
