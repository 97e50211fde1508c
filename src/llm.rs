// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTE LLM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Trait e implementações para a chamada de chat completion.
// A chave é escolhida por request (pool), por isso entra como argumento.
// Uma única chamada: sem retry, sem backoff.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::LlmConfig;
use crate::prompts::PromptPair;

/// Erros do cliente LLM
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Resposta HTTP não-2xx; `body` é o corpo de erro do provedor
    #[error("OpenAI API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Trait principal para clientes de completion
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Envia o prompt com a chave informada e devolve o conteúdo da
    /// primeira choice (vazio se ausente).
    async fn complete(&self, api_key: &str, prompt: &PromptPair) -> Result<String, LlmError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO OPENAI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Cliente para OpenAI Chat Completions (ou API compatível)
pub struct OpenAiClient {
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, api_key: &str, prompt: &PromptPair) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO MOCK PARA TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cliente mock: resposta fixa e registro das chamadas
#[derive(Debug)]
pub struct MockLlmClient {
    reply: Result<String, (u16, String)>,
    calls: AtomicUsize,
    last_key: Mutex<Option<String>>,
}

impl MockLlmClient {
    /// Sempre responde com `content`.
    pub fn replying(content: &str) -> Self {
        Self {
            reply: Ok(content.to_string()),
            calls: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        }
    }

    /// Sempre responde com erro HTTP `status`.
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            reply: Err((status, body.to_string())),
            calls: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Chave usada na última chamada
    pub fn last_key(&self) -> Option<String> {
        self.last_key.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, api_key: &str, _prompt: &PromptPair) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock().unwrap_or_else(|e| e.into_inner()) = Some(api_key.to_string());

        match &self.reply {
            Ok(content) => Ok(content.clone()),
            Err((status, body)) => Err(LlmError::ApiError {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
