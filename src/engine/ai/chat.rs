//! OpenAI-compatible chat completions client (Groq, OpenAI, Ollama, ...).

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{build_http_client, ProviderCall};
use crate::engine::error::EngineError;
use crate::engine::provider::ProviderId;

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Sends single-message chat completions.
pub struct ChatCompletionClient {
    client: Client,
}

impl ChatCompletionClient {
    /// Client with the standard request timeout.
    pub fn new() -> Result<Self> {
        Ok(Self::from_client(build_http_client()?))
    }

    /// Wraps an existing HTTP client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Posts `call` to `<base_url>/chat/completions` and returns the first
    /// choice's content.
    pub async fn complete(
        &self,
        provider: ProviderId,
        base_url: &str,
        credential: Option<&str>,
        call: &ProviderCall,
    ) -> Result<String, EngineError> {
        let url = completions_url(base_url);
        let body = ChatRequest {
            model: &call.model,
            messages: vec![Message {
                role: "user",
                content: &call.prompt,
            }],
            temperature: call.temperature,
            max_tokens: call.max_tokens,
        };

        debug!(
            provider = %provider,
            prompt_len = call.prompt.len(),
            temperature = call.temperature,
            max_tokens = call.max_tokens,
            "Built chat completion payload"
        );
        info!(url = %url, model = %call.model, "Sending request to {}", provider.profile().display_name);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = credential {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(provider, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(provider, &e))?;

        if !status.is_success() {
            return Err(EngineError::Http {
                provider,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::MalformedResponse {
                provider,
                reason: format!("invalid JSON body: {e}"),
            })?;

        debug!(
            choice_count = parsed.choices.len(),
            model = ?parsed.model,
            usage = ?parsed.usage,
            "Received chat completion"
        );

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EngineError::MalformedResponse {
                provider,
                reason: "missing choices[0].message.content".to_string(),
            })
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn transport_error(provider: ProviderId, err: &reqwest::Error) -> EngineError {
    let message = if err.is_timeout() {
        format!("request timeout: {err}")
    } else {
        format!("network error: {err}")
    };
    EngineError::Network { provider, message }
}
