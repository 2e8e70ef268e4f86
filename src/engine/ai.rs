//! Provider adapters.
//!
//! Every provider speaks the OpenAI-compatible chat completions protocol;
//! [`HttpRunner`] is the single dispatch table that picks the base URL,
//! credential rules and quota handling per [`ProviderId`].

pub mod chat;
pub mod community;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::engine::error::EngineError;
use crate::engine::provider::ProviderId;
use crate::engine::usage::UsageTracker;

use self::chat::ChatCompletionClient;

/// HTTP request timeout for provider calls.
///
/// A hung provider turns into a `request timeout` failure, which the
/// orchestrator treats as retryable.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything an adapter needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    /// Full user message.
    pub prompt: String,
    /// Provider-native model name.
    pub model: String,
    /// API key, if one was resolved.
    pub credential: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token budget.
    pub max_tokens: u32,
}

/// Runs one completion against one provider.
pub trait ProviderRunner: Send + Sync {
    /// Returns the raw completion text.
    fn run<'a>(
        &'a self,
        provider: ProviderId,
        call: &'a ProviderCall,
    ) -> Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send + 'a>>;
}

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Real adapters over HTTP.
pub struct HttpRunner {
    chat: ChatCompletionClient,
    endpoints: HashMap<ProviderId, Url>,
    usage: Arc<UsageTracker>,
}

impl HttpRunner {
    /// Runner with default endpoints.
    pub fn new(usage: Arc<UsageTracker>) -> Result<Self> {
        Ok(Self {
            chat: ChatCompletionClient::new()?,
            endpoints: HashMap::new(),
            usage,
        })
    }

    /// Runner with endpoint overrides taken from settings.
    pub fn from_settings(settings: &Settings, usage: Arc<UsageTracker>) -> Result<Self> {
        let mut runner = Self::new(usage)?;
        for provider in ProviderId::ALL {
            if let Some(url) = settings.endpoint(provider)? {
                runner = runner.with_endpoint(provider, url);
            }
        }
        Ok(runner)
    }

    /// Overrides the base URL for `provider`.
    #[must_use]
    pub fn with_endpoint(mut self, provider: ProviderId, base_url: Url) -> Self {
        self.endpoints.insert(provider, base_url);
        self
    }

    /// Base URL that `/chat/completions` is appended to.
    pub fn base_url(&self, provider: ProviderId) -> String {
        self.endpoints.get(&provider).map_or_else(
            || provider.profile().base_url.to_string(),
            |url| url.as_str().to_string(),
        )
    }
}

impl ProviderRunner for HttpRunner {
    fn run<'a>(
        &'a self,
        provider: ProviderId,
        call: &'a ProviderCall,
    ) -> Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send + 'a>> {
        Box::pin(async move {
            let base_url = self.base_url(provider);
            debug!(provider = %provider, base_url = %base_url, model = %call.model, "Dispatching provider call");

            if provider == ProviderId::Community {
                return community::complete(&self.chat, &self.usage, &base_url, call).await;
            }

            let credential = call.credential.as_deref();
            if provider.profile().requires_credential && credential.is_none() {
                return Err(EngineError::MissingCredential {
                    provider,
                    env_var: provider.profile().env_var,
                });
            }
            self.chat
                .complete(provider, &base_url, credential, call)
                .await
        })
    }
}
