//! Shared test utilities for the `engine` module.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use crate::engine::ai::{ProviderCall, ProviderRunner};
use crate::engine::error::EngineError;
use crate::engine::provider::ProviderId;

type Script = HashMap<ProviderId, VecDeque<Result<String, EngineError>>>;

/// Runner with a pre-programmed queue of outcomes per provider.
///
/// Outcomes for a provider are returned in FIFO order. A provider with an
/// empty queue answers with a configuration error so unexpected calls fail
/// loudly. Every call is recorded; use [`call_handle`](Self::call_handle)
/// to inspect calls after the runner has been moved into an orchestrator.
pub(crate) struct ScriptedRunner {
    script: Mutex<Script>,
    calls: Arc<Mutex<Vec<(ProviderId, ProviderCall)>>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues an outcome for `provider`.
    pub(crate) fn respond(self, provider: ProviderId, outcome: Result<String, EngineError>) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(provider)
            .or_default()
            .push_back(outcome);
        self
    }

    /// Queues a successful completion for `provider`.
    pub(crate) fn succeed(self, provider: ProviderId, text: &str) -> Self {
        self.respond(provider, Ok(text.to_string()))
    }

    /// Queues an HTTP failure for `provider`.
    pub(crate) fn fail_http(self, provider: ProviderId, status: u16, body: &str) -> Self {
        self.respond(
            provider,
            Err(EngineError::Http {
                provider,
                status,
                body: body.to_string(),
            }),
        )
    }

    pub(crate) fn call_handle(&self) -> CallRecordHandle {
        CallRecordHandle {
            calls: self.calls.clone(),
        }
    }
}

/// Shared handle to a scripted runner's call log.
pub(crate) struct CallRecordHandle {
    calls: Arc<Mutex<Vec<(ProviderId, ProviderCall)>>>,
}

impl CallRecordHandle {
    /// Providers called, in order.
    pub(crate) fn providers(&self) -> Vec<ProviderId> {
        self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    /// Every recorded call.
    pub(crate) fn calls(&self) -> Vec<(ProviderId, ProviderCall)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProviderRunner for ScriptedRunner {
    fn run<'a>(
        &'a self,
        provider: ProviderId,
        call: &'a ProviderCall,
    ) -> Pin<Box<dyn Future<Output = Result<String, EngineError>> + Send + 'a>> {
        self.calls.lock().unwrap().push((provider, call.clone()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .get_mut(&provider)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(EngineError::Configuration(format!(
                    "no scripted response for {provider}"
                )))
            });
        Box::pin(async move { outcome })
    }
}
