//! Provider selection and fallback.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::engine::ai::{ProviderCall, ProviderRunner};
use crate::engine::classify::FailureClass;
use crate::engine::credentials::CredentialResolver;
use crate::engine::error::{EngineError, ProviderFailure};
use crate::engine::model_map::{get_model_mapper, ModelMapper};
use crate::engine::parser;
use crate::engine::prompts::build_prompt;
use crate::engine::provider::{EngineSelection, ProviderId};
use crate::engine::request::GenerationRequest;
use crate::engine::result::{Generation, GenerationOutcome};

/// How a dispatch picks providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// `auto` or one provider.
    pub engine: EngineSelection,
    /// With an explicit provider, switch to auto order after a transient
    /// failure instead of giving up.
    pub fallback: bool,
}

/// Tries providers in order until one produces a parseable result.
pub struct EngineOrchestrator<R: ProviderRunner> {
    runner: R,
    credentials: CredentialResolver,
    mapper: &'static ModelMapper,
}

impl<R: ProviderRunner> EngineOrchestrator<R> {
    /// Orchestrator over `runner` using the embedded model table.
    pub fn new(runner: R, credentials: CredentialResolver) -> Self {
        Self {
            runner,
            credentials,
            mapper: get_model_mapper(),
        }
    }

    /// Auto order: hosted providers with a key, then the community tier.
    pub fn auto_candidates(&self) -> Vec<ProviderId> {
        ProviderId::HOSTED_PREFERENCE
            .into_iter()
            .filter(|&provider| self.credentials.resolve(provider).is_some())
            .chain(std::iter::once(ProviderId::Community))
            .collect()
    }

    /// Runs `request` against the candidates selected by `config`.
    ///
    /// The first success wins and later candidates are never called. When
    /// the last candidate fails, a lone failure is returned unchanged and
    /// multiple failures are wrapped in [`EngineError::ExhaustedFallback`].
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
        config: &EngineConfig,
    ) -> Result<GenerationOutcome, EngineError> {
        let prompt = build_prompt(request);
        debug!(
            prompt_len = prompt.len(),
            diff_len = request.diff_text().len(),
            engine = %config.engine,
            "Built prompt"
        );

        let mut candidates: VecDeque<ProviderId> = match config.engine {
            EngineSelection::Auto => self.auto_candidates().into(),
            EngineSelection::Provider(provider) => VecDeque::from([provider]),
        };
        let mut can_widen = config.fallback && config.engine != EngineSelection::Auto;
        let mut tried = Vec::new();
        let mut failures = Vec::new();

        while let Some(provider) = candidates.pop_front() {
            tried.push(provider);

            let err = match self.attempt(provider, &prompt, request).await {
                Ok((generation, model)) => {
                    info!(provider = %provider, model = %model, "Generation succeeded");
                    return Ok(GenerationOutcome {
                        generation,
                        provider,
                        model,
                        failures,
                    });
                }
                Err(err) => err,
            };

            let class = FailureClass::of(&err);
            if candidates.is_empty() && can_widen && class.allows_fallback() {
                can_widen = false;
                candidates = self
                    .auto_candidates()
                    .into_iter()
                    .filter(|p| !tried.contains(p))
                    .collect();
                info!(
                    provider = %provider,
                    remaining = candidates.len(),
                    "Falling back to automatic provider order"
                );
            }

            if candidates.is_empty() {
                if failures.is_empty() {
                    return Err(err);
                }
                failures.push(ProviderFailure {
                    provider,
                    message: err.to_string(),
                });
                return Err(EngineError::ExhaustedFallback {
                    attempts: failures,
                    hint: self.remediation_hint(),
                    terminal: Box::new(err),
                });
            }

            warn!(provider = %provider, class = ?class, "Provider failed, trying next: {err}");
            failures.push(ProviderFailure {
                provider,
                message: err.to_string(),
            });
        }

        Err(EngineError::Configuration(
            "no provider candidates available".to_string(),
        ))
    }

    async fn attempt(
        &self,
        provider: ProviderId,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<(Generation, String), EngineError> {
        let model = self.mapper.resolve(request.model_hint(), provider).model;
        let call = ProviderCall {
            prompt: prompt.to_string(),
            model,
            credential: self.credentials.resolve(provider),
            temperature: request.temperature(),
            max_tokens: request.max_tokens(),
        };

        info!(provider = %provider, model = %call.model, "Trying provider");
        let raw = self.runner.run(provider, &call).await?;
        debug!(provider = %provider, response_len = raw.len(), "Received completion");

        let mut generation =
            parser::parse(&raw, request.mode()).map_err(|e| EngineError::MalformedResponse {
                provider,
                reason: e.to_string(),
            })?;
        if let (Generation::Commit(commit), Some(hints)) =
            (&mut generation, request.commit_hints())
        {
            commit.apply_hints(hints);
        }
        Ok((generation, call.model))
    }

    fn remediation_hint(&self) -> String {
        if self.credentials.has_any_hosted_credential() {
            "Configured providers are failing, possibly temporarily. Try again in a few minutes \
             or pick another provider with --engine."
                .to_string()
        } else {
            format!(
                "No personal API key is configured. Set {} or {}, or run \
                 `diffscribe config set-key <provider> <key>`.",
                ProviderId::Groq.profile().env_var,
                ProviderId::OpenAi.profile().env_var
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::QuotaPeriod;
    use crate::engine::request::{CommitHints, GenerationMode};
    use crate::engine::result::CommitType;
    use crate::engine::test_utils::ScriptedRunner;

    const TASK_RESPONSE: &str = "TITLE: add log\nSUMMARY: adds a log line\nTECHNICAL: trivial";

    fn task_request() -> GenerationRequest {
        GenerationRequest::builder("+console.log('x')", GenerationMode::Task { detailed: false })
            .build()
            .unwrap()
    }

    fn keys(providers: &[ProviderId]) -> CredentialResolver {
        providers
            .iter()
            .fold(CredentialResolver::empty(), |resolver, &provider| {
                resolver.with_override(provider, format!("{provider}-key"))
            })
    }

    fn auto() -> EngineConfig {
        EngineConfig::default()
    }

    fn forced(provider: ProviderId, fallback: bool) -> EngineConfig {
        EngineConfig {
            engine: EngineSelection::Provider(provider),
            fallback,
        }
    }

    fn quota_error() -> EngineError {
        EngineError::QuotaExceeded {
            period: QuotaPeriod::Daily,
            limit: 50,
            used: 50,
        }
    }

    #[test]
    fn auto_candidates_follow_credentials() {
        let orchestrator = EngineOrchestrator::new(ScriptedRunner::new(), keys(&[]));
        assert_eq!(orchestrator.auto_candidates(), vec![ProviderId::Community]);

        let orchestrator =
            EngineOrchestrator::new(ScriptedRunner::new(), keys(&[ProviderId::OpenAi]));
        assert_eq!(
            orchestrator.auto_candidates(),
            vec![ProviderId::OpenAi, ProviderId::Community]
        );

        let orchestrator = EngineOrchestrator::new(
            ScriptedRunner::new(),
            keys(&[ProviderId::OpenAi, ProviderId::Groq, ProviderId::Local]),
        );
        assert_eq!(
            orchestrator.auto_candidates(),
            vec![ProviderId::Groq, ProviderId::OpenAi, ProviderId::Community]
        );
    }

    #[tokio::test]
    async fn forced_provider_parses_task() {
        let runner = ScriptedRunner::new().succeed(ProviderId::Groq, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::Groq]));

        let outcome = orchestrator
            .dispatch(&task_request(), &forced(ProviderId::Groq, false))
            .await
            .unwrap();

        let task = outcome.generation.as_task().unwrap();
        assert_eq!(task.title, "add log");
        assert_eq!(task.summary, "adds a log line");
        assert_eq!(task.technical, "trivial");
        assert_eq!(outcome.provider, ProviderId::Groq);
        assert_eq!(outcome.model, "llama-3.3-70b-versatile");
        assert!(outcome.failures.is_empty());

        let calls = handle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.credential.as_deref(), Some("groq-key"));
        assert_eq!(calls[0].1.max_tokens, 1000);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let runner = ScriptedRunner::new()
            .succeed(ProviderId::Groq, TASK_RESPONSE)
            .succeed(ProviderId::OpenAi, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator =
            EngineOrchestrator::new(runner, keys(&[ProviderId::Groq, ProviderId::OpenAi]));

        orchestrator.dispatch(&task_request(), &auto()).await.unwrap();
        assert_eq!(handle.providers(), vec![ProviderId::Groq]);
    }

    #[tokio::test]
    async fn retryable_failure_moves_on_with_identical_prompt() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::Groq, 429, "rate limit reached")
            .succeed(ProviderId::OpenAi, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator =
            EngineOrchestrator::new(runner, keys(&[ProviderId::Groq, ProviderId::OpenAi]));

        let outcome = orchestrator.dispatch(&task_request(), &auto()).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::OpenAi);
        assert_eq!(outcome.model, "gpt-4o-mini");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, ProviderId::Groq);

        let calls = handle.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.prompt, calls[1].1.prompt);
        assert_eq!(calls[0].1.temperature, calls[1].1.temperature);
    }

    #[tokio::test]
    async fn sole_candidate_failure_is_returned_verbatim() {
        let runner = ScriptedRunner::new().fail_http(ProviderId::OpenAi, 503, "unavailable");
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::OpenAi]));

        let err = orchestrator
            .dispatch(&task_request(), &forced(ProviderId::OpenAi, false))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Http {
                provider: ProviderId::OpenAi,
                status: 503,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn non_retryable_failure_does_not_widen() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::OpenAi, 401, "invalid api key")
            .succeed(ProviderId::Community, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::OpenAi]));

        let err = orchestrator
            .dispatch(&task_request(), &forced(ProviderId::OpenAi, true))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Http { status: 401, .. }));
        assert_eq!(handle.providers(), vec![ProviderId::OpenAi]);
    }

    #[tokio::test]
    async fn explicit_provider_widens_to_auto_order_once() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::OpenAi, 503, "busy")
            .fail_http(ProviderId::Groq, 502, "bad gateway")
            .succeed(ProviderId::Community, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator =
            EngineOrchestrator::new(runner, keys(&[ProviderId::Groq, ProviderId::OpenAi]));

        let outcome = orchestrator
            .dispatch(&task_request(), &forced(ProviderId::OpenAi, true))
            .await
            .unwrap();
        assert_eq!(outcome.provider, ProviderId::Community);
        assert_eq!(
            handle.providers(),
            vec![ProviderId::OpenAi, ProviderId::Groq, ProviderId::Community]
        );
    }

    #[tokio::test]
    async fn all_candidates_failing_aggregates_every_reason() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::Groq, 503, "groq down")
            .fail_http(ProviderId::OpenAi, 503, "openai down")
            .fail_http(ProviderId::Community, 503, "community down");
        let orchestrator =
            EngineOrchestrator::new(runner, keys(&[ProviderId::Groq, ProviderId::OpenAi]));

        let err = orchestrator
            .dispatch(&task_request(), &auto())
            .await
            .unwrap_err();
        let text = err.to_string();
        for needle in ["groq", "openai", "community", "groq down", "openai down", "community down"] {
            assert!(text.contains(needle), "{needle} missing from {text}");
        }
        assert!(text.contains("possibly temporarily"));
        assert!(matches!(
            err.terminal(),
            EngineError::Http {
                provider: ProviderId::Community,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn quota_stays_detectable_inside_aggregate() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::Groq, 429, "slow down")
            .respond(ProviderId::Community, Err(quota_error()));
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::Groq]));

        let err = orchestrator
            .dispatch(&task_request(), &auto())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ExhaustedFallback { .. }));
        assert!(err.is_quota_exceeded());
    }

    #[tokio::test]
    async fn hint_suggests_keys_when_none_configured() {
        let runner = ScriptedRunner::new().respond(ProviderId::Community, Err(quota_error()));
        let orchestrator = EngineOrchestrator::new(runner, keys(&[]));

        let err = orchestrator
            .dispatch(&task_request(), &auto())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded { .. }));

        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::Local, 503, "loading model")
            .fail_http(ProviderId::Community, 503, "busy");
        let orchestrator = EngineOrchestrator::new(runner, keys(&[]));
        let err = orchestrator
            .dispatch(&task_request(), &forced(ProviderId::Local, true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn auto_mode_continues_past_rejected_key() {
        let runner = ScriptedRunner::new()
            .fail_http(ProviderId::Groq, 401, "invalid api key")
            .succeed(ProviderId::Community, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::Groq]));

        let outcome = orchestrator.dispatch(&task_request(), &auto()).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::Community);
        assert_eq!(
            handle.providers(),
            vec![ProviderId::Groq, ProviderId::Community]
        );
    }

    #[tokio::test]
    async fn unparseable_commit_falls_through() {
        let request = GenerationRequest::builder("+fix", GenerationMode::Commit)
            .build()
            .unwrap();
        let runner = ScriptedRunner::new()
            .succeed(ProviderId::Groq, "I cannot help with that.")
            .succeed(
                ProviderId::Community,
                "TYPE: fix\nSCOPE: none\nDESCRIPTION: handle empty input",
            );
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::Groq]));

        let outcome = orchestrator.dispatch(&request, &auto()).await.unwrap();
        assert_eq!(outcome.provider, ProviderId::Community);
        assert!(outcome.failures[0].message.contains("Malformed response from groq"));
        let commit = outcome.generation.as_commit().unwrap();
        assert_eq!(commit.header(), "fix: handle empty input");
    }

    #[tokio::test]
    async fn commit_hints_override_parsed_fields() {
        let request = GenerationRequest::builder("+x", GenerationMode::Commit)
            .commit_hints(CommitHints {
                commit_type: Some(CommitType::Feat),
                scope: Some("api".to_string()),
                breaking: true,
            })
            .build()
            .unwrap();
        let runner = ScriptedRunner::new().succeed(
            ProviderId::OpenAi,
            "TYPE: fix\nSCOPE: core\nDESCRIPTION: change response shape\nBREAKING: none",
        );
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::OpenAi]));

        let outcome = orchestrator
            .dispatch(&request, &forced(ProviderId::OpenAi, false))
            .await
            .unwrap();
        assert_eq!(
            outcome.generation.as_commit().unwrap().header(),
            "feat(api)!: change response shape"
        );
    }

    #[tokio::test]
    async fn unmapped_model_uses_provider_default() {
        let request =
            GenerationRequest::builder("+x", GenerationMode::Task { detailed: false })
                .model(Some("gpt-4o".to_string()))
                .build()
                .unwrap();
        let runner = ScriptedRunner::new().succeed(ProviderId::Groq, TASK_RESPONSE);
        let handle = runner.call_handle();
        let orchestrator = EngineOrchestrator::new(runner, keys(&[ProviderId::Groq]));

        let outcome = orchestrator
            .dispatch(&request, &forced(ProviderId::Groq, false))
            .await
            .unwrap();
        assert_eq!(outcome.model, "llama-3.3-70b-versatile");
        assert_eq!(handle.calls()[0].1.model, "llama-3.3-70b-versatile");
    }
}
