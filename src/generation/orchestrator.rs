//! The failover loop.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::events::{EventBus, ExclusionReason, SolverEvent};
use crate::llm::{GenerateContentRequest, GenerativeTransport, LlmError, LlmErrorKind};

use super::candidates::{rank_candidates, ExclusionSet, ModelCandidate};
use super::extract::extract_program;
use super::{AttemptOutcome, GeneratedProgram, GenerationAttempt, GenerationError};

/// Delay applied to a rate-limited request: `min(hint + padding, cap)`, or
/// the default wait when the body carried no usable hint.
pub fn rate_limit_wait(hint_secs: Option<f64>, config: &GenerationConfig) -> Duration {
    match hint_secs {
        Some(hint) if hint.is_finite() && hint >= 0.0 => {
            let cap = config.max_rate_limit_wait;
            let hint = Duration::from_secs_f64(hint.min(cap.as_secs_f64()));
            (hint + config.rate_limit_padding).min(cap)
        }
        _ => config.default_rate_limit_wait,
    }
}

/// Calls the generative endpoint, switching models as they become unusable.
///
/// # Retry policy
/// - 2xx with a usable payload: done
/// - 2xx with an empty or malformed payload: exclude the model, re-select
/// - 429 with a daily-quota signature: exclude the model, settle, re-select
/// - 429 otherwise: wait `min(hint + 2, 60)` seconds (5 without a hint), same model
/// - 404: exclude the model, re-select
/// - transport failure: short delay, same model
/// - anything else: `GenerationFailed`
///
/// Every request counts against `max_attempts`; running out yields
/// `GenerationTimedOut`. The exclusion set lives only for one `generate` call.
pub struct ModelFailover {
    transport: Arc<dyn GenerativeTransport>,
    config: GenerationConfig,
    events: EventBus,
}

impl ModelFailover {
    pub fn new(
        transport: Arc<dyn GenerativeTransport>,
        config: GenerationConfig,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            config,
            events,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Pick the best candidate not yet excluded, consulting the live model
    /// listing. Listing failures fall back to the static priority list.
    async fn select(&self, excluded: &ExclusionSet) -> Option<ModelCandidate> {
        let discovered = match self.transport.list_models().await {
            Ok(models) => Some(models),
            Err(e) => {
                tracing::warn!(error = %e, "Model listing failed, using static priority list");
                None
            }
        };
        rank_candidates(discovered.as_deref(), &self.config, excluded)
            .into_iter()
            .next()
    }

    /// Generate program source for `prompt`.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedProgram, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let request = GenerateContentRequest::from_prompt(prompt);
        let max_attempts = self.config.max_attempts;
        let mut excluded = ExclusionSet::new();
        let mut attempts: Vec<GenerationAttempt> = Vec::new();

        let mut current = self
            .select(&excluded)
            .await
            .ok_or(GenerationError::NoCandidates {
                attempts: 0,
                excluded: 0,
            })?;

        for attempt in 1..=max_attempts {
            let is_last = attempt == max_attempts;
            tracing::debug!(model = %current.id, rank = current.rank, attempt, "Requesting generation");
            self.events.publish(SolverEvent::ModelSelected {
                model: current.id.clone(),
                attempt,
            });

            let result = match self.transport.generate_content(&current.id, &request).await {
                Ok(reply) if reply.is_success() => {
                    extract_program(&reply.body, &self.config.fence_tag)
                        .map_err(|e| (Some(reply.status), e))
                }
                Ok(reply) => Err((
                    Some(reply.status),
                    LlmError::from_reply(reply.status, &reply.body),
                )),
                Err(e) => Err((None, e)),
            };

            let (status, error) = match result {
                Ok(source) => {
                    attempts.push(GenerationAttempt {
                        model: current.id.clone(),
                        status: Some(200),
                        wait_hint_secs: None,
                        outcome: AttemptOutcome::Success,
                        delay: Duration::ZERO,
                    });
                    tracing::info!(model = %current.id, attempts = attempt, "Generation succeeded");
                    self.events.publish(SolverEvent::GenerationSucceeded {
                        model: current.id.clone(),
                        attempts: attempt,
                    });
                    return Ok(GeneratedProgram {
                        source,
                        model: current.id,
                        attempts,
                    });
                }
                Err(pair) => pair,
            };

            if !error.is_recoverable() {
                tracing::error!(model = %current.id, "Generation request rejected: {}", error);
                return Err(GenerationError::GenerationFailed {
                    model: current.id,
                    status,
                    message: error.message,
                    attempts: attempt,
                });
            }

            match error.kind {
                kind if kind.should_switch_model() => {
                    let (reason, outcome) = match error.kind {
                        LlmErrorKind::QuotaExhausted => {
                            (ExclusionReason::QuotaExhausted, AttemptOutcome::QuotaExhausted)
                        }
                        LlmErrorKind::ModelNotFound => {
                            (ExclusionReason::NotFound, AttemptOutcome::ModelNotFound)
                        }
                        _ => (ExclusionReason::Unparseable, AttemptOutcome::ParseError),
                    };
                    let delay = if reason == ExclusionReason::QuotaExhausted && !is_last {
                        self.config.settle_pause
                    } else {
                        Duration::ZERO
                    };
                    attempts.push(GenerationAttempt {
                        model: current.id.clone(),
                        status,
                        wait_hint_secs: None,
                        outcome,
                        delay,
                    });

                    if excluded.exclude(&current.id, reason) {
                        tracing::warn!(
                            model = %current.id,
                            reason = %reason,
                            "Model excluded for this generation run: {}",
                            crate::util::preview(&error.message, 200)
                        );
                        self.events.publish(SolverEvent::ModelExcluded {
                            model: current.id.clone(),
                            reason,
                        });
                    }
                    if is_last {
                        break;
                    }
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    current = match self.select(&excluded).await {
                        Some(next) => next,
                        None => {
                            tracing::error!(
                                excluded = excluded.len(),
                                "Every candidate model is excluded"
                            );
                            return Err(GenerationError::NoCandidates {
                                attempts: attempt,
                                excluded: excluded.len(),
                            });
                        }
                    };
                }

                LlmErrorKind::RateLimited => {
                    let wait = rate_limit_wait(error.retry_hint_secs, &self.config);
                    attempts.push(GenerationAttempt {
                        model: current.id.clone(),
                        status,
                        wait_hint_secs: error.retry_hint_secs,
                        outcome: AttemptOutcome::RateLimited,
                        delay: if is_last { Duration::ZERO } else { wait },
                    });
                    if is_last {
                        break;
                    }
                    tracing::warn!(
                        model = %current.id,
                        hint_secs = ?error.retry_hint_secs,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited, waiting before retrying the same model"
                    );
                    self.events.rate_limit_wait(&current.id, wait);
                    tokio::time::sleep(wait).await;
                }

                _ => {
                    let delay = self.config.transport_retry_delay;
                    attempts.push(GenerationAttempt {
                        model: current.id.clone(),
                        status,
                        wait_hint_secs: None,
                        outcome: AttemptOutcome::TransportError,
                        delay: if is_last { Duration::ZERO } else { delay },
                    });
                    if is_last {
                        break;
                    }
                    tracing::warn!(
                        model = %current.id,
                        delay_secs = delay.as_secs_f64(),
                        "Transport error, retrying: {}",
                        error.message
                    );
                    self.events.publish(SolverEvent::TransportRetry {
                        model: current.id.clone(),
                        message: error.message.clone(),
                    });
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::error!(
            attempts = max_attempts,
            excluded = excluded.len(),
            "Generation attempt budget exhausted"
        );
        Err(GenerationError::GenerationTimedOut {
            attempts: max_attempts,
        })
    }
}
