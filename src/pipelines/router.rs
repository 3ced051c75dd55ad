use std::time::Duration;
use tokio::time::timeout;
use crate::circuit_breaker::{CircuitBreaker, ExponentialBackoff};
use crate::config::GeneratorConfig;
use crate::error::CollaboratorError;
use crate::logging::log_timeout;
use crate::pipelines::perf;
use crate::pipelines::port::{GenerationRequest, ScheduleGenerator};
use crate::schedule::ScheduleBlock;

/// Wraps a generator with a deadline, bounded retry and a circuit breaker.
///
/// The deadline covers every attempt and backoff together, so a call never
/// takes longer than the configured timeout.
pub struct GenerationRouter<G> {
    generator: G,
    breaker: CircuitBreaker,
    backoff: ExponentialBackoff,
    deadline: Duration,
    max_retries: u32,
}

impl<G: ScheduleGenerator> GenerationRouter<G> {
    pub fn new(generator: G, config: &GeneratorConfig) -> Self {
        GenerationRouter {
            generator,
            breaker: CircuitBreaker::new(
                Duration::from_secs(config.circuit_reset_secs),
                config.circuit_failure_threshold,
            ),
            backoff: ExponentialBackoff::new(config.backoff_initial_ms, config.backoff_max_ms),
            deadline: config.timeout(),
            max_retries: config.max_retries,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
        if self.breaker.is_open() {
            return Err(CollaboratorError::unavailable(format!(
                "circuit open after {} consecutive failures",
                self.breaker.failure_count()
            )));
        }

        let timer = perf::PerfTimer::new("schedule_generation");
        match timeout(self.deadline, self.try_with_retry(request)).await {
            Ok(Ok(blocks)) => {
                self.breaker.record_success();
                tracing::info!(
                    learner_id = %request.learner_id,
                    blocks = blocks.len(),
                    latency_ms = timer.elapsed_ms(),
                    "Generator call succeeded"
                );
                Ok(blocks)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                Err(e)
            }
            Err(_) => {
                self.breaker.record_failure();
                log_timeout("schedule_generation", timer.elapsed_ms());
                Err(CollaboratorError::timeout(self.deadline.as_secs_f64()))
            }
        }
    }

    async fn try_with_retry(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
        let mut attempt = 0u32;
        loop {
            match self.generator.generate(request).await {
                Ok(blocks) => return Ok(blocks),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.backoff.jittered_delay(attempt);
                    tracing::warn!(
                        learner_id = %request.learner_id,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Generator call failed, retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        learner_id = %request.learner_id,
                        error = %e,
                        attempts = attempt + 1,
                        "Generator call failed after all retries"
                    );
                    return Err(e.with_retry(attempt > 0));
                }
            }
        }
    }
}
