use std::time::Duration;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use crate::config::GeneratorConfig;
use crate::error::{CoachError, CollaboratorError};
use crate::pipelines::json_utils;
use crate::pipelines::perf;
use crate::pipelines::port::{GenerationRequest, ScheduleGenerator};
use crate::schedule::ScheduleBlock;

#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'static str,
    request: &'a GenerationRequest,
}

/// `reqwest` adapter for a JSON text-generation endpoint.
///
/// Sends the structured request plus a prompt, accepts either a bare schedule
/// body or an envelope whose `response` field holds the generated text.
#[derive(Clone)]
pub struct HttpScheduleGenerator {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpScheduleGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, CoachError> {
        // The router enforces the overall deadline; this only bounds a stuck socket.
        let client = Client::builder()
            .timeout(config.timeout() + Duration::from_secs(1))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CoachError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(HttpScheduleGenerator {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: &GenerationRequest) -> Result<String> {
        let _perf = perf::PerfTimer::new("generator_http_call");
        let body = GenerateBody {
            model: &self.model,
            prompt: build_prompt(request),
            stream: false,
            format: "json",
            request,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach schedule generator at '{}'", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Schedule generator returned status {}", status);
        }

        response
            .text()
            .await
            .context("Failed to read schedule generator response")
    }
}

impl ScheduleGenerator for HttpScheduleGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<ScheduleBlock>, CollaboratorError> {
        let text = self.call(request).await.map_err(|e| {
            CollaboratorError::transport(format!("{:#}", e))
                .with_source("reqwest")
                .with_context(format!("endpoint: {}", self.endpoint))
        })?;
        json_utils::parse_blocks(&text, request.max_blocks)
    }
}

/// Prompt describing the block schema and the learner's current scores
pub fn build_prompt(request: &GenerationRequest) -> String {
    let s = &request.scores;
    let mut prompt = format!(
        r#"Plan a {minutes}-minute study routine for the exam "{exam}".

Learner state: mood {mood:.2} (-1..1), stress {stress:.2}, focus {focus:.2}, confidence {confidence:.2}, fatigue {fatigue:.2}, error rate {error_rate:.2}.
Routine stress score: {routine:.2}. Suggested exercise difficulty: {cbt:?}.

Return ONLY valid JSON in the following schema:

{{
  "blocks": [
    {{ "kind": "work", "minutes": 45, "difficulty": "easy|medium|hard", "label": "what to study" }},
    {{ "kind": "rest", "minutes": 10, "label": "how to rest" }}
  ]
}}

Requirements:
- Alternate work and rest blocks
- At most {max_blocks} blocks, total minutes at most {minutes}
- Higher stress or fatigue means shorter work blocks and longer rest
- Output only JSON, no markdown or extra text"#,
        minutes = request.study_minutes,
        exam = request.exam_type,
        mood = s.mood,
        stress = s.stress,
        focus = s.focus,
        confidence = s.confidence,
        fatigue = s.fatigue,
        error_rate = s.error_rate,
        routine = s.routine_stress_score,
        cbt = s.cbt_difficulty,
        max_blocks = request.max_blocks,
    );

    if let Some(hint) = &request.correction {
        let original = hint
            .original
            .blocks
            .iter()
            .map(|b| format!("{:?} {}m", b.kind, b.minutes))
            .collect::<Vec<_>>()
            .join(", ");
        prompt.push_str(&format!(
            "\n\nThis replaces a schedule that {negative:.0}% of feedback rated negatively: [{original}].\n\
             Adjustment strength {strength:.2} (0 = light, 1 = strong): make work blocks shorter, \
             rest blocks longer and difficulty easier accordingly.",
            negative = hint.feedback.negative_ratio * 100.0,
            original = original,
            strength = hint.strength,
        ));
    }
    prompt
}
