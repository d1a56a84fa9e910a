// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Judge adapter boundary for LLM-judged metrics
//!
//! Metrics never talk to a model directly. They build a [`JudgeRequest`]
//! naming the task and carrying the relevant text fields, and receive a
//! structured [`JudgeVerdict`] or a typed [`JudgeError`]. Retries, provider
//! selection and transport live behind the [`Judge`] trait.

use crate::llm_client::{LLMClient, LLMError, TokenUsage};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Structured evaluation request sent to a judge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JudgeRequest {
    /// Task identifier, e.g. "relevancy"
    pub task: String,

    /// What the judge should assess and how to express the result
    pub instructions: String,

    /// Named input fields; ordered so rendering is deterministic
    pub fields: BTreeMap<String, String>,
}

impl JudgeRequest {
    pub fn new(task: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            instructions: instructions.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Structured result returned by a judge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Graded score, expected in [0, 1]
    pub score: Option<f64>,

    /// Detection signal for presence-style tasks
    pub detected: Option<bool>,

    /// Free-text rationale
    pub rationale: Option<String>,

    /// Category label, e.g. toxicity type
    pub category: Option<String>,
}

impl JudgeVerdict {
    pub fn scored(score: f64) -> Self {
        Self {
            score: Some(score),
            ..Default::default()
        }
    }

    pub fn detection(detected: bool) -> Self {
        Self {
            detected: Some(detected),
            ..Default::default()
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Interpret a model completion as a verdict.
    ///
    /// Accepts a JSON object, optionally wrapped in a markdown code fence.
    /// Scores may be numbers or numeric strings; detection flags may be
    /// booleans or "true"/"yes"/"1" style strings.
    pub fn parse(content: &str) -> Result<Self, JudgeError> {
        let body = strip_code_fence(content);
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| JudgeError::MalformedOutput(format!("not valid JSON: {}", e)))?;
        let object = value.as_object().ok_or_else(|| {
            JudgeError::MalformedOutput("expected a JSON object".to_string())
        })?;

        let first = |keys: &[&str]| keys.iter().find_map(|k| object.get(*k));

        let score = first(&["score", "rating"]).and_then(parse_score);
        let detected = first(&["detected", "is_toxic", "present"]).and_then(parse_flag);
        let rationale = first(&["explanation", "rationale", "reasoning"])
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let category = first(&["category", "toxicity_type"])
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self {
            score,
            detected,
            rationale,
            category,
        })
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid number pattern"))
}

fn parse_score(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => number_pattern()
            .find(s)
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    }
}

fn parse_flag(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Errors surfaced by a judge
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JudgeError {
    /// The call could not complete (transport, rate limit, provider outage)
    #[error("Judge unavailable: {0}")]
    Unavailable(String),

    /// The call completed but the result could not be interpreted
    #[error("Malformed judge output: {0}")]
    MalformedOutput(String),
}

impl From<LLMError> for JudgeError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::InvalidResponse(_) | LLMError::Json(_) => {
                JudgeError::MalformedOutput(err.to_string())
            }
            _ => JudgeError::Unavailable(err.to_string()),
        }
    }
}

/// Language-model judge consumed by LLM-judged metrics.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError>;
}

/// Aggregate accounting for an [`LlmJudge`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeUsage {
    pub calls: u64,
    pub retries: u64,
    pub failures: u64,
    pub tokens: TokenUsage,
}

/// Judge backed by a chat-completion client
pub struct LlmJudge {
    client: Arc<dyn LLMClient>,
    max_retries: u32,
    retry_backoff: Duration,
    usage: Mutex<JudgeUsage>,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            usage: Mutex::new(JudgeUsage::default()),
        }
    }

    /// Retries apply to transient client errors only (default: 2)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry `n` is `n * backoff` (default: 500ms)
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn usage(&self) -> JudgeUsage {
        *self.usage.lock()
    }

    /// Render a request into the prompt sent to the model
    pub fn render_prompt(request: &JudgeRequest) -> String {
        let mut prompt = format!(
            "TASK: {}\n\n{}\n\n",
            request.task,
            request.instructions.trim()
        );
        for (name, value) in &request.fields {
            prompt.push_str(&format!("{}:\n{}\n\n", name.to_uppercase(), value));
        }
        prompt.push_str(
            "Respond ONLY with a JSON object using these keys where applicable:\n\
             {\"score\": <0.0-1.0>, \"detected\": <true|false>, \
             \"category\": \"<label or none>\", \"explanation\": \"<brief reason>\"}",
        );
        prompt
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        let prompt = Self::render_prompt(request);
        let mut attempt = 0u32;

        loop {
            self.usage.lock().calls += 1;
            match self.client.complete(prompt.clone()).await {
                Ok(response) => {
                    self.usage.lock().tokens += response.usage;
                    debug!(
                        task = %request.task,
                        model = %response.model,
                        tokens = response.usage.total_tokens,
                        "Judge call completed"
                    );
                    return JudgeVerdict::parse(&response.content);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    self.usage.lock().retries += 1;
                    warn!(
                        task = %request.task,
                        attempt,
                        error = %err,
                        "Transient judge failure, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => {
                    self.usage.lock().failures += 1;
                    return Err(err.into());
                }
            }
        }
    }
}
