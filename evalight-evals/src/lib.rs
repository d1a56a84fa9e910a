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

//! # Evalight Evaluation Engine
//!
//! Scores batches of (question, response, reference) cases and reduces every
//! score to a green / yellow / red traffic light.
//!
//! ## Features
//!
//! - **Trait-based metrics**: relevancy, correctness, ROUGE and toxicity built in
//! - **Judge boundary**: LLM-judged metrics only see the [`Judge`] trait
//! - **Traffic light scoring**: validated per-metric thresholds, presence rule
//! - **Bounded concurrency**: per-cell failure isolation, input order preserved
//! - **Result caching**: identical judge requests are answered once
//!
//! ## Example
//!
//! ```rust,ignore
//! use evalight_evals::{EvaluationPipeline, MetricRegistry, PipelineConfig, TrafficLightScorer};
//! use evalight_evals::judge::LlmJudge;
//! use evalight_evals::llm_client::OpenAIClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(OpenAIClient::new(
//!         std::env::var("OPENAI_API_KEY")?,
//!         "gpt-4o-mini".to_string(),
//!     ));
//!     let judge = Arc::new(LlmJudge::new(client));
//!
//!     let pipeline = EvaluationPipeline::new(
//!         MetricRegistry::standard(judge),
//!         TrafficLightScorer::default(),
//!         PipelineConfig::default(),
//!     );
//!     let run = pipeline.run(cases).await?;
//!     println!("{:.1}% green", run.summary.green_percentage());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use evalight_core::{Case, MetricErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod dispatch;
pub mod judge;
pub mod llm_client;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod scoring;

pub use cache::{CacheStats, CachedJudge};
pub use dispatch::{BoundedDispatcher, DispatchError, Dispatcher, SequentialDispatcher};
pub use judge::{Judge, JudgeError, JudgeRequest, JudgeVerdict, LlmJudge};
pub use pipeline::{EvaluationPipeline, EvaluationRun, PipelineConfig, PipelineError};
pub use registry::{MetricRegistry, MetricSelection, RegistryError};
pub use scoring::{ScorerConfig, ScorerConfigError, Thresholds, TrafficLightScorer};

/// Core trait that all metrics must implement
#[async_trait]
pub trait Metric: Send + Sync {
    /// Stable identifier, used for output columns and threshold lookup
    fn name(&self) -> &str;

    /// Whether the score is a detection signal rather than a quality grade.
    ///
    /// Presence metrics are classified green or red only.
    fn is_binary_presence(&self) -> bool {
        false
    }

    /// Score a single case
    async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError>;

    /// Metadata about this metric
    fn metadata(&self) -> MetricMetadata;
}

/// Successful metric output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Score in [0, 1]
    pub value: f64,

    pub detail: Option<String>,
}

impl MetricScore {
    /// Build a score, clamping the value into [0, 1]. NaN becomes 0.
    pub fn new(value: f64, detail: Option<String>) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        Self { value, detail }
    }

    pub fn with_detail(value: f64, detail: impl Into<String>) -> Self {
        Self::new(value, Some(detail.into()))
    }
}

/// How a metric computes its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    LlmJudge,
    Statistical,
}

/// Metadata about a metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMetadata {
    /// Human-readable name
    pub name: String,

    /// Version string (e.g., "1.0.0")
    pub version: String,

    /// Description of what this metric measures
    pub description: String,

    pub kind: MetricKind,

    /// Tags for categorization
    pub tags: Vec<String>,
}

/// Errors that can occur while scoring one cell
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Judge unavailable: {0}")]
    JudgeUnavailable(String),

    #[error("Judge output error: {0}")]
    JudgeOutputError(String),

    #[error("Metric panicked: {0}")]
    Panicked(String),

    #[error("Metric timed out after {0}s")]
    Timeout(u64),
}

impl MetricError {
    pub fn kind(&self) -> MetricErrorKind {
        match self {
            MetricError::InvalidInput(_) => MetricErrorKind::InvalidInput,
            MetricError::JudgeUnavailable(_) => MetricErrorKind::JudgeUnavailable,
            MetricError::JudgeOutputError(_) => MetricErrorKind::JudgeOutputError,
            MetricError::Panicked(_) => MetricErrorKind::Panicked,
            MetricError::Timeout(_) => MetricErrorKind::Timeout,
        }
    }
}

impl From<JudgeError> for MetricError {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::Unavailable(msg) => MetricError::JudgeUnavailable(msg),
            JudgeError::MalformedOutput(msg) => MetricError::JudgeOutputError(msg),
        }
    }
}
