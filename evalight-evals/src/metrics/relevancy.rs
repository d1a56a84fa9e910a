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

//! Semantic relevancy of a response to its question (LLM-as-judge)

use super::{graded_score, EMPTY_RESPONSE};
use crate::judge::{Judge, JudgeRequest};
use crate::{Metric, MetricError, MetricKind, MetricMetadata, MetricScore};
use async_trait::async_trait;
use evalight_core::{metric_names, Case};
use std::sync::Arc;
use tracing::debug;

const INSTRUCTIONS: &str = "Evaluate how relevant the RESPONSE is to the QUESTION. \
Score from 0 to 1, where 1 means the response directly and completely addresses \
the question and 0 means it is unrelated. Do not judge factual accuracy. \
Give a brief explanation for the score.";

/// Scores whether a response addresses the question asked
pub struct RelevancyMetric {
    judge: Arc<dyn Judge>,
}

impl RelevancyMetric {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Metric for RelevancyMetric {
    fn name(&self) -> &str {
        metric_names::RELEVANCY
    }

    async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
        if case.question.trim().is_empty() {
            return Err(MetricError::InvalidInput(
                "question is required for relevancy".to_string(),
            ));
        }
        if !case.has_response() {
            return Ok(MetricScore::with_detail(0.0, EMPTY_RESPONSE));
        }

        let request = JudgeRequest::new(metric_names::RELEVANCY, INSTRUCTIONS)
            .with_field("question", case.question.as_str())
            .with_field("response", case.response.as_str());

        let verdict = self.judge.judge(&request).await?;
        debug!(case = case.index, score = ?verdict.score, "Relevancy judged");
        graded_score(verdict)
    }

    fn metadata(&self) -> MetricMetadata {
        MetricMetadata {
            name: "Answer Relevancy".to_string(),
            version: "1.0.0".to_string(),
            description: "LLM-judged relevance of the response to the question".to_string(),
            kind: MetricKind::LlmJudge,
            tags: vec!["relevance".to_string(), "llm-as-judge".to_string()],
        }
    }
}
