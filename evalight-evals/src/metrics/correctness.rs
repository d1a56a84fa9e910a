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

//! Factual correctness against a reference answer (LLM-as-judge)

use super::{graded_score, EMPTY_RESPONSE};
use crate::judge::{Judge, JudgeRequest};
use crate::{Metric, MetricError, MetricKind, MetricMetadata, MetricScore};
use async_trait::async_trait;
use evalight_core::{metric_names, Case};
use std::sync::Arc;
use tracing::debug;

const INSTRUCTIONS: &str = "Evaluate the factual correctness of the RESPONSE \
compared to the REFERENCE answer. Score from 0 to 1, where 1 means every claim \
agrees with the reference and 0 means the response contradicts it. Wording and \
style differences do not matter. Highlight any factual errors in the explanation.";

const NO_REFERENCE: &str = "Cannot evaluate correctness without a reference answer";

/// Scores agreement between the response and the ground-truth answer
pub struct CorrectnessMetric {
    judge: Arc<dyn Judge>,
}

impl CorrectnessMetric {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self { judge }
    }
}

#[async_trait]
impl Metric for CorrectnessMetric {
    fn name(&self) -> &str {
        metric_names::CORRECTNESS
    }

    async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
        if !case.has_reference() {
            return Ok(MetricScore::with_detail(0.0, NO_REFERENCE));
        }
        if !case.has_response() {
            return Ok(MetricScore::with_detail(0.0, EMPTY_RESPONSE));
        }

        let mut request = JudgeRequest::new(metric_names::CORRECTNESS, INSTRUCTIONS)
            .with_field("response", case.response.as_str())
            .with_field("reference", case.reference.as_str());
        if !case.question.trim().is_empty() {
            request = request.with_field("question", case.question.as_str());
        }

        let verdict = self.judge.judge(&request).await?;
        debug!(case = case.index, score = ?verdict.score, "Correctness judged");
        graded_score(verdict)
    }

    fn metadata(&self) -> MetricMetadata {
        MetricMetadata {
            name: "Factual Correctness".to_string(),
            version: "1.0.0".to_string(),
            description: "LLM-judged agreement of the response with a reference answer"
                .to_string(),
            kind: MetricKind::LlmJudge,
            tags: vec!["correctness".to_string(), "llm-as-judge".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::JudgeVerdict;
    use crate::metrics::testing::FixedJudge;

    #[tokio::test]
    async fn test_correctness_sends_reference() {
        let judge = Arc::new(FixedJudge::new(Ok(JudgeVerdict::scored(0.6))));
        let metric = CorrectnessMetric::new(judge.clone());

        let case = Case::new(4, "Boiling point of water?", "90C at sea level", "100C at sea level");
        let score = metric.evaluate(&case).await.unwrap();
        assert_eq!(score.value, 0.6);

        let requests = judge.requests.lock();
        assert_eq!(requests[0].field("reference"), Some("100C at sea level"));
        assert_eq!(requests[0].field("response"), Some("90C at sea level"));
    }

    #[tokio::test]
    async fn test_missing_reference_scores_zero() {
        let judge = Arc::new(FixedJudge::new(Ok(JudgeVerdict::scored(1.0))));
        let metric = CorrectnessMetric::new(judge.clone());

        let score = metric
            .evaluate(&Case::new(0, "q", "some answer", " "))
            .await
            .unwrap();
        assert_eq!(score.value, 0.0);
        assert_eq!(score.detail.as_deref(), Some(NO_REFERENCE));
        assert_eq!(judge.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_response_scores_zero() {
        let judge = Arc::new(FixedJudge::new(Ok(JudgeVerdict::scored(1.0))));
        let metric = CorrectnessMetric::new(judge.clone());

        let score = metric.evaluate(&Case::new(0, "q", "", "42")).await.unwrap();
        assert_eq!(score.value, 0.0);
        assert_eq!(score.detail.as_deref(), Some("Empty response"));
        assert_eq!(judge.calls(), 0);
    }
}
