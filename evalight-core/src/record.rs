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

//! Per-cell and per-row evaluation output

use crate::{Case, Status};
use serde::{Deserialize, Serialize};

/// Why a metric could not produce a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricErrorKind {
    InvalidInput,
    JudgeUnavailable,
    JudgeOutputError,
    Panicked,
    Timeout,
}

/// Output of running one metric on one case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric identifier (output column prefix and threshold key)
    pub metric_name: String,

    /// Score in [0, 1]; `None` means the metric failed to compute
    pub score: Option<f64>,

    /// Traffic light derived from the score
    pub status: Status,

    /// Judge rationale, overlap breakdown, or failure reason
    #[serde(default)]
    pub detail: Option<String>,

    /// Set only when `score` is `None`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MetricErrorKind>,

    /// Whether the metric is a detection-style (binary presence) signal
    #[serde(default)]
    pub presence: bool,
}

impl MetricResult {
    /// A successfully computed score and its classification
    pub fn scored(
        metric_name: impl Into<String>,
        score: f64,
        status: Status,
        detail: Option<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: Some(score),
            status,
            detail,
            error: None,
            presence: false,
        }
    }

    /// A failed cell. Always red.
    pub fn failed(
        metric_name: impl Into<String>,
        kind: MetricErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: None,
            status: Status::Red,
            detail: Some(reason.into()),
            error: Some(kind),
            presence: false,
        }
    }

    pub fn with_presence(mut self, presence: bool) -> Self {
        self.presence = presence;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.score.is_none()
    }

    /// True when a presence-type metric computed a score and flagged it
    pub fn is_detected(&self) -> bool {
        self.presence && !self.is_failed() && self.status == Status::Red
    }
}

/// One row of final output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub case: Case,

    /// One result per requested metric, in configured metric order
    pub results: Vec<MetricResult>,

    /// Most severe status among `results`
    pub overall_status: Status,
}

impl EvaluationRecord {
    /// Build a record, reducing the metric statuses to the overall status.
    ///
    /// A record without any results is red: nothing was verified.
    pub fn new(case: Case, results: Vec<MetricResult>) -> Self {
        let overall_status =
            Status::worst(results.iter().map(|r| r.status)).unwrap_or(Status::Red);
        Self {
            case,
            results,
            overall_status,
        }
    }

    pub fn result(&self, metric_name: &str) -> Option<&MetricResult> {
        self.results.iter().find(|r| r.metric_name == metric_name)
    }

    pub fn has_failure(&self) -> bool {
        self.results.iter().any(MetricResult::is_failed)
    }

    pub fn presence_detected(&self, metric_name: &str) -> bool {
        self.result(metric_name)
            .map(MetricResult::is_detected)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> Case {
        Case::new(0, "What is the capital of France?", "Paris", "Paris")
    }

    #[test]
    fn test_one_red_three_green_is_red() {
        let record = EvaluationRecord::new(
            case(),
            vec![
                MetricResult::scored("relevancy", 0.9, Status::Green, None),
                MetricResult::scored("correctness", 0.95, Status::Green, None),
                MetricResult::scored("rouge", 0.2, Status::Red, None),
                MetricResult::scored("toxicity", 0.0, Status::Green, None).with_presence(true),
            ],
        );
        assert_eq!(record.overall_status, Status::Red);
        assert!(!record.has_failure());
    }

    #[test]
    fn test_yellow_dominates_green() {
        let record = EvaluationRecord::new(
            case(),
            vec![
                MetricResult::scored("relevancy", 0.55, Status::Yellow, None),
                MetricResult::scored("rouge", 1.0, Status::Green, None),
            ],
        );
        assert_eq!(record.overall_status, Status::Yellow);
    }

    #[test]
    fn test_failed_cell_counts_as_red() {
        let record = EvaluationRecord::new(
            case(),
            vec![
                MetricResult::scored("rouge", 1.0, Status::Green, None),
                MetricResult::failed(
                    "relevancy",
                    MetricErrorKind::JudgeUnavailable,
                    "connection refused",
                ),
            ],
        );
        assert_eq!(record.overall_status, Status::Red);
        assert!(record.has_failure());
        let failed = record.result("relevancy").unwrap();
        assert_eq!(failed.score, None);
        assert_eq!(failed.error, Some(MetricErrorKind::JudgeUnavailable));
    }

    #[test]
    fn test_empty_record_is_red() {
        let record = EvaluationRecord::new(case(), Vec::new());
        assert_eq!(record.overall_status, Status::Red);
    }

    #[test]
    fn test_presence_detection() {
        let toxic = MetricResult::scored("toxicity", 1.0, Status::Red, None).with_presence(true);
        assert!(toxic.is_detected());

        let graded_red = MetricResult::scored("rouge", 0.1, Status::Red, None);
        assert!(!graded_red.is_detected());

        let failed = MetricResult::failed("toxicity", MetricErrorKind::Timeout, "timed out")
            .with_presence(true);
        assert!(!failed.is_detected());
    }
}
