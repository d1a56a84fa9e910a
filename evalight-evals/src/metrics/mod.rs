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

//! Built-in metrics

pub mod correctness;
pub mod relevancy;
pub mod rouge;
pub mod toxicity;

pub use correctness::CorrectnessMetric;
pub use relevancy::RelevancyMetric;
pub use rouge::{RougeBreakdown, RougeMetric, RougeMode, RougeScore};
pub use toxicity::ToxicityMetric;

use crate::judge::JudgeVerdict;
use crate::{MetricError, MetricScore};

pub(crate) const EMPTY_RESPONSE: &str = "Empty response";

/// Turn a graded verdict into a score, requiring a finite `score` field
pub(crate) fn graded_score(verdict: JudgeVerdict) -> Result<MetricScore, MetricError> {
    match verdict.score {
        Some(score) if score.is_finite() => Ok(MetricScore::new(score, verdict.rationale)),
        Some(score) => Err(MetricError::JudgeOutputError(format!(
            "non-finite score {}",
            score
        ))),
        None => Err(MetricError::JudgeOutputError(
            "verdict carries no score".to_string(),
        )),
    }
}
