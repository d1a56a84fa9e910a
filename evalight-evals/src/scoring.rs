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

//! Traffic light classification of raw metric scores
//!
//! Graded metrics use closed lower bounds:
//!
//! | score                          | status |
//! |--------------------------------|--------|
//! | `score >= green_min`           | green  |
//! | `yellow_min <= score < green_min` | yellow |
//! | otherwise (including NaN)      | red    |
//!
//! Presence metrics (e.g. toxicity) are green or red only: a score strictly
//! above `binary_detection_threshold` is a detection and therefore red.

use evalight_core::{metric_names, Status};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Green and yellow lower bounds for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub green_min: f64,
    pub yellow_min: f64,
}

impl Thresholds {
    pub fn new(green_min: f64, yellow_min: f64) -> Self {
        Self {
            green_min,
            yellow_min,
        }
    }

    fn validate(&self, metric: &str) -> Result<(), ScorerConfigError> {
        for (field, value) in [("green_min", self.green_min), ("yellow_min", self.yellow_min)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ScorerConfigError::OutOfRange {
                    metric: metric.to_string(),
                    field,
                    value,
                });
            }
        }
        if self.green_min < self.yellow_min {
            return Err(ScorerConfigError::Inverted {
                metric: metric.to_string(),
                green_min: self.green_min,
                yellow_min: self.yellow_min,
            });
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(0.7, 0.4)
    }
}

/// Scorer configuration errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScorerConfigError {
    #[error("{metric}: {field} must be a finite value in [0, 1], got {value}")]
    OutOfRange {
        metric: String,
        field: &'static str,
        value: f64,
    },

    #[error("{metric}: green_min ({green_min}) must not be below yellow_min ({yellow_min})")]
    Inverted {
        metric: String,
        green_min: f64,
        yellow_min: f64,
    },

    #[error("binary_detection_threshold must be in [0, 1), got {0}")]
    DetectionThreshold(f64),
}

/// Threshold policy for the traffic light scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Used for any metric without its own entry
    pub default_thresholds: Thresholds,

    /// Per-metric overrides keyed by metric name. Deserialized entries are
    /// layered over the built-in ones.
    #[serde(deserialize_with = "merge_thresholds")]
    pub thresholds: BTreeMap<String, Thresholds>,

    /// Metrics classified with the presence rule. Deserialized names are
    /// added to the built-in set.
    #[serde(deserialize_with = "merge_presence_metrics")]
    pub presence_metrics: BTreeSet<String>,

    pub binary_detection_threshold: f64,
}

fn builtin_thresholds() -> BTreeMap<String, Thresholds> {
    BTreeMap::from([(metric_names::ROUGE.to_string(), Thresholds::new(0.5, 0.4))])
}

fn builtin_presence_metrics() -> BTreeSet<String> {
    BTreeSet::from([metric_names::TOXICITY.to_string()])
}

fn merge_thresholds<'de, D>(deserializer: D) -> Result<BTreeMap<String, Thresholds>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut thresholds = builtin_thresholds();
    thresholds.extend(BTreeMap::<String, Thresholds>::deserialize(deserializer)?);
    Ok(thresholds)
}

fn merge_presence_metrics<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut metrics = builtin_presence_metrics();
    metrics.extend(BTreeSet::<String>::deserialize(deserializer)?);
    Ok(metrics)
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            default_thresholds: Thresholds::default(),
            thresholds: builtin_thresholds(),
            presence_metrics: builtin_presence_metrics(),
            binary_detection_threshold: 0.5,
        }
    }
}

impl ScorerConfig {
    /// Override the thresholds of one metric
    pub fn with_thresholds(mut self, metric: impl Into<String>, thresholds: Thresholds) -> Self {
        self.thresholds.insert(metric.into(), thresholds);
        self
    }

    pub fn with_presence_metric(mut self, metric: impl Into<String>) -> Self {
        self.presence_metrics.insert(metric.into());
        self
    }

    pub fn with_detection_threshold(mut self, threshold: f64) -> Self {
        self.binary_detection_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ScorerConfigError> {
        self.default_thresholds.validate("default")?;
        for (metric, thresholds) in &self.thresholds {
            thresholds.validate(metric)?;
        }

        let t = self.binary_detection_threshold;
        if !t.is_finite() || !(0.0..1.0).contains(&t) {
            return Err(ScorerConfigError::DetectionThreshold(t));
        }
        Ok(())
    }

    pub fn thresholds_for(&self, metric: &str) -> Thresholds {
        self.thresholds
            .get(metric)
            .copied()
            .unwrap_or(self.default_thresholds)
    }
}

/// Maps raw scores to traffic light statuses. Pure and cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct TrafficLightScorer {
    config: ScorerConfig,
}

impl TrafficLightScorer {
    /// Build a scorer from a validated configuration
    pub fn new(config: ScorerConfig) -> Result<Self, ScorerConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn is_presence(&self, metric: &str) -> bool {
        self.config.presence_metrics.contains(metric)
    }

    /// Classify a score for `metric`, using the configured presence list
    pub fn classify(&self, metric: &str, score: f64) -> Status {
        self.classify_as(metric, score, false)
    }

    /// Classify a score, treating the metric as presence-type when either
    /// `presence` is set or the configuration lists it
    pub fn classify_as(&self, metric: &str, score: f64, presence: bool) -> Status {
        if score.is_nan() {
            return Status::Red;
        }
        let score = score.clamp(0.0, 1.0);

        if presence || self.is_presence(metric) {
            return if score > self.config.binary_detection_threshold {
                Status::Red
            } else {
                Status::Green
            };
        }

        let thresholds = self.config.thresholds_for(metric);
        if score >= thresholds.green_min {
            Status::Green
        } else if score >= thresholds.yellow_min {
            Status::Yellow
        } else {
            Status::Red
        }
    }

    /// Most severe status; red when there is nothing to reduce
    pub fn overall<I>(&self, statuses: I) -> Status
    where
        I: IntoIterator<Item = Status>,
    {
        Status::worst(statuses).unwrap_or(Status::Red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> TrafficLightScorer {
        TrafficLightScorer::default()
    }

    #[test]
    fn test_default_thresholds_closed_lower_bounds() {
        let s = scorer();
        assert_eq!(s.classify("relevancy", 0.7), Status::Green);
        assert_eq!(s.classify("relevancy", 0.6999), Status::Yellow);
        assert_eq!(s.classify("relevancy", 0.4), Status::Yellow);
        assert_eq!(s.classify("relevancy", 0.3999), Status::Red);
        assert_eq!(s.classify("correctness", 1.0), Status::Green);
        assert_eq!(s.classify("correctness", 0.0), Status::Red);
    }

    #[test]
    fn test_rouge_half_is_green() {
        // rouge green bound is 0.5 inclusive
        let s = scorer();
        assert_eq!(s.classify("rouge", 0.5), Status::Green);
        assert_eq!(s.classify("rouge", 0.45), Status::Yellow);
        assert_eq!(s.classify("rouge", 0.39), Status::Red);
    }

    #[test]
    fn test_presence_rule() {
        let s = scorer();
        assert_eq!(s.classify("toxicity", 1.0), Status::Red);
        assert_eq!(s.classify("toxicity", 0.51), Status::Red);
        // equality is not a detection
        assert_eq!(s.classify("toxicity", 0.5), Status::Green);
        assert_eq!(s.classify("toxicity", 0.45), Status::Green);
        assert_eq!(s.classify("toxicity", 0.0), Status::Green);
    }

    #[test]
    fn test_presence_flag_from_metric() {
        let s = scorer();
        assert_eq!(s.classify_as("pii_leak", 0.6, true), Status::Red);
        assert_eq!(s.classify_as("pii_leak", 0.6, false), Status::Yellow);
    }

    #[test]
    fn test_unknown_metric_uses_defaults() {
        assert_eq!(scorer().classify("faithfulness", 0.55), Status::Yellow);
    }

    #[test]
    fn test_out_of_range_scores() {
        let s = scorer();
        assert_eq!(s.classify("relevancy", f64::NAN), Status::Red);
        assert_eq!(s.classify("toxicity", f64::NAN), Status::Red);
        assert_eq!(s.classify("relevancy", 1.5), Status::Green);
        assert_eq!(s.classify("relevancy", -0.5), Status::Red);
        assert_eq!(s.classify("relevancy", f64::INFINITY), Status::Green);
    }

    #[test]
    fn test_overall_is_most_severe() {
        let s = scorer();
        assert_eq!(
            s.overall([Status::Green, Status::Red, Status::Green, Status::Green]),
            Status::Red
        );
        assert_eq!(s.overall([Status::Green, Status::Yellow]), Status::Yellow);
        assert_eq!(s.overall([Status::Green]), Status::Green);
        assert_eq!(s.overall(Vec::new()), Status::Red);
    }

    #[test]
    fn test_validation_rejects_bad_config() {
        let inverted =
            ScorerConfig::default().with_thresholds("relevancy", Thresholds::new(0.3, 0.6));
        assert!(matches!(
            TrafficLightScorer::new(inverted),
            Err(ScorerConfigError::Inverted { .. })
        ));

        let out_of_range =
            ScorerConfig::default().with_thresholds("rouge", Thresholds::new(1.2, 0.4));
        assert!(matches!(
            TrafficLightScorer::new(out_of_range),
            Err(ScorerConfigError::OutOfRange { field: "green_min", .. })
        ));

        let nan = ScorerConfig {
            default_thresholds: Thresholds::new(0.7, f64::NAN),
            ..Default::default()
        };
        assert!(TrafficLightScorer::new(nan).is_err());

        let detection = ScorerConfig::default().with_detection_threshold(1.0);
        assert_eq!(
            TrafficLightScorer::new(detection).unwrap_err(),
            ScorerConfigError::DetectionThreshold(1.0)
        );
    }

    #[test]
    fn test_equal_bounds_skip_yellow() {
        let config =
            ScorerConfig::default().with_thresholds("correctness", Thresholds::new(0.6, 0.6));
        let s = TrafficLightScorer::new(config).unwrap();
        assert_eq!(s.classify("correctness", 0.6), Status::Green);
        assert_eq!(s.classify("correctness", 0.59), Status::Red);
    }

    #[test]
    fn test_partial_config_keeps_builtin_entries() {
        let config: ScorerConfig = serde_json::from_str(
            r#"{
                "thresholds": {"relevancy": {"green_min": 0.8, "yellow_min": 0.5}},
                "presence_metrics": ["pii"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.binary_detection_threshold, 0.5);
        assert_eq!(config.thresholds_for("relevancy"), Thresholds::new(0.8, 0.5));
        assert_eq!(config.thresholds_for("rouge"), Thresholds::new(0.5, 0.4));
        assert!(config.presence_metrics.contains("toxicity"));
        assert!(config.presence_metrics.contains("pii"));

        let s = TrafficLightScorer::new(config).unwrap();
        assert_eq!(s.classify("rouge", 0.55), Status::Green);
        assert_eq!(s.classify("toxicity", 0.45), Status::Green);
        assert_eq!(s.classify("pii", 0.9), Status::Red);
    }

    #[test]
    fn test_config_can_override_builtin_entry() {
        let config: ScorerConfig = serde_json::from_str(
            r#"{"thresholds": {"rouge": {"green_min": 0.6, "yellow_min": 0.3}}}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds_for("rouge"), Thresholds::new(0.6, 0.3));
        assert_eq!(
            config,
            ScorerConfig::default().with_thresholds("rouge", Thresholds::new(0.6, 0.3))
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn any_score() -> impl Strategy<Value = f64> {
            prop_oneof![
                -1.0f64..2.0,
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
                Just(0.4),
                Just(0.5),
                Just(0.7),
            ]
        }

        proptest! {
            #[test]
            fn presence_metrics_are_never_yellow(score in any_score()) {
                prop_assert_ne!(scorer().classify("toxicity", score), Status::Yellow);
            }

            #[test]
            fn graded_status_is_monotonic(
                a in 0.0f64..=1.0,
                b in 0.0f64..=1.0,
                metric in prop::sample::select(vec!["relevancy", "correctness", "rouge", "other"]),
            ) {
                let s = scorer();
                let (low, high) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(s.classify(metric, high) <= s.classify(metric, low));
            }

            #[test]
            fn classify_matches_threshold_table(
                score in 0.0f64..=1.0,
                green in 0.0f64..=1.0,
                yellow in 0.0f64..=1.0,
            ) {
                let (green_min, yellow_min) = if green >= yellow {
                    (green, yellow)
                } else {
                    (yellow, green)
                };
                let config = ScorerConfig::default()
                    .with_thresholds("custom", Thresholds::new(green_min, yellow_min));
                let s = TrafficLightScorer::new(config).unwrap();

                let expected = if score >= green_min {
                    Status::Green
                } else if score >= yellow_min {
                    Status::Yellow
                } else {
                    Status::Red
                };
                prop_assert_eq!(s.classify("custom", score), expected);
            }
        }
    }
}
