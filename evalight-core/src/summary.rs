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

//! Dataset-level aggregate statistics
//!
//! The serialized form of [`Summary`] is consumed by report, trend and
//! quality-gate tooling, so field names are part of the public contract.

use crate::{EvaluationRecord, Status};
use serde::{Deserialize, Serialize};

/// Count and share of one status level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusCount {
    pub count: usize,
    /// Percentage of all records, 0-100
    pub percentage: f64,
}

/// Overall status distribution across all records
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusDistribution {
    pub green: StatusCount,
    pub yellow: StatusCount,
    pub red: StatusCount,
}

impl StatusDistribution {
    /// Tally statuses. All three levels are always present, zero-filled.
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        let (mut green, mut yellow, mut red) = (0usize, 0usize, 0usize);
        for status in statuses {
            match status {
                Status::Green => green += 1,
                Status::Yellow => yellow += 1,
                Status::Red => red += 1,
            }
        }

        let total = green + yellow + red;
        let share = |count: usize| StatusCount {
            count,
            percentage: if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        };

        Self {
            green: share(green),
            yellow: share(yellow),
            red: share(red),
        }
    }

    pub fn get(&self, status: Status) -> StatusCount {
        match status {
            Status::Green => self.green,
            Status::Yellow => self.yellow,
            Status::Red => self.red,
        }
    }

    pub fn total(&self) -> usize {
        self.green.count + self.yellow.count + self.red.count
    }
}

/// Aggregate for a single metric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric_name: String,

    /// Mean over successfully computed scores only; `None` if all failed
    pub mean_score: Option<f64>,

    /// Number of cells with a score
    pub scored: usize,

    /// Number of cells that failed to compute
    pub failed: usize,

    /// For presence-type metrics, how many rows flagged a detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected: Option<usize>,
}

/// Dataset-level result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_evaluated: usize,

    /// Per-metric aggregates in configured metric order
    pub metrics: Vec<MetricSummary>,

    pub status_distribution: StatusDistribution,

    /// Rows in which at least one metric failed to compute
    pub rows_with_failures: usize,
}

impl Summary {
    /// Aggregate a completed run.
    ///
    /// `metric_names` fixes the order of [`Summary::metrics`]; metrics absent
    /// from every record still get an entry with no mean.
    pub fn from_records<S: AsRef<str>>(metric_names: &[S], records: &[EvaluationRecord]) -> Self {
        let metrics = metric_names
            .iter()
            .map(|name| summarize_metric(name.as_ref(), records))
            .collect();

        Self {
            total_evaluated: records.len(),
            metrics,
            status_distribution: StatusDistribution::from_statuses(
                records.iter().map(|r| r.overall_status),
            ),
            rows_with_failures: records.iter().filter(|r| r.has_failure()).count(),
        }
    }

    pub fn metric(&self, metric_name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.metric_name == metric_name)
    }

    pub fn mean_score(&self, metric_name: &str) -> Option<f64> {
        self.metric(metric_name).and_then(|m| m.mean_score)
    }

    pub fn green_percentage(&self) -> f64 {
        self.status_distribution.green.percentage
    }
}

fn summarize_metric(metric_name: &str, records: &[EvaluationRecord]) -> MetricSummary {
    let mut sum = 0.0;
    let mut scored = 0usize;
    let mut failed = 0usize;
    let mut detected = 0usize;
    let mut presence = false;

    for result in records.iter().filter_map(|r| r.result(metric_name)) {
        presence |= result.presence;
        match result.score {
            Some(score) => {
                sum += score;
                scored += 1;
            }
            None => failed += 1,
        }
        if result.is_detected() {
            detected += 1;
        }
    }

    MetricSummary {
        metric_name: metric_name.to_string(),
        mean_score: (scored > 0).then(|| sum / scored as f64),
        scored,
        failed,
        detected: presence.then_some(detected),
    }
}
