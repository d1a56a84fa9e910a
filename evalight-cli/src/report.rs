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

//! Console summary, metrics report and the quality gate

use crate::dataset::ResultsOverview;
use evalight_core::{Status, StatusDistribution, Summary};
use std::fmt;

/// Human-readable run summary: per-metric means, then the status
/// distribution in green, yellow, red order.
pub struct SummaryReport<'a>(pub &'a Summary);

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.0;
        writeln!(f)?;
        writeln!(f, "Evaluation Summary:")?;
        writeln!(f, "{}", "-".repeat(50))?;

        for metric in &summary.metrics {
            let label = capitalize(&metric.metric_name);
            match metric.mean_score {
                Some(mean) => write!(f, "{label}: {mean:.2}")?,
                None => write!(f, "{label}: n/a")?,
            }
            if metric.failed > 0 {
                write!(f, " ({} failed)", metric.failed)?;
            }
            if let Some(detected) = metric.detected {
                write!(f, " [{detected} detected]")?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "Overall Status Distribution:")?;
        write_distribution(f, &summary.status_distribution)?;

        if summary.rows_with_failures > 0 {
            writeln!(f)?;
            writeln!(
                f,
                "{} of {} rows had at least one metric fail",
                summary.rows_with_failures, summary.total_evaluated
            )?;
        }
        Ok(())
    }
}

fn write_distribution(
    f: &mut fmt::Formatter<'_>,
    distribution: &StatusDistribution,
) -> fmt::Result {
    for status in Status::ALL {
        let share = distribution.get(status);
        writeln!(f, "{status}: {} ({:.1}%)", share.count, share.percentage)?;
    }
    Ok(())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Key/value report consumed by CI: `{m}_score` lines followed by
/// `{status}_percentage` lines
pub struct MetricsReport<'a>(pub &'a ResultsOverview);

impl fmt::Display for MetricsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (metric, mean) in &self.0.metric_means {
            writeln!(f, "{metric}_score {mean:.4}")?;
        }
        for status in Status::ALL {
            let percentage = self.0.distribution.get(status).percentage;
            writeln!(f, "{status}_percentage {percentage:.2}")?;
        }
        Ok(())
    }
}

/// Minimum share of green rows a results file must reach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_green: f64,
}

/// Gate decision for one results file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOutcome {
    pub total: usize,
    pub green: usize,
    pub green_percentage: f64,
    pub min_green: f64,
    pub passed: bool,
}

impl QualityGate {
    pub fn new(min_green: f64) -> Self {
        Self { min_green }
    }

    /// Passes when the green percentage meets or exceeds the minimum
    pub fn evaluate(&self, overview: &ResultsOverview) -> GateOutcome {
        let green = overview.distribution.green;
        GateOutcome {
            total: overview.total,
            green: green.count,
            green_percentage: green.percentage,
            min_green: self.min_green,
            passed: green.percentage >= self.min_green,
        }
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(70.0)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation Summary:")?;
        writeln!(f, "Total evaluations: {}", self.total)?;
        writeln!(
            f,
            "Green evaluations: {} ({:.2}%)",
            self.green, self.green_percentage
        )?;
        writeln!(f, "Minimum required: {}%", self.min_green)?;
        if self.passed {
            writeln!(
                f,
                "Quality check passed: {:.2}% green evaluations meets or exceeds \
                 the threshold of {}%",
                self.green_percentage, self.min_green
            )
        } else {
            writeln!(
                f,
                "Quality check failed: {:.2}% green evaluations is below \
                 the minimum threshold of {}%",
                self.green_percentage, self.min_green
            )
        }
    }
}
