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

//! ROUGE lexical overlap against the reference answer
//!
//! Deterministic and local: no judge call, compute in well under a
//! millisecond for typical answers.
//!
//! - **ROUGE-1 / ROUGE-2**: clipped n-gram overlap
//! - **ROUGE-L**: longest common subsequence
//!
//! The metric score is the mean over the components the reference can
//! support (ROUGE-2 needs at least two reference tokens). By default the
//! mean is taken over recall; [`RougeMode::F1`] averages F1 instead.
//!
//! ```rust,ignore
//! use evalight_evals::metrics::rouge::RougeMetric;
//!
//! let breakdown = RougeMetric::breakdown(
//!     "The capital of France is Paris.",
//!     "Paris is the capital city of France.",
//! );
//! println!("{}", breakdown);
//! ```

use crate::{Metric, MetricError, MetricKind, MetricMetadata, MetricScore};
use async_trait::async_trait;
use evalight_core::{metric_names, Case};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// ROUGE score components (precision, recall, F1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl RougeScore {
    fn from_overlap(overlap: usize, candidate_len: usize, reference_len: usize) -> Self {
        if candidate_len == 0 || reference_len == 0 {
            return Self::default();
        }
        let precision = overlap as f64 / candidate_len as f64;
        let recall = overlap as f64 / reference_len as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

/// Which component of each ROUGE score feeds the aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RougeMode {
    #[default]
    Recall,
    F1,
}

/// Per-component ROUGE scores for one (reference, candidate) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RougeBreakdown {
    pub rouge1: RougeScore,
    /// `None` when the reference has fewer than two tokens
    pub rouge2: Option<RougeScore>,
    pub rouge_l: RougeScore,
}

impl RougeBreakdown {
    pub fn aggregate(&self, mode: RougeMode) -> f64 {
        let pick = |s: &RougeScore| match mode {
            RougeMode::Recall => s.recall,
            RougeMode::F1 => s.f1,
        };
        let components: Vec<f64> = [
            Some(&self.rouge1),
            self.rouge2.as_ref(),
            Some(&self.rouge_l),
        ]
        .into_iter()
        .flatten()
        .map(pick)
        .collect();
        components.iter().sum::<f64>() / components.len() as f64
    }
}

fn write_component(f: &mut fmt::Formatter<'_>, label: &str, s: &RougeScore) -> fmt::Result {
    write!(
        f,
        "{} P={:.3} R={:.3} F1={:.3}",
        label, s.precision, s.recall, s.f1
    )
}

impl fmt::Display for RougeBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_component(f, "rouge1", &self.rouge1)?;
        if let Some(rouge2) = &self.rouge2 {
            f.write_str("; ")?;
            write_component(f, "rouge2", rouge2)?;
        }
        f.write_str("; ")?;
        write_component(f, "rougeL", &self.rouge_l)
    }
}

/// Lexical overlap between the response and the reference answer
#[derive(Debug, Clone, Default)]
pub struct RougeMetric {
    mode: RougeMode,
}

impl RougeMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose whether recall (default) or F1 is averaged
    pub fn with_mode(mut self, mode: RougeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Compute ROUGE-1, ROUGE-2 and ROUGE-L for one pair
    pub fn breakdown(reference: &str, candidate: &str) -> RougeBreakdown {
        let ref_tokens = tokenize(reference);
        let cand_tokens = tokenize(candidate);

        RougeBreakdown {
            rouge1: rouge_n(&ref_tokens, &cand_tokens, 1),
            rouge2: (ref_tokens.len() >= 2).then(|| rouge_n(&ref_tokens, &cand_tokens, 2)),
            rouge_l: rouge_l(&ref_tokens, &cand_tokens),
        }
    }

    /// Score one pair. Handles the empty edge cases before any overlap math.
    pub fn score(&self, reference: &str, candidate: &str) -> MetricScore {
        let ref_empty = tokenize(reference).is_empty();
        let cand_empty = tokenize(candidate).is_empty();

        match (ref_empty, cand_empty) {
            (true, true) => MetricScore::with_detail(1.0, "Reference and response are both empty"),
            (true, false) => MetricScore::with_detail(0.0, "Empty reference"),
            (false, true) => MetricScore::with_detail(0.0, "Empty response"),
            (false, false) => {
                let breakdown = Self::breakdown(reference, candidate);
                MetricScore::with_detail(breakdown.aggregate(self.mode), breakdown.to_string())
            }
        }
    }
}

#[async_trait]
impl Metric for RougeMetric {
    fn name(&self) -> &str {
        metric_names::ROUGE
    }

    async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
        Ok(self.score(&case.reference, &case.response))
    }

    fn metadata(&self) -> MetricMetadata {
        MetricMetadata {
            name: "ROUGE".to_string(),
            version: "1.0.0".to_string(),
            description: "ROUGE-1/2/L overlap between response and reference".to_string(),
            kind: MetricKind::Statistical,
            tags: vec!["reference".to_string(), "deterministic".to_string()],
        }
    }
}

/// Lowercase, split on whitespace, trim punctuation from token edges
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// ROUGE-N with clipped counts: min(cand_count, ref_count) per n-gram
fn rouge_n(ref_tokens: &[String], cand_tokens: &[String], n: usize) -> RougeScore {
    let ref_counts = ngram_counts(ref_tokens, n);
    let cand_counts = ngram_counts(cand_tokens, n);

    let overlap: usize = cand_counts
        .iter()
        .filter_map(|(ng, cand_count)| {
            ref_counts
                .get(ng)
                .map(|ref_count| (*cand_count).min(*ref_count))
        })
        .sum();

    RougeScore::from_overlap(
        overlap,
        cand_counts.values().sum(),
        ref_counts.values().sum(),
    )
}

fn rouge_l(ref_tokens: &[String], cand_tokens: &[String]) -> RougeScore {
    let lcs = lcs_length(ref_tokens, cand_tokens);
    RougeScore::from_overlap(lcs, cand_tokens.len(), ref_tokens.len())
}

/// LCS length, O(mn) time and O(min(m, n)) space
fn lcs_length(a: &[String], b: &[String]) -> usize {
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for item in long {
        for j in 1..=short.len() {
            curr[j] = if *item == short[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}
