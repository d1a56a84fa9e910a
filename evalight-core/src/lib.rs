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

//! # Evalight Core
//!
//! Data contracts shared by the evaluation engine and its consumers:
//!
//! - [`Case`]: one (question, response, reference) evaluation unit
//! - [`Status`]: the three-level traffic light, ordered by severity
//! - [`MetricResult`] / [`EvaluationRecord`]: per-cell and per-row output
//! - [`Summary`]: dataset-level aggregate of one run
//!
//! Nothing in this crate performs I/O. The summary schema is the stable
//! contract that downstream report tooling reads.

pub mod case;
pub mod record;
pub mod status;
pub mod summary;

pub use case::Case;
pub use record::{EvaluationRecord, MetricErrorKind, MetricResult};
pub use status::{Status, StatusParseError};
pub use summary::{MetricSummary, StatusCount, StatusDistribution, Summary};

/// Built-in metric identifiers.
///
/// These are the stable keys used for output columns and threshold lookup.
pub mod metric_names {
    pub const RELEVANCY: &str = "relevancy";
    pub const CORRECTNESS: &str = "correctness";
    pub const ROUGE: &str = "rouge";
    pub const TOXICITY: &str = "toxicity";

    /// All built-in metrics in their canonical order
    pub const ALL: [&str; 4] = [RELEVANCY, CORRECTNESS, ROUGE, TOXICITY];
}
