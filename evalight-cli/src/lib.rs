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

//! Building blocks of the `evalight` binary: configuration, CSV I/O and
//! reporting. Exposed as a library so they can be tested in isolation.

pub mod config;
pub mod dataset;
pub mod report;

pub use config::{ConfigError, EvalConfig, JudgeSettings, Provider};
pub use dataset::{DatasetError, ResultsOverview};
pub use report::{GateOutcome, MetricsReport, QualityGate, SummaryReport};
