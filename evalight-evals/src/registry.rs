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

//! Metric registry and selection

use crate::judge::Judge;
use crate::metrics::{CorrectnessMetric, RelevancyMetric, RougeMetric, ToxicityMetric};
use crate::Metric;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Ordered set of metrics a pipeline runs.
///
/// Built explicitly and handed to the pipeline; there is no global registry.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    metrics: Vec<Arc<dyn Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in metrics: relevancy, correctness, rouge, toxicity
    pub fn standard(judge: Arc<dyn Judge>) -> Self {
        Self {
            metrics: vec![
                Arc::new(RelevancyMetric::new(judge.clone())),
                Arc::new(CorrectnessMetric::new(judge.clone())),
                Arc::new(RougeMetric::new()),
                Arc::new(ToxicityMetric::new(judge)),
            ],
        }
    }

    /// Register a new metric
    pub fn register(&mut self, metric: Arc<dyn Metric>) -> Result<(), RegistryError> {
        let name = metric.name().to_string();
        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateName(name));
        }

        info!("Registering metric: {} ({})", metric.metadata().name, name);
        self.metrics.push(metric);
        Ok(())
    }

    /// Builder-style [`MetricRegistry::register`]
    pub fn with_metric(mut self, metric: Arc<dyn Metric>) -> Result<Self, RegistryError> {
        self.register(metric)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.iter().find(|m| m.name() == name).cloned()
    }

    /// Metric names in registration order
    pub fn names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn metrics(&self) -> &[Arc<dyn Metric>] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Narrow the registry to a selection, in selection order
    pub fn select(&self, selection: &MetricSelection) -> Result<Self, RegistryError> {
        match selection {
            MetricSelection::All => Ok(self.clone()),
            MetricSelection::Named(names) => {
                let metrics = names
                    .iter()
                    .map(|name| {
                        self.get(name)
                            .ok_or_else(|| RegistryError::UnknownMetric(name.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self { metrics })
            }
        }
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.names())
            .finish()
    }
}

/// Which metrics to run: `all` or a comma-separated list of names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MetricSelection {
    #[default]
    All,
    Named(Vec<String>),
}

impl FromStr for MetricSelection {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(MetricSelection::All);
        }

        let mut names: Vec<String> = Vec::new();
        for name in s.split(',').map(|n| n.trim().to_lowercase()) {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }

        if names.is_empty() {
            return Err(RegistryError::EmptySelection);
        }
        Ok(MetricSelection::Named(names))
    }
}

impl fmt::Display for MetricSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSelection::All => f.write_str("all"),
            MetricSelection::Named(names) => f.write_str(&names.join(",")),
        }
    }
}

/// Registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate metric name: {0}")]
    DuplicateName(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Metric selection is empty")]
    EmptySelection,
}
