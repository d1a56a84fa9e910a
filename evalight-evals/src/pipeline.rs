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

//! Evaluation pipeline: dispatch, classification, row reduction, aggregation
//!
//! A run fans out one task per (case, metric), lets the dispatcher execute
//! them under the concurrency limit, then rebuilds rows in input order. A
//! failing cell becomes a red result with its error kind and reason; it
//! never aborts the run. Only structural problems (no cases, no metrics), a
//! run-level timeout or an internal join failure reject the whole run.

use crate::dispatch::{BoundedDispatcher, DispatchError, Dispatcher, EvalTask, TaskOutcome};
use crate::registry::MetricRegistry;
use crate::scoring::TrafficLightScorer;
use crate::{Metric, MetricError, MetricScore};
use chrono::{DateTime, Utc};
use evalight_core::{Case, EvaluationRecord, MetricResult, Summary};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Execution settings for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of (case, metric) tasks in flight; 0 is treated as 1
    pub max_concurrent: usize,

    /// Deadline for a single metric evaluation
    pub task_timeout_secs: Option<u64>,

    /// Deadline for the whole run
    pub run_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            task_timeout_secs: Some(120),
            run_timeout_secs: None,
        }
    }
}

/// Errors that reject a whole run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Dataset contains no cases")]
    EmptyDataset,

    #[error("No metrics configured")]
    NoMetrics,

    #[error("Evaluation run timed out after {0}s")]
    TimedOut(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DispatchError> for PipelineError {
    fn from(err: DispatchError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

/// Output of one completed run.
///
/// `records` and `summary` depend only on the inputs and metric outputs;
/// run identity and timing are kept beside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Configured metric order, matching every record's results
    pub metric_names: Vec<String>,

    pub records: Vec<EvaluationRecord>,
    pub summary: Summary,
}

/// Runs a registry of metrics over a dataset
pub struct EvaluationPipeline {
    registry: MetricRegistry,
    scorer: TrafficLightScorer,
    config: PipelineConfig,
    dispatcher: Arc<dyn Dispatcher>,
}

impl EvaluationPipeline {
    pub fn new(
        registry: MetricRegistry,
        scorer: TrafficLightScorer,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            scorer,
            config,
            dispatcher: Arc::new(BoundedDispatcher),
        }
    }

    /// Swap the scheduling strategy
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> &TrafficLightScorer {
        &self.scorer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Evaluate every case with every configured metric
    pub async fn run(&self, cases: Vec<Case>) -> Result<EvaluationRun, PipelineError> {
        if cases.is_empty() {
            error!("Refusing to run: dataset contains no cases");
            return Err(PipelineError::EmptyDataset);
        }
        if self.registry.is_empty() {
            error!("Refusing to run: no metrics configured");
            return Err(PipelineError::NoMetrics);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let metric_names = self.registry.names();

        info!(
            %run_id,
            cases = cases.len(),
            metrics = ?metric_names,
            max_concurrent = self.config.max_concurrent,
            "Starting evaluation run"
        );

        let records = self
            .with_run_timeout(self.evaluate_rows(cases))
            .await
            .map_err(|e| {
                if let PipelineError::TimedOut(secs) = e {
                    error!(%run_id, timeout_secs = secs, "Evaluation run timed out");
                }
                e
            })?;

        let summary = Summary::from_records(&metric_names, &records);
        let dist = &summary.status_distribution;
        info!(
            %run_id,
            total = summary.total_evaluated,
            green = dist.green.count,
            yellow = dist.yellow.count,
            red = dist.red.count,
            rows_with_failures = summary.rows_with_failures,
            duration_ms = start.elapsed().as_millis() as u64,
            "Evaluation run complete"
        );

        Ok(EvaluationRun {
            run_id,
            started_at,
            finished_at: Utc::now(),
            metric_names,
            records,
            summary,
        })
    }

    /// Evaluate a single case through the same dispatch, scoring and
    /// run timeout as [`EvaluationPipeline::run`]
    pub async fn evaluate_case(&self, case: &Case) -> Result<EvaluationRecord, PipelineError> {
        if self.registry.is_empty() {
            return Err(PipelineError::NoMetrics);
        }
        self.with_run_timeout(self.evaluate_rows(vec![case.clone()]))
            .await?
            .pop()
            .ok_or_else(|| PipelineError::Internal("no record produced".to_string()))
    }

    async fn with_run_timeout<F>(
        &self,
        evaluation: F,
    ) -> Result<Vec<EvaluationRecord>, PipelineError>
    where
        F: Future<Output = Result<Vec<EvaluationRecord>, PipelineError>>,
    {
        match self.config.run_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), evaluation)
                .await
                .map_err(|_| PipelineError::TimedOut(secs))?,
            None => evaluation.await,
        }
    }

    async fn evaluate_rows(
        &self,
        cases: Vec<Case>,
    ) -> Result<Vec<EvaluationRecord>, PipelineError> {
        let metrics = self.registry.metrics();
        let cases: Vec<Arc<Case>> = cases.into_iter().map(Arc::new).collect();
        let timeout_secs = self.config.task_timeout_secs;

        let tasks: Vec<EvalTask> = cases
            .iter()
            .enumerate()
            .flat_map(|(row, case)| {
                metrics
                    .iter()
                    .enumerate()
                    .map(move |(metric_slot, metric)| EvalTask {
                        row,
                        metric_slot,
                        case: Arc::clone(case),
                        metric: Arc::clone(metric),
                        timeout_secs,
                    })
            })
            .collect();

        let expected = tasks.len();
        let outcomes = self
            .dispatcher
            .dispatch(tasks, self.config.max_concurrent)
            .await?;
        if outcomes.len() != expected {
            return Err(PipelineError::Internal(format!(
                "dispatcher returned {} outcomes for {} tasks",
                outcomes.len(),
                expected
            )));
        }

        let mut grid: Vec<Vec<Option<Result<MetricScore, MetricError>>>> =
            vec![vec![None; metrics.len()]; cases.len()];
        for TaskOutcome {
            row,
            metric_slot,
            result,
        } in outcomes
        {
            let cell = grid
                .get_mut(row)
                .and_then(|r| r.get_mut(metric_slot))
                .ok_or_else(|| {
                    PipelineError::Internal(format!(
                        "outcome for unknown slot ({}, {})",
                        row, metric_slot
                    ))
                })?;
            *cell = Some(result);
        }

        cases
            .into_iter()
            .zip(grid)
            .map(|(case, row)| {
                let results = metrics
                    .iter()
                    .zip(row)
                    .map(|(metric, outcome)| {
                        let outcome = outcome.ok_or_else(|| {
                            PipelineError::Internal(format!(
                                "missing outcome for case {} metric {}",
                                case.index,
                                metric.name()
                            ))
                        })?;
                        Ok(self.classify(&case, metric.as_ref(), outcome))
                    })
                    .collect::<Result<Vec<_>, PipelineError>>()?;
                Ok(EvaluationRecord::new(Arc::unwrap_or_clone(case), results))
            })
            .collect()
    }

    fn classify(
        &self,
        case: &Case,
        metric: &dyn Metric,
        outcome: Result<MetricScore, MetricError>,
    ) -> MetricResult {
        let name = metric.name();
        let presence = metric.is_binary_presence() || self.scorer.is_presence(name);

        match outcome {
            Ok(score) => {
                let status = self.scorer.classify_as(name, score.value, presence);
                debug!(
                    case = case.index,
                    metric = name,
                    score = score.value,
                    %status,
                    "Cell scored"
                );
                MetricResult::scored(name, score.value, status, score.detail)
                    .with_presence(presence)
            }
            Err(err) => {
                warn!(case = case.index, metric = name, error = %err, "Metric failed");
                MetricResult::failed(name, err.kind(), err.to_string()).with_presence(presence)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SequentialDispatcher;
    use crate::metrics::RougeMetric;
    use crate::{MetricKind, MetricMetadata};
    use async_trait::async_trait;
    use evalight_core::{MetricErrorKind, Status};

    struct FixedMetric {
        name: &'static str,
        score: f64,
    }

    #[async_trait]
    impl Metric for FixedMetric {
        fn name(&self) -> &str {
            self.name
        }

        async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
            if case.question == "fail" {
                return Err(MetricError::JudgeUnavailable("connection refused".into()));
            }
            Ok(MetricScore::new(self.score, None))
        }

        fn metadata(&self) -> MetricMetadata {
            MetricMetadata {
                name: self.name.to_string(),
                version: "1.0.0".to_string(),
                description: "For testing".to_string(),
                kind: MetricKind::Statistical,
                tags: vec![],
            }
        }
    }

    fn pipeline(metrics: Vec<Arc<dyn Metric>>) -> EvaluationPipeline {
        let mut registry = MetricRegistry::new();
        for metric in metrics {
            registry.register(metric).unwrap();
        }
        EvaluationPipeline::new(
            registry,
            TrafficLightScorer::default(),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let p = pipeline(vec![Arc::new(RougeMetric::new())]);
        assert_eq!(p.run(Vec::new()).await.unwrap_err(), PipelineError::EmptyDataset);

        let p = pipeline(Vec::new());
        let cases = vec![Case::new(0, "q", "r", "r")];
        assert_eq!(p.run(cases).await.unwrap_err(), PipelineError::NoMetrics);
    }

    #[tokio::test]
    async fn test_run_classifies_and_reduces() {
        let p = pipeline(vec![
            Arc::new(FixedMetric {
                name: "relevancy",
                score: 0.9,
            }),
            Arc::new(FixedMetric {
                name: "correctness",
                score: 0.55,
            }),
        ]);
        let run = p
            .run(vec![
                Case::new(0, "q0", "r", ""),
                Case::new(1, "fail", "r", ""),
            ])
            .await
            .unwrap();

        assert_eq!(run.metric_names, vec!["relevancy", "correctness"]);
        assert_eq!(run.records[0].overall_status, Status::Yellow);
        assert_eq!(run.records[0].result("relevancy").unwrap().status, Status::Green);

        let failed = &run.records[1];
        assert_eq!(failed.overall_status, Status::Red);
        assert_eq!(
            failed.result("correctness").unwrap().error,
            Some(MetricErrorKind::JudgeUnavailable)
        );
        assert_eq!(run.summary.rows_with_failures, 1);
        assert_eq!(run.summary.total_evaluated, 2);
    }

    #[tokio::test]
    async fn test_presence_flag_comes_from_metric_or_config() {
        let p = pipeline(vec![
            Arc::new(FixedMetric {
                name: "toxicity",
                score: 1.0,
            }),
            Arc::new(RougeMetric::new()),
        ]);
        let record = p
            .evaluate_case(&Case::new(0, "q", "same words", "same words"))
            .await
            .unwrap();

        let toxicity = record.result("toxicity").unwrap();
        assert!(toxicity.presence);
        assert_eq!(toxicity.status, Status::Red);
        assert!(record.presence_detected("toxicity"));
        assert!(!record.result("rouge").unwrap().presence);
    }

    #[tokio::test]
    async fn test_sequential_dispatcher_gives_same_records() {
        let cases: Vec<Case> = (0..5)
            .map(|i| Case::new(i, format!("q{}", i), "the cat sat", "the cat sat down"))
            .collect();

        let bounded = pipeline(vec![Arc::new(RougeMetric::new())]);
        let sequential = pipeline(vec![Arc::new(RougeMetric::new())])
            .with_dispatcher(Arc::new(SequentialDispatcher));

        let a = bounded.run(cases.clone()).await.unwrap();
        let b = sequential.run(cases).await.unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.summary, b.summary);
    }

    struct StalledMetric;

    #[async_trait]
    impl Metric for StalledMetric {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
            if case.question == "stall" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(MetricScore::new(1.0, None))
        }

        fn metadata(&self) -> MetricMetadata {
            MetricMetadata {
                name: "Stalled".to_string(),
                version: "1.0.0".to_string(),
                description: "For testing".to_string(),
                kind: MetricKind::Statistical,
                tags: vec![],
            }
        }
    }

    #[tokio::test]
    async fn test_evaluate_case_honours_run_timeout() {
        let config = PipelineConfig {
            task_timeout_secs: None,
            run_timeout_secs: Some(1),
            ..PipelineConfig::default()
        };
        let p = EvaluationPipeline::new(
            MetricRegistry::new()
                .with_metric(Arc::new(StalledMetric))
                .unwrap(),
            TrafficLightScorer::default(),
            config,
        );

        let record = p
            .evaluate_case(&Case::new(0, "quick", "r", "r"))
            .await
            .unwrap();
        assert_eq!(record.overall_status, Status::Green);

        let err = p
            .evaluate_case(&Case::new(1, "stall", "r", "r"))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::TimedOut(1));
    }
}
