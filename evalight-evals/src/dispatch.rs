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

//! Scheduling of (case, metric) evaluation tasks
//!
//! A dispatcher only decides *when* tasks run. Every task writes exactly one
//! outcome keyed by `(row, metric_slot)`; outcomes may come back in any order
//! and the pipeline reassembles them.

use crate::{Metric, MetricError, MetricScore};
use async_trait::async_trait;
use evalight_core::Case;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One metric applied to one case
#[derive(Clone)]
pub struct EvalTask {
    /// Position of the case in the run input
    pub row: usize,

    /// Position of the metric in the configured metric list
    pub metric_slot: usize,

    pub case: Arc<Case>,
    pub metric: Arc<dyn Metric>,

    /// Per-task deadline in seconds
    pub timeout_secs: Option<u64>,
}

/// Result of one task, tagged with its slot
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub row: usize,
    pub metric_slot: usize,
    pub result: Result<MetricScore, MetricError>,
}

/// Dispatcher errors. Per-task failures never surface here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Task join failed: {0}")]
    Join(String),

    #[error("Concurrency limiter closed: {0}")]
    LimiterClosed(String),
}

/// Scheduling strategy for evaluation tasks
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Run all tasks with at most `limit` in flight; one outcome per task
    async fn dispatch(
        &self,
        tasks: Vec<EvalTask>,
        limit: usize,
    ) -> Result<Vec<TaskOutcome>, DispatchError>;
}

/// Run one task, turning panics and deadline overruns into metric errors
pub async fn run_task(task: EvalTask) -> TaskOutcome {
    let EvalTask {
        row,
        metric_slot,
        case,
        metric,
        timeout_secs,
    } = task;

    let evaluation = AssertUnwindSafe(metric.evaluate(&case)).catch_unwind();
    let caught = match timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), evaluation).await {
            Ok(caught) => caught,
            Err(_) => {
                return TaskOutcome {
                    row,
                    metric_slot,
                    result: Err(MetricError::Timeout(secs)),
                }
            }
        },
        None => evaluation.await,
    };

    let result =
        caught.unwrap_or_else(|payload| Err(MetricError::Panicked(panic_message(payload))));
    TaskOutcome {
        row,
        metric_slot,
        result,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Default dispatcher: a `JoinSet` of spawned tasks gated by a semaphore.
///
/// Dropping the dispatch future drops the set, which aborts every task
/// still in flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedDispatcher;

#[async_trait]
impl Dispatcher for BoundedDispatcher {
    async fn dispatch(
        &self,
        tasks: Vec<EvalTask>,
        limit: usize,
    ) -> Result<Vec<TaskOutcome>, DispatchError> {
        let semaphore = Arc::new(Semaphore::new(limit.max(1)));
        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut set = JoinSet::new();

        for task in tasks {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| DispatchError::LimiterClosed(e.to_string()))?;

            set.spawn(async move {
                let _permit = permit;
                run_task(task).await
            });
        }

        while let Some(joined) = set.join_next().await {
            outcomes.push(joined.map_err(|e| DispatchError::Join(e.to_string()))?);
        }

        Ok(outcomes)
    }
}

/// Runs tasks one after another on the calling task
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialDispatcher;

#[async_trait]
impl Dispatcher for SequentialDispatcher {
    async fn dispatch(
        &self,
        tasks: Vec<EvalTask>,
        _limit: usize,
    ) -> Result<Vec<TaskOutcome>, DispatchError> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            outcomes.push(run_task(task).await);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MetricKind, MetricMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Metric that sleeps briefly and tracks peak concurrency
    struct GaugeMetric {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Metric for GaugeMetric {
        fn name(&self) -> &str {
            "gauge"
        }

        async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(MetricScore::new(case.index as f64 / 10.0, None))
        }

        fn metadata(&self) -> MetricMetadata {
            MetricMetadata {
                name: "Gauge".to_string(),
                version: "1.0.0".to_string(),
                description: "For testing".to_string(),
                kind: MetricKind::Statistical,
                tags: vec![],
            }
        }
    }

    struct PanickingMetric;

    #[async_trait]
    impl Metric for PanickingMetric {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn evaluate(&self, case: &Case) -> Result<MetricScore, MetricError> {
            if case.index == 1 {
                panic!("boom on row {}", case.index);
            }
            Ok(MetricScore::new(1.0, None))
        }

        fn metadata(&self) -> MetricMetadata {
            MetricMetadata {
                name: "Panicky".to_string(),
                version: "1.0.0".to_string(),
                description: "For testing".to_string(),
                kind: MetricKind::Statistical,
                tags: vec![],
            }
        }
    }

    struct SlowMetric;

    #[async_trait]
    impl Metric for SlowMetric {
        fn name(&self) -> &str {
            "slow"
        }

        async fn evaluate(&self, _case: &Case) -> Result<MetricScore, MetricError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(MetricScore::new(1.0, None))
        }

        fn metadata(&self) -> MetricMetadata {
            MetricMetadata {
                name: "Slow".to_string(),
                version: "1.0.0".to_string(),
                description: "For testing".to_string(),
                kind: MetricKind::Statistical,
                tags: vec![],
            }
        }
    }

    fn tasks(metric: Arc<dyn Metric>, rows: usize, timeout_secs: Option<u64>) -> Vec<EvalTask> {
        (0..rows)
            .map(|row| EvalTask {
                row,
                metric_slot: 0,
                case: Arc::new(Case::new(row, "q", "r", "ref")),
                metric: Arc::clone(&metric),
                timeout_secs,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bounded_dispatcher_respects_limit() {
        let metric = Arc::new(GaugeMetric {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        let outcomes = BoundedDispatcher
            .dispatch(tasks(metric.clone(), 12, None), 3)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 12);
        assert!(metric.peak.load(Ordering::SeqCst) <= 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));

        let mut rows: Vec<usize> = outcomes.iter().map(|o| o.row).collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_panic_becomes_metric_error() {
        for dispatcher in [
            Arc::new(BoundedDispatcher) as Arc<dyn Dispatcher>,
            Arc::new(SequentialDispatcher) as Arc<dyn Dispatcher>,
        ] {
            let outcomes = dispatcher
                .dispatch(tasks(Arc::new(PanickingMetric), 3, None), 2)
                .await
                .unwrap();

            let panicked = outcomes.iter().find(|o| o.row == 1).unwrap();
            match &panicked.result {
                Err(MetricError::Panicked(msg)) => assert!(msg.contains("boom on row 1")),
                other => panic!("expected panic error, got {:?}", other),
            }
            assert_eq!(outcomes.iter().filter(|o| o.result.is_ok()).count(), 2);
        }
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let outcome = run_task(tasks(Arc::new(SlowMetric), 1, Some(1)).remove(0)).await;
        assert_eq!(outcome.result, Err(MetricError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_sequential_preserves_order() {
        let metric = Arc::new(GaugeMetric {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let outcomes = SequentialDispatcher
            .dispatch(tasks(metric.clone(), 4, None), 8)
            .await
            .unwrap();

        let rows: Vec<usize> = outcomes.iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        assert_eq!(metric.peak.load(Ordering::SeqCst), 1);
    }
}
