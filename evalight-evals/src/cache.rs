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

//! Caching layer for judge verdicts

use crate::judge::{Judge, JudgeError, JudgeRequest, JudgeVerdict};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Judge wrapper that memoizes verdicts for identical requests.
///
/// Only successful verdicts are cached; errors always reach the inner judge
/// again on the next call.
pub struct CachedJudge {
    inner: Arc<dyn Judge>,
    cache: Cache<JudgeRequest, JudgeVerdict>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl CachedJudge {
    /// Create a new cache with specified TTL in seconds
    pub fn new(inner: Arc<dyn Judge>, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner,
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop every cached verdict
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

#[async_trait]
impl Judge for CachedJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, JudgeError> {
        if let Some(verdict) = self.cache.get(request).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(verdict);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let verdict = self.inner.judge(request).await?;
        self.cache.insert(request.clone(), verdict.clone()).await;
        Ok(verdict)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}
