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

//! Runner configuration
//!
//! Loaded with priority env > file > defaults. A TOML file mirrors the
//! struct layout:
//!
//! ```toml
//! metrics = "relevancy,rouge"
//!
//! [judge]
//! provider = "openai"
//! model = "gpt-4o-mini"
//!
//! [pipeline]
//! max_concurrent = 8
//!
//! [scoring.thresholds.relevancy]
//! green_min = 0.8
//! yellow_min = 0.5
//! ```

use evalight_core::metric_names;
use evalight_evals::judge::{Judge, LlmJudge};
use evalight_evals::llm_client::{AnthropicClient, LLMClient, OpenAIClient};
use evalight_evals::metrics::RougeMetric;
use evalight_evals::{
    CachedJudge, MetricRegistry, MetricSelection, PipelineConfig, RegistryError, ScorerConfig,
    ScorerConfigError, Thresholds,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Metrics computed without a judge
const STATISTICAL_METRICS: [&str; 1] = [metric_names::ROUGE];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Unknown LLM provider: {0:?} (expected openai or anthropic)")]
    UnknownProvider(String),

    #[error("No API key for provider {provider}; set {var}")]
    MissingApiKey {
        provider: Provider,
        var: &'static str,
    },

    #[error("pipeline.max_concurrent must be at least 1")]
    InvalidConcurrency,

    #[error(transparent)]
    Scoring(#[from] ScorerConfigError),

    #[error(transparent)]
    Selection(#[from] RegistryError),
}

/// Judge model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Environment variable holding this provider's API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => f.write_str("openai"),
            Provider::Anthropic => f.write_str("anthropic"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// LLM judge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeSettings {
    #[serde(default)]
    pub provider: Provider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Override the provider endpoint (proxies, local OpenAI-compatible servers)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Verdict cache lifetime; 0 disables caching
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            openai_api_key: None,
            anthropic_api_key: None,
            base_url: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl JudgeSettings {
    /// API key for the configured provider
    pub fn api_key(&self) -> Option<&str> {
        let key = match self.provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

/// Complete runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub judge: JudgeSettings,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub scoring: ScorerConfig,

    /// `all` or a comma-separated list of metric names
    #[serde(default = "default_metrics")]
    pub metrics: String,

    /// Where the results CSV is written
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_metrics() -> String {
    "all".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("evaluation_results.csv")
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            judge: JudgeSettings::default(),
            pipeline: PipelineConfig::default(),
            scoring: ScorerConfig::default(),
            metrics: default_metrics(),
            output_path: default_output_path(),
        }
    }
}

impl EvalConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - LLM_PROVIDER: `openai` or `anthropic` (default: openai)
    /// - MODEL_NAME: judge model (default: gpt-4)
    /// - LLM_BASE_URL: provider endpoint override
    /// - OPENAI_API_KEY / ANTHROPIC_API_KEY: provider credentials
    /// - METRICS_THRESHOLD_RELEVANCY: relevancy green bound (default: 0.7)
    /// - METRICS_THRESHOLD_CORRECTNESS: correctness green bound (default: 0.7)
    /// - METRICS_THRESHOLD_ROUGE: ROUGE green bound, yellow is 0.1 below (default: 0.5)
    /// - EVALIGHT_CONCURRENCY: max tasks in flight (default: 10)
    /// - OUTPUT_DIR: results CSV path (default: evaluation_results.csv)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Override fields from variables that `lookup` resolves.
    ///
    /// Unset variables leave the current value alone.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.judge.provider = provider.parse()?;
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.judge.model = model;
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            self.judge.base_url = Some(base_url);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.judge.openai_api_key = Some(key);
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.judge.anthropic_api_key = Some(key);
        }

        for (var, metric) in [
            ("METRICS_THRESHOLD_RELEVANCY", metric_names::RELEVANCY),
            ("METRICS_THRESHOLD_CORRECTNESS", metric_names::CORRECTNESS),
        ] {
            if let Some(value) = lookup(var) {
                let green_min = parse_env(var, &value)?;
                let yellow_min = self.scoring.thresholds_for(metric).yellow_min.min(green_min);
                self.scoring
                    .thresholds
                    .insert(metric.to_string(), Thresholds::new(green_min, yellow_min));
            }
        }

        if let Some(value) = lookup("METRICS_THRESHOLD_ROUGE") {
            let green_min: f64 = parse_env("METRICS_THRESHOLD_ROUGE", &value)?;
            self.scoring.thresholds.insert(
                metric_names::ROUGE.to_string(),
                Thresholds::new(green_min, (green_min - 0.1).max(0.0)),
            );
        }

        if let Some(value) = lookup("EVALIGHT_CONCURRENCY") {
            self.pipeline.max_concurrent = parse_env("EVALIGHT_CONCURRENCY", &value)?;
        }
        if let Some(path) = lookup("OUTPUT_DIR") {
            self.output_path = PathBuf::from(path);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;

        if self.pipeline.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        self.selection()?;
        Ok(())
    }

    pub fn selection(&self) -> Result<MetricSelection, ConfigError> {
        let selection: MetricSelection = self.metrics.parse()?;
        if let MetricSelection::Named(names) = &selection {
            if let Some(unknown) = names
                .iter()
                .find(|n| !metric_names::ALL.contains(&n.as_str()))
            {
                return Err(RegistryError::UnknownMetric(unknown.clone()).into());
            }
        }
        Ok(selection)
    }

    /// Whether the selected metrics need an LLM judge
    pub fn needs_judge(&self) -> Result<bool, ConfigError> {
        Ok(match self.selection()? {
            MetricSelection::All => true,
            MetricSelection::Named(names) => names
                .iter()
                .any(|n| !STATISTICAL_METRICS.contains(&n.as_str())),
        })
    }

    /// Build the judge stack: provider client, retrying judge, optional cache
    pub fn build_judge(&self) -> Result<Arc<dyn Judge>, ConfigError> {
        let settings = &self.judge;
        let api_key = settings
            .api_key()
            .ok_or(ConfigError::MissingApiKey {
                provider: settings.provider,
                var: settings.provider.api_key_var(),
            })?
            .to_string();

        let client: Arc<dyn LLMClient> = match settings.provider {
            Provider::OpenAI => {
                let client = OpenAIClient::new(api_key, settings.model.clone());
                match &settings.base_url {
                    Some(url) => Arc::new(client.with_base_url(url.clone())),
                    None => Arc::new(client),
                }
            }
            Provider::Anthropic => {
                let client = AnthropicClient::new(api_key, settings.model.clone());
                match &settings.base_url {
                    Some(url) => Arc::new(client.with_base_url(url.clone())),
                    None => Arc::new(client),
                }
            }
        };

        let judge: Arc<dyn Judge> = Arc::new(
            LlmJudge::new(client)
                .with_max_retries(settings.max_retries)
                .with_retry_backoff(Duration::from_millis(settings.retry_backoff_ms)),
        );

        if settings.cache_ttl_secs == 0 {
            return Ok(judge);
        }
        Ok(Arc::new(CachedJudge::new(judge, settings.cache_ttl_secs)))
    }

    /// Registry of the selected metrics, in selection order.
    ///
    /// A judge is only built, and an API key only required, when a selected
    /// metric is judged by an LLM.
    pub fn build_registry(&self) -> Result<MetricRegistry, ConfigError> {
        let selection = self.selection()?;
        let registry = if self.needs_judge()? {
            MetricRegistry::standard(self.build_judge()?)
        } else {
            MetricRegistry::new().with_metric(Arc::new(RougeMetric::new()))?
        };
        Ok(registry.select(&selection)?)
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
