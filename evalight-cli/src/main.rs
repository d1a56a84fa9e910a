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

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use evalight_cli::{dataset, EvalConfig, MetricsReport, QualityGate, SummaryReport};
use evalight_evals::{EvaluationPipeline, TrafficLightScorer};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "evalight", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a dataset and write per-row results
    Run(RunArgs),

    /// Check a results file against a minimum green percentage
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input CSV with question, response and reference columns
    #[arg(short, long)]
    data: PathBuf,

    /// Results CSV path (overrides config file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the run summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Metrics to run: "all" or a comma-separated list
    #[arg(short, long)]
    metrics: Option<String>,

    /// Maximum evaluations in flight (overrides config file)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Path to configuration file (TOML)
    #[arg(short, long, env = "EVALIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Add a {metric}_detail column after each status
    #[arg(long)]
    details: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Results CSV produced by `evalight run`
    #[arg(short, long)]
    results: PathBuf,

    /// Minimum percentage of green rows
    #[arg(long, default_value_t = 70.0)]
    min_green: f64,

    /// Where the metrics report is written
    #[arg(long, default_value = "metrics_report.txt")]
    report: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Check(args) => check(args),
    }
}

/// `RUST_LOG`, then `LOG_LEVEL`, then info for our own crates
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| "evalight_cli=info,evalight_evals=info".into())
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config =
        EvalConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(metrics) = args.metrics {
        config.metrics = metrics;
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.max_concurrent = concurrency;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    config.validate().context("Invalid configuration")?;

    let cases = dataset::load_cases(&args.data)
        .with_context(|| format!("Failed to load dataset {:?}", args.data))?;

    let registry = config
        .build_registry()
        .context("Failed to set up metrics")?;
    let scorer = TrafficLightScorer::new(config.scoring.clone())?;
    let pipeline = EvaluationPipeline::new(registry, scorer, config.pipeline.clone());

    let run = pipeline.run(cases).await.context("Evaluation failed")?;
    info!("Run {} finished", run.run_id);

    dataset::write_records(&config.output_path, &run.metric_names, &run.records, args.details)
        .with_context(|| format!("Failed to write results to {:?}", config.output_path))?;
    println!(
        "Evaluation complete. Results saved to {}",
        config.output_path.display()
    );

    if let Some(path) = &args.summary {
        dataset::write_summary(path, &run.summary)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        println!("Summary saved to {}", path.display());
    }

    print!("{}", SummaryReport(&run.summary));
    Ok(ExitCode::SUCCESS)
}

fn check(args: CheckArgs) -> Result<ExitCode> {
    let overview = dataset::load_results(&args.results)
        .with_context(|| format!("Failed to read results {:?}", args.results))?;

    std::fs::write(&args.report, MetricsReport(&overview).to_string())
        .with_context(|| format!("Failed to write report to {:?}", args.report))?;

    let outcome = QualityGate::new(args.min_green).evaluate(&overview);
    print!("{outcome}");

    Ok(if outcome.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
