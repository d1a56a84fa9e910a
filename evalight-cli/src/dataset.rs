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

//! CSV datasets in, CSV results and JSON summaries out

use evalight_core::{Case, EvaluationRecord, Status, StatusDistribution, StatusParseError, Summary};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

const REQUIRED_COLUMNS: [&str; 3] = ["question", "response", "reference"];
const OVERALL_STATUS: &str = "overall_status";
const SCORE_SUFFIX: &str = "_score";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: {source}")]
    InvalidStatus {
        row: usize,
        source: StatusParseError,
    },

    #[error("Row {row}: {column} is not a number: {value:?}")]
    InvalidScore {
        row: usize,
        column: String,
        value: String,
    },
}

/// Load evaluation cases from a CSV file.
///
/// `question`, `response` and `reference` columns are required, `id` is
/// optional and anything else is ignored. When the `id` column exists every
/// case carries it, blank or not, so it survives into the output. Header
/// names are matched case-insensitively.
pub fn load_cases(path: &Path) -> Result<Vec<Case>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|&&name| column(name).is_none())
        .map(|name| name.to_string())
        .collect();
    let (Some(question), Some(response), Some(reference)) =
        (column("question"), column("response"), column("reference"))
    else {
        return Err(DatasetError::MissingColumns(missing));
    };
    let id = column("id");

    let mut cases = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let field = |pos: usize| record.get(pos).unwrap_or("").to_string();

        let mut case = Case::new(index, field(question), field(response), field(reference));
        if let Some(id) = id.map(field) {
            case = case.with_id(id);
        }
        cases.push(case);
    }

    info!("Loaded {} cases from {:?}", cases.len(), path);
    Ok(cases)
}

/// Write one output row per record.
///
/// Columns: `[id,] question, response, reference`, then for each metric
/// `{m}_score`, `{m}_status` and, with `details`, `{m}_detail`; finally
/// `overall_status`. A failed score is written as an empty cell.
pub fn write_records(
    path: &Path,
    metric_names: &[String],
    records: &[EvaluationRecord],
    details: bool,
) -> Result<(), DatasetError> {
    let with_id = records.iter().any(|r| r.case.id.is_some());
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<String> = Vec::new();
    if with_id {
        header.push("id".to_string());
    }
    header.extend(REQUIRED_COLUMNS.iter().map(|c| c.to_string()));
    for name in metric_names {
        header.push(format!("{name}{SCORE_SUFFIX}"));
        header.push(format!("{name}_status"));
        if details {
            header.push(format!("{name}_detail"));
        }
    }
    header.push(OVERALL_STATUS.to_string());
    writer.write_record(&header)?;

    for record in records {
        let case = &record.case;
        let mut row: Vec<String> = Vec::with_capacity(header.len());
        if with_id {
            row.push(case.id.clone().unwrap_or_default());
        }
        row.push(case.question.clone());
        row.push(case.response.clone());
        row.push(case.reference.clone());

        for name in metric_names {
            let result = record.result(name);
            row.push(
                result
                    .and_then(|r| r.score)
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            );
            row.push(
                result
                    .map(|r| r.status)
                    .unwrap_or(Status::Red)
                    .to_string(),
            );
            if details {
                row.push(result.and_then(|r| r.detail.clone()).unwrap_or_default());
            }
        }
        row.push(record.overall_status.to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    debug!("Wrote {} result rows to {:?}", records.len(), path);
    Ok(())
}

/// Write the run summary as pretty-printed JSON
pub fn write_summary(path: &Path, summary: &Summary) -> Result<(), DatasetError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

/// Aggregates recomputed from a results CSV
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsOverview {
    pub total: usize,
    pub distribution: StatusDistribution,

    /// Mean of every `*_score` column, in column order. Empty cells are
    /// skipped; columns with no values are left out.
    pub metric_means: Vec<(String, f64)>,
}

/// Read back a results CSV written by [`write_records`]
pub fn load_results(path: &Path) -> Result<ResultsOverview, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();

    let status_column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(OVERALL_STATUS))
        .ok_or_else(|| DatasetError::MissingColumns(vec![OVERALL_STATUS.to_string()]))?;
    let score_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter_map(|(pos, h)| {
            let h = h.trim().to_ascii_lowercase();
            h.strip_suffix(SCORE_SUFFIX)
                .filter(|metric| !metric.is_empty())
                .map(|metric| (pos, metric.to_string()))
        })
        .collect();

    let mut statuses = Vec::new();
    let mut sums = vec![(0.0f64, 0usize); score_columns.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let status: Status = record
            .get(status_column)
            .unwrap_or("")
            .parse()
            .map_err(|source| DatasetError::InvalidStatus { row, source })?;
        statuses.push(status);

        for ((pos, metric), (sum, count)) in score_columns.iter().zip(sums.iter_mut()) {
            let value = record.get(*pos).unwrap_or("").trim();
            if value.is_empty() {
                continue;
            }
            let score: f64 = value.parse().map_err(|_| DatasetError::InvalidScore {
                row,
                column: format!("{metric}{SCORE_SUFFIX}"),
                value: value.to_string(),
            })?;
            *sum += score;
            *count += 1;
        }
    }

    let metric_means = score_columns
        .into_iter()
        .zip(sums)
        .filter(|(_, (_, count))| *count > 0)
        .map(|((_, metric), (sum, count))| (metric, sum / count as f64))
        .collect();

    Ok(ResultsOverview {
        total: statuses.len(),
        distribution: StatusDistribution::from_statuses(statuses),
        metric_means,
    })
}
