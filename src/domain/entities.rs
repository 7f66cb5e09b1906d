// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Domain Entities
//!
//! The "Nouns" of the exporter: what a query returns, what a run is, and
//! what each table export produced.
//!
//! We use the `serde` crate (Serialize/Deserialize) so results and the run
//! report can be written out as JSON.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Format of the run directory name, e.g. `20250314_093000`.
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// What to do with the rest of the run when one table fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next table.
    #[default]
    Continue,
    /// Stop at the first failed table; the rest are skipped.
    FailFast,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Continue => write!(f, "continue"),
            FailurePolicy::FailFast => write!(f, "fail-fast"),
        }
    }
}

/// One column of a query result, as described by the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    /// Column name exactly as the warehouse reports it.
    pub name: String,
    /// Warehouse type name (e.g. "fixed", "text", "timestamp_ntz").
    pub raw_type: String,
    pub scale: Option<i64>,
}

/// A fully materialized query result.
///
/// Cells are already rendered to their CSV text form; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// `ExportRun` is created once per invocation and shared by every table.
#[derive(Debug, Clone)]
pub struct ExportRun {
    pub started_at: NaiveDateTime,
    pub output_dir: PathBuf,
}

impl ExportRun {
    /// Derives the run directory `<root>/<YYYYMMDD_HHMMSS>` from the run timestamp.
    pub fn new(output_root: &Path, started_at: NaiveDateTime) -> Self {
        let output_dir = output_root.join(started_at.format(RUN_STAMP_FORMAT).to_string());
        Self {
            started_at,
            output_dir,
        }
    }

    pub fn stamp(&self) -> String {
        self.started_at.format(RUN_STAMP_FORMAT).to_string()
    }
}

/// A CSV file written for one table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub table: String,
    pub path: PathBuf,
    pub rows: u64,
    pub bytes: u64,
}

/// Outcome of a single table export.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
    /// Never attempted: the run was cancelled or stopped early.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// `TaskResult` is the "Report Card" for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub table: String,
    pub status: TaskStatus,
    /// How many data rows were written (header excluded).
    pub rows: u64,
    /// Size of the written file in bytes.
    pub bytes: u64,
    /// How long it took (in seconds).
    pub duration: f64,
    pub output_file: Option<PathBuf>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(artifact: Artifact, duration: f64) -> Self {
        Self {
            table: artifact.table,
            status: TaskStatus::Success,
            rows: artifact.rows,
            bytes: artifact.bytes,
            duration,
            output_file: Some(artifact.path),
            error: None,
        }
    }

    pub fn failure(table: String, duration: f64, error: String) -> Self {
        Self {
            table,
            status: TaskStatus::Failed,
            rows: 0,
            bytes: 0,
            duration,
            output_file: None,
            error: Some(error),
        }
    }

    pub fn skipped(table: String, reason: &str) -> Self {
        Self {
            table,
            status: TaskStatus::Skipped,
            rows: 0,
            bytes: 0,
            duration: 0.0,
            output_file: None,
            error: Some(reason.to_string()),
        }
    }

    /// One summary line, e.g. `A: success (data/exports/.../A.csv, 12 rows)`.
    pub fn summary_line(&self) -> String {
        match self.status {
            TaskStatus::Success => format!(
                "{}: success ({}, {} rows)",
                self.table,
                self.output_file
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.rows
            ),
            TaskStatus::Failed | TaskStatus::Skipped => format!(
                "{}: {} ({})",
                self.table,
                self.status,
                self.error.as_deref().unwrap_or("unknown cause")
            ),
        }
    }
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
    Cancelled,
}

/// Everything the run driver knows once the last table is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_stamp: String,
    pub output_dir: PathBuf,
    pub status: RunStatus,
    pub results: Vec<TaskResult>,
    pub duration_seconds: f64,
}

impl RunReport {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn total_rows(&self) -> u64 {
        self.results.iter().map(|r| r.rows).sum()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
