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

//! The run driver: coordinates config, session and exporter for one run.
//!
//! A run is a single forward pass: open the session, create the timestamped
//! run directory, export each table in list order, release the session,
//! write `export_report.json`.

use crate::application::exporter::TableExporter;
use crate::application::session_scope::SessionScope;
use crate::config::{ConnectionConfig, ExportSettings};
use crate::domain::entities::{
    ExportRun, FailurePolicy, RunReport, RunStatus, TaskResult, TaskStatus,
};
use crate::domain::errors::{ExportError, Result};
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::session_port::{SessionProvider, WarehouseSession};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const REPORT_FILE: &str = "export_report.json";

/// Orchestrates the export of every configured table.
pub struct Orchestrator {
    session_provider: Arc<dyn SessionProvider>,
    artifact_port: Arc<dyn ArtifactPort>,
    connection: ConnectionConfig,
    settings: ExportSettings,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        session_provider: Arc<dyn SessionProvider>,
        artifact_port: Arc<dyn ArtifactPort>,
        connection: ConnectionConfig,
        settings: ExportSettings,
    ) -> Self {
        Self {
            session_provider,
            artifact_port,
            connection,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` as the cancellation signal. Once it is set no further
    /// table is started.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Runs the export. `started_at` names the run directory.
    ///
    /// Returns `Err` only for run-scoped failures (connection, run directory
    /// creation); table failures are recorded in the report.
    pub fn run(&self, started_at: NaiveDateTime) -> Result<RunReport> {
        let start_time = Instant::now();
        info!(
            "Starting export of {} tables from {}.{} (failure policy: {})",
            self.settings.tables.len(),
            self.connection.database,
            self.connection.schema,
            self.settings.failure_policy
        );

        if self.cancel.load(Ordering::SeqCst) {
            return Err(ExportError::Cancelled);
        }

        let mut scope = SessionScope::acquire(
            self.session_provider.as_ref(),
            &self.connection,
            self.settings.connect_retries,
            self.settings.connect_backoff(),
        )?;

        let run = ExportRun::new(Path::new(&self.settings.output_dir), started_at);
        std::fs::create_dir_all(&run.output_dir)?;
        info!("Writing to {}", run.output_dir.display());

        let (results, cancelled) = self.export_tables(scope.session(), &run);

        if let Err(e) = scope.release() {
            warn!("Failed to close warehouse session: {}", e);
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if results.iter().any(|r| r.status == TaskStatus::Failed) {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };

        let report = RunReport {
            run_stamp: run.stamp(),
            output_dir: run.output_dir.clone(),
            status,
            results,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        };

        if let Err(e) = self.write_report(&report) {
            warn!("Could not write {}: {}", REPORT_FILE, e);
        }

        Ok(report)
    }

    /// Exports tables one by one in list order. Returns the per-table
    /// results and whether the run was cancelled.
    fn export_tables(
        &self,
        session: &mut dyn WarehouseSession,
        run: &ExportRun,
    ) -> (Vec<TaskResult>, bool) {
        let exporter = TableExporter::new(
            self.artifact_port.clone(),
            &self.connection,
            self.settings.query_timeout(),
        );

        let mut results = Vec::with_capacity(self.settings.tables.len());
        let mut skip_reason: Option<&str> = None;
        let mut cancelled = false;

        for table in &self.settings.tables {
            if skip_reason.is_none() && self.cancel.load(Ordering::SeqCst) {
                warn!("Cancellation requested, not starting {}", table);
                skip_reason = Some("run cancelled");
                cancelled = true;
            }
            if let Some(reason) = skip_reason {
                results.push(TaskResult::skipped(table.clone(), reason));
                continue;
            }

            info!("Exporting {}", table);
            let table_start = Instant::now();
            match exporter.export(table, session, &run.output_dir) {
                Ok(artifact) => {
                    info!(
                        "Exported {} -> {} ({} rows)",
                        table,
                        artifact.path.display(),
                        artifact.rows
                    );
                    results.push(TaskResult::success(
                        artifact,
                        table_start.elapsed().as_secs_f64(),
                    ));
                }
                Err(e) => {
                    error!("Table {} failed: {}", table, e);
                    results.push(TaskResult::failure(
                        table.clone(),
                        table_start.elapsed().as_secs_f64(),
                        e.to_string(),
                    ));
                    if self.settings.failure_policy == FailurePolicy::FailFast {
                        skip_reason = Some("not attempted after earlier failure");
                    }
                }
            }
        }

        (results, cancelled)
    }

    fn write_report(&self, report: &RunReport) -> Result<()> {
        let json = json!({
            "summary": {
                "run": report.run_stamp,
                "status": report.status,
                "total_tables": report.results.len(),
                "success": report.count(TaskStatus::Success),
                "failed": report.count(TaskStatus::Failed),
                "skipped": report.count(TaskStatus::Skipped),
                "total_rows": report.total_rows(),
                "total_duration_seconds": report.duration_seconds,
            },
            "details": report.results
        });

        let file = std::fs::File::create(report.output_dir.join(REPORT_FILE))?;
        serde_json::to_writer_pretty(file, &json)
            .map_err(|e| ExportError::ArtifactError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        result_set, test_connection, MockProvider, TableBehavior,
    };
    use crate::domain::entities::{Artifact, ResultSet};
    use crate::infrastructure::local_storage::csv_artifact_adapter::CsvArtifactAdapter;
    use chrono::NaiveDate;
    use std::fs;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 1)
            .unwrap()
    }

    fn settings(out_dir: &Path, tables: &[&str]) -> ExportSettings {
        ExportSettings {
            output_dir: out_dir.to_str().unwrap().to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            connect_backoff_ms: 0,
            ..ExportSettings::default()
        }
    }

    fn orchestrator(provider: Arc<MockProvider>, settings: ExportSettings) -> Orchestrator {
        Orchestrator::new(
            provider,
            Arc::new(CsvArtifactAdapter::new()),
            test_connection(),
            settings,
        )
    }

    fn rows(n: usize) -> TableBehavior {
        let values: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let row_refs: Vec<Vec<Option<&str>>> =
            values.iter().map(|v| vec![Some(v.as_str())]).collect();
        let slices: Vec<&[Option<&str>]> = row_refs.iter().map(|r| r.as_slice()).collect();
        TableBehavior::Rows(result_set(&["N"], &slices))
    }

    #[test]
    fn test_orchestrator_run() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(vec![
            ("A", rows(2)),
            ("B", rows(3)),
            ("C", rows(0)),
        ]));

        let report = orchestrator(provider.clone(), settings(temp_dir.path(), &["c", "a", "b"]))
            .run(stamp())
            .unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.output_dir, temp_dir.path().join("20250131_235901"));

        // one query per table, in list order
        let queries = provider.log.queries();
        assert_eq!(queries.len(), 3);
        assert!(queries[0].ends_with("\"C\""));
        assert!(queries[1].ends_with("\"A\""));
        assert!(queries[2].ends_with("\"B\""));

        let tables: Vec<&str> = report.results.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(tables, vec!["c", "a", "b"]);
        assert_eq!(report.total_rows(), 5);

        let csv = fs::read_to_string(report.output_dir.join("b.csv")).unwrap();
        assert_eq!(csv, "N\n0\n1\n2\n");
        assert!(report.output_dir.join(REPORT_FILE).exists());
        assert_eq!(provider.log.closes(), 1);
    }

    #[test]
    fn test_failed_table_does_not_stop_the_run() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(vec![
            ("A", rows(1)),
            ("B", TableBehavior::Fail("driver exploded".into())),
            ("C", rows(1)),
        ]));

        let report = orchestrator(provider.clone(), settings(temp_dir.path(), &["A", "B", "C"]))
            .run(stamp())
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.output_dir.join("A.csv").exists());
        assert!(!report.output_dir.join("B.csv").exists());
        assert!(report.output_dir.join("C.csv").exists());

        let lines: Vec<String> = report.results.iter().map(|r| r.summary_line()).collect();
        assert!(lines[0].starts_with("A: success"));
        assert_eq!(lines[1], "B: failed (Query failed for B: driver exploded)");
        assert_eq!(provider.log.closes(), 1);
    }

    #[test]
    fn test_fail_fast_skips_the_rest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(vec![
            ("A", TableBehavior::Fail("boom".into())),
            ("B", rows(1)),
        ]));
        let mut s = settings(temp_dir.path(), &["A", "B"]);
        s.failure_policy = FailurePolicy::FailFast;

        let report = orchestrator(provider.clone(), s).run(stamp()).unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.results[1].status, TaskStatus::Skipped);
        assert_eq!(provider.log.queries().len(), 1);
        assert_eq!(provider.log.closes(), 1);
    }

    #[test]
    fn test_connection_failure_creates_no_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("exports");
        let provider = Arc::new(MockProvider::new(vec![]).failing_logins(10, false));

        let err = orchestrator(provider.clone(), settings(&out, &["A"]))
            .run(stamp())
            .unwrap_err();

        assert!(matches!(err, ExportError::ConnectionError { .. }));
        assert!(!out.exists());
        assert!(provider.log.queries().is_empty());
    }

    #[test]
    fn test_cancellation_stops_before_next_table() {
        struct CancelAfterFirst {
            inner: CsvArtifactAdapter,
            flag: Arc<AtomicBool>,
        }
        impl ArtifactPort for CancelAfterFirst {
            fn write_table(&self, table: &str, result: &ResultSet, dir: &Path) -> Result<Artifact> {
                let artifact = self.inner.write_table(table, result, dir)?;
                self.flag.store(true, Ordering::SeqCst);
                Ok(artifact)
            }
        }

        let temp_dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let provider = Arc::new(MockProvider::new(vec![("A", rows(1)), ("B", rows(1))]));
        let orchestrator = Orchestrator::new(
            provider.clone(),
            Arc::new(CancelAfterFirst {
                inner: CsvArtifactAdapter::new(),
                flag: flag.clone(),
            }),
            test_connection(),
            settings(temp_dir.path(), &["A", "B"]),
        )
        .with_cancel_flag(flag);

        let report = orchestrator.run(stamp()).unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.results[0].status, TaskStatus::Success);
        assert_eq!(report.results[1].status, TaskStatus::Skipped);
        assert_eq!(fs::read_to_string(report.output_dir.join("A.csv")).unwrap(), "N\n0\n");
        assert_eq!(provider.log.queries().len(), 1);
        assert_eq!(provider.log.closes(), 1);
    }

    #[test]
    fn test_session_closed_when_export_panics() {
        struct Exploding;
        impl ArtifactPort for Exploding {
            fn write_table(&self, _: &str, _: &ResultSet, _: &Path) -> Result<Artifact> {
                panic!("disk on fire");
            }
        }

        let temp_dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new(vec![("A", rows(1))]));
        let orchestrator = Orchestrator::new(
            provider.clone(),
            Arc::new(Exploding),
            test_connection(),
            settings(temp_dir.path(), &["A"]),
        );

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| orchestrator.run(stamp())));

        assert!(outcome.is_err());
        assert_eq!(provider.log.closes(), 1);
    }

    #[test]
    fn test_same_data_same_stamp_gives_identical_files() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let table = TableBehavior::Rows(result_set(
            &["K", "V"],
            &[&[Some("x"), Some("a,b")], &[Some("y"), None]],
        ));

        let mut reports = Vec::new();
        for dir in [&first, &second] {
            let provider = Arc::new(MockProvider::new(vec![("T", table.clone())]));
            reports.push(
                orchestrator(provider, settings(dir.path(), &["T"]))
                    .run(stamp())
                    .unwrap(),
            );
        }

        assert_eq!(
            fs::read(reports[0].output_dir.join("T.csv")).unwrap(),
            fs::read(reports[1].output_dir.join("T.csv")).unwrap()
        );
    }
}
