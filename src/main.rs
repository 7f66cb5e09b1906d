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

//! # Mart Exporter
//!
//! Pulls every configured mart table out of Snowflake into one CSV file per
//! table, grouped in a timestamped run directory for BI tools to pick up.
//!
//! This application follows the **Hexagonal Architecture** (Ports and Adapters)
//! to keep the run logic apart from Snowflake and the filesystem.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use crate::application::orchestrator::Orchestrator;
use crate::application::runtime::{RuntimeContext, EXIT_CANCELLED};
use crate::config::{CliArgs, ConnectionConfig, ExportSettings};
use crate::domain::entities::{RunReport, RunStatus, TaskStatus};
use crate::domain::errors::{ExportError, Result};
use clap::Parser;
use log::{error, info, warn};
use std::process;

const EXIT_OK: i32 = 0;
const EXIT_TABLES_FAILED: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_CONNECTION: i32 = 3;

fn main() {
    // 1. Initialize Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    process::exit(run(&args));
}

fn run(args: &CliArgs) -> i32 {
    if let Err(e) = config::load_env_file(args.env_file.as_deref()) {
        return fail(&e);
    }
    run_with(args, |key| std::env::var(key).ok(), RuntimeContext::init)
}

fn run_with<L, R>(args: &CliArgs, lookup: L, init_runtime: R) -> i32
where
    L: Fn(&str) -> Option<String>,
    R: FnOnce() -> Result<RuntimeContext>,
{
    // 3. Load Config. Nothing touches the network or the disk before this passes.
    let settings = match ExportSettings::load(args) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let connection = match ConnectionConfig::from_lookup(lookup) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // 4. Initialize Hexagonal Components
    let runtime = match init_runtime() {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // 5. Run Orchestrator
    let orchestrator = Orchestrator::new(
        runtime.session_provider,
        runtime.artifact_port,
        connection,
        settings,
    )
    .with_cancel_flag(runtime.cancel);

    match orchestrator.run(chrono::Local::now().naive_local()) {
        Ok(report) => {
            for line in summary_lines(&report) {
                println!("{}", line);
            }
            if report.is_success() {
                info!(
                    "Export finished. {}/{} tables successful, {} rows.",
                    report.count(TaskStatus::Success),
                    report.results.len(),
                    report.total_rows()
                );
            } else {
                warn!(
                    "Export finished with status {:?}. {}/{} tables successful.",
                    report.status,
                    report.count(TaskStatus::Success),
                    report.results.len()
                );
            }
            exit_code_for_report(&report)
        }
        Err(e) => fail(&e),
    }
}

fn fail(e: &ExportError) -> i32 {
    error!("{}", e);
    exit_code_for_error(e)
}

fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Export run {} -> {}",
        report.run_stamp,
        report.output_dir.display()
    )];
    for r in &report.results {
        let mark = match r.status {
            TaskStatus::Success => "✔",
            TaskStatus::Failed => "✘",
            TaskStatus::Skipped => "-",
        };
        lines.push(format!("  {} {}", mark, r.summary_line()));
    }
    let status = match report.status {
        RunStatus::Success => "SUCCESS",
        RunStatus::Failed => "FAILED",
        RunStatus::Cancelled => "CANCELLED",
    };
    lines.push(format!(
        "Status: {} ({}/{} tables exported)",
        status,
        report.count(TaskStatus::Success),
        report.results.len()
    ));
    lines
}

fn exit_code_for_report(report: &RunReport) -> i32 {
    match report.status {
        RunStatus::Success => EXIT_OK,
        RunStatus::Failed => EXIT_TABLES_FAILED,
        RunStatus::Cancelled => EXIT_CANCELLED,
    }
}

fn exit_code_for_error(e: &ExportError) -> i32 {
    match e {
        ExportError::ConfigError(_) => EXIT_CONFIG,
        ExportError::ConnectionError { .. } => EXIT_CONNECTION,
        ExportError::Cancelled => EXIT_CANCELLED,
        _ => EXIT_TABLES_FAILED,
    }
}
