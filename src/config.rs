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

//! # Configuration
//!
//! Two kinds of configuration feed a run:
//! 1. **Connection config**: the seven `SF_*` environment variables. All are
//!    required; nothing is defaulted.
//! 2. **Export settings**: table list, output root, timeouts and failure
//!    policy. Built-in defaults, optionally replaced by a YAML/JSON file and
//!    then by CLI flags.

use crate::application::exporter::quote_identifier;
use crate::domain::entities::FailurePolicy;
use crate::domain::errors::{ExportError, Result};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

pub const ENV_ACCOUNT: &str = "SF_ACCOUNT";
pub const ENV_USER: &str = "SF_USER";
pub const ENV_PASSWORD: &str = "SF_PASSWORD";
pub const ENV_WAREHOUSE: &str = "SF_WAREHOUSE";
pub const ENV_DATABASE: &str = "SF_DATABASE";
pub const ENV_SCHEMA: &str = "SF_SCHEMA";
pub const ENV_ROLE: &str = "SF_ROLE";
/// Optional base URL override (private link, tests).
pub const ENV_HOST: &str = "SF_HOST";

/// Required variables, in the order they are reported when missing.
pub const REQUIRED_VARS: [&str; 7] = [
    ENV_ACCOUNT,
    ENV_USER,
    ENV_PASSWORD,
    ENV_WAREHOUSE,
    ENV_DATABASE,
    ENV_SCHEMA,
    ENV_ROLE,
];

/// Mart tables exported when no table list is configured.
pub const DEFAULT_TABLES: [&str; 6] = [
    "mart_credit_summary",
    "mart_top_recipients",
    "mart_credit_distribution",
    "mart_credit_trends",
    "mart_credit_utilization_rate",
    "mart_credits_by_industry",
];

/// Everything needed to open a warehouse session. Built once, never mutated.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    pub account: String,
    pub user: String,
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: String,
    pub host: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .finish()
    }
}

impl ConnectionConfig {
    /// Reads the connection config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the connection config through `lookup`.
    ///
    /// Empty or whitespace-only values count as missing. Every missing
    /// variable is reported, not just the first.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let values: Vec<Option<String>> = REQUIRED_VARS.iter().map(|k| read(*k)).collect();
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(ExportError::missing_vars(&missing));
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            account: next(),
            user: next(),
            password: next(),
            warehouse: next(),
            database: next(),
            schema: next(),
            role: next(),
            host: read(ENV_HOST).map(|h| h.trim_end_matches('/').to_string()),
        })
    }

    /// Base URL of the account, e.g. `https://xy12345.us-east-1.snowflakecomputing.com`.
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(h) => h.clone(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

/// Loads a `.env` file into the process environment.
///
/// Variables already set in the environment are left alone. With no explicit
/// path a missing `./.env` is fine; an explicit path must exist.
pub fn load_env_file(path: Option<&str>) -> Result<()> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|_| ()),
        None => dotenvy::dotenv().map(|_| ()),
    };
    match loaded {
        Ok(()) => Ok(()),
        Err(e) if path.is_none() && e.not_found() => Ok(()),
        Err(e) => Err(ExportError::ConfigError(format!(
            "could not load env file {}: {}",
            path.unwrap_or(".env"),
            e
        ))),
    }
}

/// Settings that shape the run (not the connection).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    /// Root under which each run creates its timestamped directory.
    pub output_dir: String,
    /// Tables to export, in order.
    pub tables: Vec<String>,
    pub query_timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    /// Extra login attempts after a transport failure.
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: "data/exports".to_string(),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            query_timeout_secs: 300,
            failure_policy: FailurePolicy::Continue,
            connect_retries: 1,
            connect_backoff_ms: 2000,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to a settings file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    pub env_file: Option<String>,

    /// Root directory for run output
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Table to export; repeat to export several. Replaces the configured list.
    #[arg(long = "table")]
    pub tables: Vec<String>,

    /// Per-table query timeout in seconds
    #[arg(long)]
    pub query_timeout: Option<u64>,

    /// Stop at the first failed table instead of continuing
    #[arg(long)]
    pub fail_fast: bool,
}

impl ExportSettings {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ExportError::ConfigError(format!("cannot open {}: {}", path, e)))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ExportError::ConfigError(format!("cannot read {}: {}", path, e)))?;

        let settings = if path.ends_with(".json") {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&contents).map_err(|e| e.to_string())
        };

        settings.map_err(|e| {
            ExportError::ConfigError(format!("invalid settings file {}: {}", path, e))
        })
    }

    /// Builds the settings for this invocation: defaults, then the settings
    /// file if given, then CLI overrides.
    pub fn load(args: &CliArgs) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.merge_cli(args);
        settings.validate()?;
        Ok(settings)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(o) = &args.output_dir {
            self.output_dir = o.clone();
        }
        if !args.tables.is_empty() {
            self.tables = args.tables.clone();
        }
        if let Some(t) = args.query_timeout {
            self.query_timeout_secs = t;
        }
        if args.fail_fast {
            self.failure_policy = FailurePolicy::FailFast;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.trim().is_empty() {
            return Err(ExportError::ConfigError("output_dir is empty".into()));
        }
        if self.tables.is_empty() {
            return Err(ExportError::ConfigError("no tables to export".into()));
        }
        if self.query_timeout_secs == 0 {
            return Err(ExportError::ConfigError("query_timeout_secs must be positive".into()));
        }

        // Keyed on the resolved identifier, folded so that output files
        // cannot collide on a case-insensitive filesystem either.
        let mut seen: HashMap<String, &str> = HashMap::new();
        for table in &self.tables {
            validate_table_identifier(table)?;
            let key = quote_identifier(table).to_lowercase();
            if let Some(first) = seen.insert(key, table.as_str()) {
                return Err(ExportError::ConfigError(format!(
                    "tables {} and {} name the same table",
                    first, table
                )));
            }
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}

/// A table identifier doubles as a file name, so it must be safe as one.
pub fn validate_table_identifier(table: &str) -> Result<()> {
    let bad = |why: &str| {
        Err(ExportError::ConfigError(format!(
            "invalid table name {:?}: {}",
            table, why
        )))
    };

    if table.trim().is_empty() {
        return bad("empty");
    }
    if table.contains(['/', '\\', '\0']) {
        return bad("contains a path separator");
    }
    if table == "." || table == ".." {
        return bad("not a file name");
    }
    Ok(())
}
