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

//! Core error definitions for the mart exporter.
//!
//! This module provides a centralized `ExportError` enum and a `Result` type
//! used throughout the application. Variants fall into two scopes:
//! run-scoped errors (configuration, connection, cancellation) abort the
//! whole run, while table-scoped errors only fail the table being exported.

use thiserror::Error;

/// Error types encountered during an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Connection Error for account {account} ({host}): {reason}")]
    ConnectionError {
        account: String,
        host: String,
        reason: String,
        /// Transport failures may be retried; rejected logins may not.
        retryable: bool,
    },

    #[error("Query failed for {table}: {reason}")]
    QueryError { table: String, reason: String },

    #[error("Query for {table} timed out after {secs}s")]
    Timeout { table: String, secs: u64 },

    #[error("Artifact generation failed: {0}")]
    ArtifactError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unexpected warehouse response: {0}")]
    ProtocolError(String),

    #[error("Export run cancelled")]
    Cancelled,
}

impl ExportError {
    /// Builds a configuration error naming every missing variable.
    pub fn missing_vars(names: &[&str]) -> Self {
        ExportError::ConfigError(format!("{} missing", names.join(", ")))
    }

    /// Attaches a table name to errors raised below the exporter, which
    /// don't know which table they were serving.
    pub fn for_table(self, table: &str) -> Self {
        match self {
            ExportError::QueryError { reason, .. } => ExportError::QueryError {
                table: table.to_string(),
                reason,
            },
            ExportError::Timeout { secs, .. } => ExportError::Timeout {
                table: table.to_string(),
                secs,
            },
            ExportError::ProtocolError(reason) => ExportError::QueryError {
                table: table.to_string(),
                reason,
            },
            ExportError::ArtifactError(reason) => {
                ExportError::ArtifactError(format!("{}: {}", table, reason))
            }
            ExportError::IoError(e) => {
                ExportError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", table, e)))
            }
            other => other,
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::ArtifactError(e.to_string())
    }
}

/// A specialized Result type for the mart exporter.
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vars_message() {
        let e = ExportError::missing_vars(&["SF_ROLE"]);
        assert_eq!(e.to_string(), "Configuration Error: SF_ROLE missing");

        let e = ExportError::missing_vars(&["SF_USER", "SF_ROLE"]);
        assert_eq!(e.to_string(), "Configuration Error: SF_USER, SF_ROLE missing");
    }

    #[test]
    fn test_for_table_fills_in_table_name() {
        let e = ExportError::Timeout {
            table: String::new(),
            secs: 30,
        }
        .for_table("mart_credit_trends");
        assert_eq!(
            e.to_string(),
            "Query for mart_credit_trends timed out after 30s"
        );

        let e = ExportError::ProtocolError("bad rowset".into()).for_table("A");
        assert!(matches!(e, ExportError::QueryError { ref table, .. } if table == "A"));

        let e = ExportError::ArtifactError("row 3 has 1 fields".into()).for_table("B");
        assert_eq!(e.to_string(), "Artifact generation failed: B: row 3 has 1 fields");
    }
}
