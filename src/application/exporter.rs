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

//! # Table Exporter
//!
//! Handles the "Extract and Save" operation for a single table: build the
//! full-table query, run it on the session, hand the result to the artifact
//! port.
//!
//! ## Name resolution
//! Queries are always fully qualified: `"<DATABASE>"."<SCHEMA>"."<TABLE>"`.
//! Each part follows Snowflake's rule for unquoted identifiers: a plain name
//! (`[A-Za-z_][A-Za-z0-9_$]*`) resolves to its upper-case form, so
//! `mart_credit_summary` and `MART_CREDIT_SUMMARY` reach the same table.
//! Names with any other character keep their exact case. The resolved name
//! is then quoted so that reserved words and special characters are safe.

use crate::config::ConnectionConfig;
use crate::domain::entities::Artifact;
use crate::domain::errors::Result;
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::session_port::WarehouseSession;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct TableExporter {
    artifact_port: Arc<dyn ArtifactPort>,
    database: String,
    schema: String,
    query_timeout: Duration,
}

impl TableExporter {
    pub fn new(
        artifact_port: Arc<dyn ArtifactPort>,
        connection: &ConnectionConfig,
        query_timeout: Duration,
    ) -> Self {
        Self {
            artifact_port,
            database: connection.database.clone(),
            schema: connection.schema.clone(),
            query_timeout,
        }
    }

    /// `SELECT *` over the fully qualified table.
    pub fn build_query(&self, table: &str) -> String {
        format!(
            "SELECT * FROM {}.{}.{}",
            quote_identifier(&self.database),
            quote_identifier(&self.schema),
            quote_identifier(table)
        )
    }

    /// Exports `table` to `<output_dir>/<table>.csv`.
    ///
    /// Every error comes back naming the table.
    pub fn export(
        &self,
        table: &str,
        session: &mut dyn WarehouseSession,
        output_dir: &Path,
    ) -> Result<Artifact> {
        let sql = self.build_query(table);
        debug!("{}: {}", table, sql);

        let result = session
            .query(&sql, self.query_timeout)
            .map_err(|e| e.for_table(table))?;
        debug!("{}: fetched {} rows", table, result.row_count());

        self.artifact_port
            .write_table(table, &result, output_dir)
            .map_err(|e| e.for_table(table))
    }
}

/// Resolves and quotes one identifier.
pub fn quote_identifier(name: &str) -> String {
    let resolved = if is_plain_identifier(name) {
        name.to_uppercase()
    } else {
        name.to_string()
    };
    format!("\"{}\"", resolved.replace('"', "\"\""))
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
