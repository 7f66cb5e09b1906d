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

//! Infrastructure adapter for writing query results as CSV files on local disk.

use crate::domain::entities::{Artifact, ResultSet};
use crate::domain::errors::{ExportError, Result};
use crate::ports::artifact_port::ArtifactPort;
use csv::{QuoteStyle, WriterBuilder};
use log::debug;
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use tempfile::NamedTempFile;

/// Concrete implementation of `ArtifactPort` producing `<table>.csv`.
///
/// Output is plain RFC 4180 CSV: comma delimited, header row first, fields
/// quoted only when they contain a delimiter, quote or line break, NULL
/// written as an empty field.
///
/// Rows go to a temporary file in the target directory which is renamed
/// over the target only once fully written. A failed write drops the
/// temporary file, so readers never see a truncated CSV.
#[derive(Debug, Default, Clone)]
pub struct CsvArtifactAdapter;

impl CsvArtifactAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactPort for CsvArtifactAdapter {
    fn write_table(&self, table: &str, result: &ResultSet, output_dir: &Path) -> Result<Artifact> {
        fs::create_dir_all(output_dir)?;
        let target = output_dir.join(format!("{}.csv", table));

        let temp = NamedTempFile::new_in(output_dir)?;
        let buf_writer = BufWriter::with_capacity(128 * 1024, temp);
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Necessary)
            .from_writer(buf_writer);

        let width = result.columns.len();
        wtr.write_record(result.column_names())?;

        for (i, row) in result.rows.iter().enumerate() {
            if row.len() != width {
                return Err(ExportError::ArtifactError(format!(
                    "row {} has {} fields, expected {}",
                    i + 1,
                    row.len(),
                    width
                )));
            }
            wtr.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }

        wtr.flush()?;
        let buf_writer = wtr
            .into_inner()
            .map_err(|e| ExportError::ArtifactError(e.to_string()))?;
        let temp = buf_writer
            .into_inner()
            .map_err(|e| ExportError::IoError(e.into_error()))?;

        temp.as_file().sync_all()?;
        let bytes = temp.as_file().metadata()?.len();
        temp.persist(&target)
            .map_err(|e| ExportError::IoError(e.error))?;

        debug!("Wrote {} ({} bytes)", target.display(), bytes);

        Ok(Artifact {
            table: table.to_string(),
            path: target,
            rows: result.rows.len() as u64,
            bytes,
        })
    }
}
