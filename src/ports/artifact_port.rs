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

//! # Artifact Port
//!
//! Port for turning a query result into a file on disk.

use crate::domain::entities::{Artifact, ResultSet};
use crate::domain::errors::Result;
use std::path::Path;

/// Writes one table's result set as a single file.
pub trait ArtifactPort: Send + Sync {
    /// Writes `result` for `table` into `output_dir` and returns what was written.
    ///
    /// Implementations must be all-or-nothing: on error no file is left at
    /// the target path.
    fn write_table(&self, table: &str, result: &ResultSet, output_dir: &Path) -> Result<Artifact>;
}
