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

//! Request and response bodies of the Snowflake session REST endpoints.

use crate::domain::entities::ColumnMetadata;
use crate::domain::errors::{ExportError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Server codes meaning "query accepted, still running".
pub const QUERY_IN_PROGRESS: &str = "333333";
pub const QUERY_IN_PROGRESS_ASYNC: &str = "333334";
/// Statement cancelled for reaching its statement or warehouse timeout.
pub const STATEMENT_TIMED_OUT: &str = "000630";

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub data: LoginData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LoginData<'a> {
    pub client_app_id: &'a str,
    pub client_app_version: &'a str,
    pub account_name: &'a str,
    pub login_name: &'a str,
    pub password: &'a str,
    pub session_parameters: HashMap<&'a str, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub token: String,
    pub session_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub async_exec: bool,
    pub sequence_id: u64,
    pub parameters: HashMap<&'a str, Value>,
}

/// Every endpoint answers with this envelope. `data` is kept untyped because
/// failed calls put a differently shaped object (or nothing) there.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    pub code: Option<String>,
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl Envelope {
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        )
    }

    pub fn is_statement_timeout(&self) -> bool {
        self.code.as_deref() == Some(STATEMENT_TIMED_OUT)
    }

    /// `code: message`, for error reports.
    pub fn describe(&self) -> String {
        format!(
            "{}: {}",
            self.code.as_deref().unwrap_or("no code"),
            self.message.as_deref().unwrap_or("no message")
        )
    }

    /// Decodes `data` into `T`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        let data = self
            .data
            .ok_or_else(|| ExportError::ProtocolError("response has no data".into()))?;
        serde_json::from_value(data).map_err(|e| ExportError::ProtocolError(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub scale: Option<i64>,
}

impl From<&RowType> for ColumnMetadata {
    fn from(r: &RowType) -> Self {
        ColumnMetadata {
            name: r.name.clone(),
            raw_type: r.type_name.to_lowercase(),
            scale: r.scale,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub url: String,
    pub row_count: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    pub query_id: Option<String>,
    #[serde(default)]
    pub rowtype: Vec<RowType>,
    #[serde(default)]
    pub rowset: Vec<Vec<Value>>,
    pub total: Option<u64>,
    #[serde(default)]
    pub chunks: Vec<ChunkInfo>,
    pub chunk_headers: Option<HashMap<String, String>>,
    /// Key for SSE-C encrypted chunks when no `chunkHeaders` are given.
    pub qrmk: Option<String>,
    pub query_result_format: Option<String>,
    pub get_result_url: Option<String>,
}

/// Turns one JSON cell into its raw text. JSON result sets carry every
/// value as a string or null; anything else is kept as its JSON text.
pub fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
