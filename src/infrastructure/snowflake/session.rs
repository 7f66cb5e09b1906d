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

//! Snowflake session adapter.
//!
//! Talks to the same REST endpoints the official connectors use:
//! 1. `POST /session/v1/login-request` trades user + password for a session token.
//! 2. `POST /queries/v1/query-request` runs a statement. Small results come
//!    back inline (`rowset`), larger ones as a list of chunk URLs that are
//!    downloaded one after the other.
//! 3. `POST /session?delete=true` ends the session.
//!
//! The session asks for JSON result sets at login, so every cell arrives as
//! a string and goes through `value_format` before landing in a `ResultSet`.

use super::value_format::format_value;
use super::wire::{
    cell_text, ChunkInfo, Envelope, LoginData, LoginRequest, LoginResponseData, QueryRequest,
    QueryResponseData,
};
use crate::config::ConnectionConfig;
use crate::domain::entities::{ColumnMetadata, ResultSet};
use crate::domain::errors::{ExportError, Result};
use crate::ports::session_port::{SessionProvider, WarehouseSession};
use flate2::read::GzDecoder;
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

const CLIENT_APP_ID: &str = env!("CARGO_PKG_NAME");
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const SNOWFLAKE_ACCEPT: &str = "application/snowflake";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(60);
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens `SnowflakeSession`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeSessionProvider;

impl SessionProvider for SnowflakeSessionProvider {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn WarehouseSession>> {
        Ok(Box::new(SnowflakeSession::login(config)?))
    }
}

/// One authenticated Snowflake session.
pub struct SnowflakeSession {
    client: Client,
    base_url: String,
    token: String,
    sequence_id: u64,
    closed: bool,
}

impl SnowflakeSession {
    /// Logs in with the user/password pair from `config`.
    pub fn login(config: &ConnectionConfig) -> Result<Self> {
        let base_url = config.base_url();
        let conn_err = |reason: String, retryable: bool| ExportError::ConnectionError {
            account: config.account.clone(),
            host: base_url.clone(),
            reason,
            retryable,
        };

        let client = Client::builder()
            .user_agent(format!("{}/{}", CLIENT_APP_ID, CLIENT_APP_VERSION))
            .build()
            .map_err(|e| conn_err(format!("cannot build HTTP client: {}", e), false))?;

        let mut session_parameters = HashMap::new();
        session_parameters.insert("QUERY_RESULT_FORMAT", json!("JSON"));

        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: account_name(&config.account),
                login_name: &config.user,
                password: &config.password,
                session_parameters,
            },
        };

        let request_id = Uuid::new_v4().to_string();
        let response = client
            .post(format!("{}/session/v1/login-request", base_url))
            .query(&[
                ("databaseName", config.database.as_str()),
                ("schemaName", config.schema.as_str()),
                ("warehouse", config.warehouse.as_str()),
                ("roleName", config.role.as_str()),
                ("request_id", request_id.as_str()),
            ])
            .header(ACCEPT, "application/json")
            .timeout(LOGIN_TIMEOUT)
            .json(&body)
            .send()
            .map_err(|e| conn_err(e.to_string(), true))?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            return Err(conn_err(format!("login returned HTTP {}", status), retryable));
        }

        let envelope: Envelope = response
            .json()
            .map_err(|e| conn_err(format!("unreadable login response: {}", e), false))?;
        if !envelope.success {
            return Err(conn_err(format!("login rejected ({})", envelope.describe()), false));
        }
        let data: LoginResponseData = envelope
            .into_data()
            .map_err(|e| conn_err(e.to_string(), false))?;

        info!(
            "Opened Snowflake session {} as {} (warehouse {}, role {})",
            data.session_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
            config.user,
            config.warehouse,
            config.role
        );

        Ok(Self {
            client,
            base_url,
            token: data.token,
            sequence_id: 0,
            closed: false,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("Snowflake Token=\"{}\"", self.token))
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
    }

    /// Sends a Snowflake API call, bounded by what is left until `deadline`.
    fn send(
        &self,
        request: RequestBuilder,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Envelope> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timeout_error(timeout));
        }

        let response = self
            .authorized(request)
            .timeout(remaining)
            .send()
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(query_error(format!("warehouse returned HTTP {}", status)));
        }
        response.json().map_err(|e| transport_error(e, timeout))
    }

    /// Turns a finished query response into a `ResultSet`, downloading any
    /// remaining chunks.
    fn materialize(
        &self,
        data: QueryResponseData,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<ResultSet> {
        if let Some(format) = &data.query_result_format {
            if !format.eq_ignore_ascii_case("json") {
                return Err(ExportError::ProtocolError(format!(
                    "unsupported result format {}",
                    format
                )));
            }
        }

        let columns: Vec<ColumnMetadata> = data.rowtype.iter().map(ColumnMetadata::from).collect();
        let mut rows = Vec::with_capacity(data.rowset.len());
        for raw in data.rowset {
            rows.push(render_row(raw, &columns)?);
        }

        for (i, chunk) in data.chunks.iter().enumerate() {
            let chunk_rows = self.fetch_chunk(
                chunk,
                data.chunk_headers.as_ref(),
                data.qrmk.as_deref(),
                deadline,
                timeout,
            )?;
            debug!("Chunk {}/{}: {} rows", i + 1, data.chunks.len(), chunk_rows.len());

            if let Some(expected) = chunk.row_count {
                if expected != chunk_rows.len() as u64 {
                    return Err(ExportError::ProtocolError(format!(
                        "chunk {} has {} rows, expected {}",
                        i,
                        chunk_rows.len(),
                        expected
                    )));
                }
            }
            for raw in chunk_rows {
                rows.push(render_row(raw, &columns)?);
            }
        }

        if let Some(total) = data.total {
            if total != rows.len() as u64 {
                return Err(ExportError::ProtocolError(format!(
                    "expected {} rows, received {}",
                    total,
                    rows.len()
                )));
            }
        }

        debug!(
            "Query {} returned {} rows",
            data.query_id.as_deref().unwrap_or("-"),
            rows.len()
        );
        Ok(ResultSet { columns, rows })
    }

    fn fetch_chunk(
        &self,
        chunk: &ChunkInfo,
        chunk_headers: Option<&HashMap<String, String>>,
        qrmk: Option<&str>,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Vec<Vec<Value>>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timeout_error(timeout));
        }

        // Chunk URLs point at cloud storage, not Snowflake: no session token.
        let mut request = self.client.get(&chunk.url).timeout(remaining);
        match (chunk_headers, qrmk) {
            (Some(headers), _) => {
                for (k, v) in headers {
                    request = request.header(k.as_str(), v.as_str());
                }
            }
            (None, Some(key)) => {
                request = request
                    .header("x-amz-server-side-encryption-customer-algorithm", "AES256")
                    .header("x-amz-server-side-encryption-customer-key", key);
            }
            (None, None) => {}
        }

        let response = request.send().map_err(|e| transport_error(e, timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(query_error(format!("result chunk returned HTTP {}", status)));
        }
        let body = response.bytes().map_err(|e| transport_error(e, timeout))?;
        parse_chunk(&body)
    }
}

impl WarehouseSession for SnowflakeSession {
    fn query(&mut self, sql: &str, timeout: Duration) -> Result<ResultSet> {
        if self.closed {
            return Err(ExportError::ProtocolError("session already closed".into()));
        }
        let deadline = Instant::now() + timeout;
        self.sequence_id += 1;

        let mut parameters = HashMap::new();
        parameters.insert("STATEMENT_TIMEOUT_IN_SECONDS", json!(timeout.as_secs().max(1)));
        let body = QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence_id,
            parameters,
        };

        let request_id = Uuid::new_v4().to_string();
        let request = self
            .client
            .post(format!("{}/queries/v1/query-request", self.base_url))
            .query(&[("requestId", request_id.as_str())])
            .json(&body);
        let mut envelope = self.send(request, deadline, timeout)?;

        // Long statements are handed back unfinished; poll until they are done.
        while envelope.is_in_progress() {
            let pending: QueryResponseData = envelope.into_data()?;
            let result_url = pending.get_result_url.ok_or_else(|| {
                ExportError::ProtocolError("query still running but no result URL given".into())
            })?;

            let now = Instant::now();
            if now >= deadline {
                return Err(timeout_error(timeout));
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));

            let request = self.client.get(format!("{}{}", self.base_url, result_url));
            envelope = self.send(request, deadline, timeout)?;
        }

        if !envelope.success {
            if envelope.is_statement_timeout() {
                debug!("server cancelled statement: {}", envelope.describe());
                return Err(timeout_error(timeout));
            }
            return Err(query_error(envelope.describe()));
        }
        let data: QueryResponseData = envelope.into_data()?;
        self.materialize(data, deadline, timeout)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let request = self
            .client
            .post(format!("{}/session", self.base_url))
            .query(&[("delete", "true")]);
        let response = self
            .authorized(request)
            .timeout(LOGOUT_TIMEOUT)
            .send()
            .map_err(|e| ExportError::ProtocolError(format!("logout failed: {}", e)))?;

        let envelope: Envelope = response
            .json()
            .map_err(|e| ExportError::ProtocolError(format!("unreadable logout response: {}", e)))?;
        if !envelope.success {
            return Err(ExportError::ProtocolError(format!(
                "logout rejected ({})",
                envelope.describe()
            )));
        }

        info!("Closed Snowflake session");
        Ok(())
    }
}

/// `xy12345.us-east-1` logs in as account `xy12345`; the region only
/// matters for the host name.
fn account_name(account: &str) -> &str {
    account.split('.').next().unwrap_or(account)
}

fn render_row(raw: Vec<Value>, columns: &[ColumnMetadata]) -> Result<Vec<Option<String>>> {
    if raw.len() != columns.len() {
        return Err(ExportError::ProtocolError(format!(
            "row has {} values for {} columns",
            raw.len(),
            columns.len()
        )));
    }
    raw.into_iter()
        .zip(columns)
        .map(|(value, column)| {
            cell_text(value)
                .map(|text| format_value(&text, column))
                .transpose()
        })
        .collect()
}

/// Parses a JSON result chunk: rows separated by commas without the
/// enclosing brackets, optionally gzip-compressed.
fn parse_chunk(body: &[u8]) -> Result<Vec<Vec<Value>>> {
    let mut text = Vec::with_capacity(body.len() + 2);
    text.push(b'[');
    if body.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(body)
            .read_to_end(&mut text)
            .map_err(|e| ExportError::ProtocolError(format!("corrupt result chunk: {}", e)))?;
    } else {
        text.extend_from_slice(body);
    }
    text.push(b']');

    serde_json::from_slice(&text)
        .map_err(|e| ExportError::ProtocolError(format!("malformed result chunk: {}", e)))
}

fn query_error(reason: String) -> ExportError {
    ExportError::QueryError {
        table: String::new(),
        reason,
    }
}

fn timeout_error(timeout: Duration) -> ExportError {
    ExportError::Timeout {
        table: String::new(),
        secs: timeout.as_secs(),
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> ExportError {
    if e.is_timeout() {
        timeout_error(timeout)
    } else {
        query_error(e.to_string())
    }
}
