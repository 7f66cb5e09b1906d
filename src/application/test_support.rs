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

//! In-memory warehouse used by the application tests.

use crate::config::ConnectionConfig;
use crate::domain::entities::{ColumnMetadata, ResultSet};
use crate::domain::errors::{ExportError, Result};
use crate::ports::session_port::{SessionProvider, WarehouseSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_connection() -> ConnectionConfig {
    ConnectionConfig {
        account: "xy12345".into(),
        user: "loader".into(),
        password: "s3cret".into(),
        warehouse: "WH".into(),
        database: "analytics".into(),
        schema: "marts".into(),
        role: "ANALYST".into(),
        host: None,
    }
}

pub fn result_set(columns: &[&str], rows: &[&[Option<&str>]]) -> ResultSet {
    ResultSet {
        columns: columns
            .iter()
            .map(|name| ColumnMetadata {
                name: name.to_string(),
                raw_type: "text".to_string(),
                scale: None,
            })
            .collect(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.map(String::from)).collect())
            .collect(),
    }
}

/// What a mock table query does.
#[derive(Clone)]
pub enum TableBehavior {
    Rows(ResultSet),
    Fail(String),
    Timeout,
}

/// Shared counters, readable after the session has been handed away.
#[derive(Clone, Default)]
pub struct WarehouseLog {
    queries: Arc<Mutex<Vec<String>>>,
    login_attempts: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl WarehouseLog {
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
    pub fn login_attempts(&self) -> usize {
        self.login_attempts.load(Ordering::SeqCst)
    }
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Tables are keyed by the (already resolved) last identifier of the query,
/// e.g. `MART_A` for `SELECT * FROM "DB"."S"."MART_A"`.
pub struct MockSession {
    tables: Vec<(String, TableBehavior)>,
    log: WarehouseLog,
}

impl WarehouseSession for MockSession {
    fn query(&mut self, sql: &str, timeout: Duration) -> Result<ResultSet> {
        self.log.queries.lock().unwrap().push(sql.to_string());
        let behavior = self
            .tables
            .iter()
            .find(|(name, _)| sql.ends_with(&format!("\"{}\"", name)))
            .map(|(_, b)| b.clone());

        match behavior {
            Some(TableBehavior::Rows(rs)) => Ok(rs),
            Some(TableBehavior::Fail(reason)) => Err(ExportError::QueryError {
                table: String::new(),
                reason,
            }),
            Some(TableBehavior::Timeout) => Err(ExportError::Timeout {
                table: String::new(),
                secs: timeout.as_secs(),
            }),
            None => Err(ExportError::QueryError {
                table: String::new(),
                reason: "002003: Object does not exist".into(),
            }),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockProvider {
    tables: Vec<(String, TableBehavior)>,
    failing_logins: AtomicUsize,
    retryable: bool,
    pub log: WarehouseLog,
}

impl MockProvider {
    pub fn new(tables: Vec<(&str, TableBehavior)>) -> Self {
        Self {
            tables: tables.into_iter().map(|(n, b)| (n.to_string(), b)).collect(),
            failing_logins: AtomicUsize::new(0),
            retryable: true,
            log: WarehouseLog::default(),
        }
    }

    /// The first `count` logins fail.
    pub fn failing_logins(mut self, count: usize, retryable: bool) -> Self {
        self.failing_logins = AtomicUsize::new(count);
        self.retryable = retryable;
        self
    }
}

impl SessionProvider for MockProvider {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn WarehouseSession>> {
        self.log.login_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_logins.load(Ordering::SeqCst) > 0 {
            self.failing_logins.fetch_sub(1, Ordering::SeqCst);
            return Err(ExportError::ConnectionError {
                account: config.account.clone(),
                host: config.base_url(),
                reason: "connection refused".into(),
                retryable: self.retryable,
            });
        }
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            tables: self.tables.clone(),
            log: self.log.clone(),
        }))
    }
}
