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

//! # Session Port
//!
//! This Port defines what it means to "talk to the warehouse".
//!
//! The application only needs two things from a warehouse: run one query and
//! get the full result back, and close the session when done. Anything that
//! implements these traits (Snowflake over HTTPS, or a mock in tests) can be
//! handed to the run driver.

use crate::config::ConnectionConfig;
use crate::domain::entities::ResultSet;
use crate::domain::errors::Result;
use std::time::Duration;

/// An open, authenticated warehouse session.
///
/// `Send` is required so a session can live behind the scope guard, which
/// may be dropped while unwinding on any thread.
pub trait WarehouseSession: Send {
    /// Runs `sql` and blocks until the whole result set is materialized.
    ///
    /// Exceeding `timeout` must surface as `ExportError::Timeout`.
    fn query(&mut self, sql: &str, timeout: Duration) -> Result<ResultSet>;

    /// Ends the session. Called exactly once by the session scope.
    fn close(&mut self) -> Result<()>;
}

/// Opens sessions. One call per attempt; retries are the caller's business.
pub trait SessionProvider: Send + Sync {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn WarehouseSession>>;
}
