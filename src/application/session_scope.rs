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

//! # Session Scope
//!
//! Holds the run's one warehouse session and guarantees it is closed
//! exactly once: explicitly through `release()`, or by `Drop` if the run
//! bails out early with `?` or unwinds from a panic.

use crate::config::ConnectionConfig;
use crate::domain::errors::{ExportError, Result};
use crate::ports::session_port::{SessionProvider, WarehouseSession};
use log::{info, warn};
use std::thread;
use std::time::Duration;

pub struct SessionScope {
    session: Box<dyn WarehouseSession>,
    open: bool,
}

impl SessionScope {
    /// Opens a session, retrying transport failures up to `retries` times.
    ///
    /// The wait grows linearly: `backoff`, `2 * backoff`, ... Rejected
    /// logins and configuration problems are returned straight away.
    pub fn acquire(
        provider: &dyn SessionProvider,
        config: &ConnectionConfig,
        retries: u32,
        backoff: Duration,
    ) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match provider.open(config) {
                Ok(session) => {
                    return Ok(Self {
                        session,
                        open: true,
                    })
                }
                Err(e) if attempt < retries && is_retryable(&e) => {
                    attempt += 1;
                    let wait = backoff * attempt;
                    warn!("{} - retrying in {:?} (attempt {}/{})", e, wait, attempt, retries);
                    thread::sleep(wait);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn session(&mut self) -> &mut dyn WarehouseSession {
        self.session.as_mut()
    }

    /// Closes the session and reports whether the warehouse accepted it.
    pub fn release(mut self) -> Result<()> {
        self.open = false;
        self.session.close()
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        info!("Closing warehouse session on early exit");
        if let Err(e) = self.session.close() {
            warn!("Failed to close warehouse session: {}", e);
        }
    }
}

fn is_retryable(e: &ExportError) -> bool {
    matches!(e, ExportError::ConnectionError { retryable: true, .. })
}
