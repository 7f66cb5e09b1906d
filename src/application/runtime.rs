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

//! # Runtime Context
//!
//! Sets up the resources that live for the whole process:
//! 1. **Ports**: the Snowflake session provider and the CSV artifact writer.
//! 2. **Cancellation flag**: flipped by SIGINT/SIGTERM so the run driver
//!    stops before the next table. A second signal exits right away.

use crate::domain::errors::Result;
use crate::infrastructure::local_storage::csv_artifact_adapter::CsvArtifactAdapter;
use crate::infrastructure::snowflake::SnowflakeSessionProvider;
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::session_port::SessionProvider;
use log::debug;
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Exit status used when a run is interrupted.
pub const EXIT_CANCELLED: i32 = 130;

/// `RuntimeContext` holds shared resources that exist for the entire life of the app.
pub struct RuntimeContext {
    pub session_provider: Arc<dyn SessionProvider>,
    pub artifact_port: Arc<dyn ArtifactPort>,
    /// Set once an interrupt arrives.
    pub cancel: Arc<AtomicBool>,
}

impl RuntimeContext {
    pub fn init() -> Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));

        for &signal in TERM_SIGNALS {
            // Order matters: the shutdown hook must see the flag as it was
            // before this signal set it.
            flag::register_conditional_shutdown(signal, EXIT_CANCELLED, Arc::clone(&cancel))?;
            flag::register(signal, Arc::clone(&cancel))?;
        }
        debug!("Registered handlers for {} termination signals", TERM_SIGNALS.len());

        Ok(Self {
            session_provider: Arc::new(SnowflakeSessionProvider),
            artifact_port: Arc::new(CsvArtifactAdapter::new()),
            cancel,
        })
    }
}
