// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Health probing of the service and its dependencies.

use crate::db;
use crate::driver::Driver;
use log::warn;
use std::time::Duration;
use time::OffsetDateTime;

/// Overall health of the service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum HealthStatus {
    /// All dependencies respond.
    Ok,

    /// At least one dependency failed to respond.
    Degraded,
}

/// Outcome of a health probe.
#[derive(Debug, PartialEq)]
pub(crate) struct HealthReport {
    /// Overall status derived from the individual checks.
    pub(crate) status: HealthStatus,

    /// When the probe ran.
    pub(crate) timestamp: OffsetDateTime,

    /// How long the service has been running.
    pub(crate) uptime: Duration,

    /// Whether the database answered a trivial query.
    pub(crate) database_ok: bool,
}

impl Driver {
    /// Probes the database and reports on the health of the service.
    ///
    /// Failures are part of the report instead of being returned as errors.
    pub(crate) async fn check_health(self) -> HealthReport {
        let database_ok = match self
            .bounded(async {
                db::ping(&mut self.db.ex().await?).await?;
                Ok(())
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        };

        let timestamp = self.clock.now_utc();
        let uptime = Duration::try_from(timestamp - self.started_at).unwrap_or_default();
        let status = if database_ok { HealthStatus::Ok } else { HealthStatus::Degraded };
        HealthReport { status, timestamp, uptime, database_ok }
    }
}
