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

//! Business logic for the service.

use derivative::Derivative;
use iii_iv_core::clocks::Clock;
use iii_iv_core::db::Db;
use iii_iv_core::driver::{DriverResult, with_deadline};
use iii_iv_core::pipeline::Deadline;
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;

mod health;
pub(crate) use health::{HealthReport, HealthStatus};
#[cfg(test)]
pub(crate) mod testutils;
mod user;
mod users;

/// Business logic.
///
/// The public operations exposed by the driver are all "one shot": they start and commit a
/// transaction, so it's incorrect for the caller to use two separate calls.  For this reason,
/// these operations consume the driver in an attempt to minimize the possibility of executing
/// two operations.
///
/// Every operation is bounded by the deadline attached via `with_deadline`, if any.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub(crate) struct Driver {
    /// The database that the driver uses for persistence.
    #[derivative(Debug = "ignore")]
    db: Arc<dyn Db + Send + Sync>,

    /// Clock instance to obtain the current time.
    #[derivative(Debug = "ignore")]
    clock: Arc<dyn Clock + Send + Sync>,

    /// When the service started, to report its uptime.
    started_at: OffsetDateTime,

    /// Instant by which the next operation must complete.
    deadline: Deadline,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let started_at = clock.now_utc();
        Self { db, clock, started_at, deadline: Deadline::default() }
    }

    /// Returns a copy of this driver whose operations give up once `deadline` passes.
    pub(crate) fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs `op` bounded by the deadline of this driver.
    async fn bounded<T, F>(&self, op: F) -> DriverResult<T>
    where
        F: Future<Output = DriverResult<T>>,
    {
        with_deadline(self.deadline.0, op).await
    }
}
