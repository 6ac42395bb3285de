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

//! API to report the health of the service.

use crate::driver::{Driver, HealthStatus};
use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use iii_iv_core::pipeline::Deadline;
use iii_iv_core::rest::{EmptyBody, RestError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;

/// Name of the service as reported by the health check.
const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Version of the service as reported by the health check.
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Results of the individual health checks.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct HealthChecks {
    /// Either `ok` or `unavailable`.
    pub(crate) database: String,
}

/// Message returned by the health check.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct HealthResponse {
    /// Either `ok` or `degraded`.
    pub(crate) status: String,

    /// When the probe ran, in RFC 3339 format.
    pub(crate) timestamp: String,

    /// Name of the service.
    pub(crate) service: String,

    /// Version of the service.
    pub(crate) version: String,

    /// Time since the service started, like `1h2m3s`.
    pub(crate) uptime: String,

    /// Outcome of each dependency check.
    pub(crate) checks: HealthChecks,
}

/// Formats `d` with hour, minute and second units, dropping leading zero units.
fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    deadline: Deadline,
    _: EmptyBody,
) -> Result<impl IntoResponse, RestError> {
    let report = driver.with_deadline(deadline).check_health().await;

    let timestamp =
        report.timestamp.format(&Rfc3339).map_err(|e| RestError::InternalError(e.to_string()))?;
    let (status_code, status) = match report.status {
        HealthStatus::Ok => (StatusCode::OK, "ok"),
        HealthStatus::Degraded => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };
    let response = HealthResponse {
        status: status.to_owned(),
        timestamp,
        service: SERVICE_NAME.to_owned(),
        version: SERVICE_VERSION.to_owned(),
        uptime: format_uptime(report.uptime),
        checks: HealthChecks {
            database: if report.database_ok { "ok" } else { "unavailable" }.to_owned(),
        },
    };

    Ok((
        status_code,
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        Json(response),
    ))
}
