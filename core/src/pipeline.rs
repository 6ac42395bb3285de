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

//! Request processing pipeline that wraps the routes of a service.
//!
//! The pipeline is an explicit, ordered list of stages.  The first stage in the list sees the
//! request first and the response last, so the order of `STAGES` is the contract:
//!
//! 1.  `Recovery` turns panics anywhere below it into a generic 500 response.
//! 1.  `RequestId` assigns or propagates the correlation id of the request.
//! 1.  `AccessLog` records the outcome of the request once its final status is known.
//! 1.  `SecurityHeaders` attaches hardening headers to every response, errors included.
//! 1.  `Cors` answers and decorates cross-origin requests.  Only present when enabled.
//! 1.  `RateLimit` rejects clients that exceed their allowance before any routing happens.
//! 1.  `Timeout` bounds the execution of the handler and publishes the request `Deadline`.
//!
//! Route dispatch happens after all stages.  Routers should define a fallback so that unmatched
//! requests also traverse the pipeline.

use crate::clocks::Clock;
use crate::env::get_optional_var;
use axum::Router;
use axum::extract::{ConnectInfo, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub mod access_log;
pub mod cors;
use cors::CorsOptions;
pub mod rate_limit;
use rate_limit::{RateLimitOptions, RateLimiter};
pub mod recovery;
pub mod request_id;
pub mod security_headers;
pub mod timeout;
pub use timeout::Deadline;

/// Default bound on handler execution.
const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

/// A stage of the request processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Stage {
    /// Converts panics into 500 responses.
    Recovery,

    /// Assigns a correlation id to every request.
    RequestId,

    /// Logs one line per request.
    AccessLog,

    /// Adds hardening headers to every response.
    SecurityHeaders,

    /// Handles cross-origin requests.
    Cors,

    /// Limits the request rate per client.
    RateLimit,

    /// Bounds handler execution time.
    Timeout,
}

/// All stages in the order in which they see incoming requests.
pub const STAGES: [Stage; 7] = [
    Stage::Recovery,
    Stage::RequestId,
    Stage::AccessLog,
    Stage::SecurityHeaders,
    Stage::Cors,
    Stage::RateLimit,
    Stage::Timeout,
];

/// Configuration for the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    /// Maximum time a handler may run before the request fails with a timeout.
    pub handler_timeout: Duration,

    /// CORS configuration, or `None` to disable cross-origin support.
    pub cors: Option<CorsOptions>,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            cors: Some(CorsOptions::default()),
            rate_limit: RateLimitOptions::default(),
        }
    }
}

impl PipelineOptions {
    /// Creates a new set of options from environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let cors = if get_optional_var::<bool>(prefix, "ENABLE_CORS")?.unwrap_or(true) {
            Some(CorsOptions::from_env(prefix)?)
        } else {
            None
        };
        Ok(Self {
            handler_timeout: get_optional_var::<Duration>(prefix, "READ_TIMEOUT")?
                .unwrap_or(DEFAULT_HANDLER_TIMEOUT),
            cors,
            rate_limit: RateLimitOptions::from_env(prefix)?,
        })
    }
}

/// The request processing pipeline.
pub struct Pipeline {
    /// Stages to apply, in the order in which they see incoming requests.
    stages: Vec<Stage>,

    /// Configuration of the stages.
    options: PipelineOptions,

    /// Clock used by the rate limiter to refill client allowances.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Pipeline {
    /// Creates a new pipeline configured by `options`.
    pub fn new(options: PipelineOptions, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let stages = STAGES
            .iter()
            .copied()
            .filter(|stage| *stage != Stage::Cors || options.cors.is_some())
            .collect();
        Self { stages, options, clock }
    }

    /// Returns the stages of this pipeline in the order in which they see incoming requests.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wraps `router` with all the stages of the pipeline.
    pub fn wrap(self, router: Router) -> Router {
        let rate_limiter =
            Arc::new(RateLimiter::new(self.options.rate_limit.clone(), self.clock.clone()));

        // Every layer wraps the ones added before it, so the innermost stage goes first.
        let mut router = router;
        for stage in self.stages.iter().rev() {
            router = match stage {
                Stage::Recovery => recovery::apply(router),
                Stage::RequestId => request_id::apply(router),
                Stage::AccessLog => access_log::apply(router),
                Stage::SecurityHeaders => security_headers::apply(router),
                Stage::Cors => match &self.options.cors {
                    Some(cors) => cors::apply(router, cors),
                    None => router,
                },
                Stage::RateLimit => rate_limit::apply(router, rate_limiter.clone()),
                Stage::Timeout => timeout::apply(router, self.options.handler_timeout),
            };
        }
        router
    }
}

/// Determines the address of the client that sent `req`.
///
/// Proxy-provided headers take precedence over the peer address: first the leftmost
/// `X-Forwarded-For` entry, then `X-Real-Ip`.  Returns `None` if none of them are available.
pub fn client_address(req: &Request) -> Option<String> {
    let headers = req.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(forwarded) = forwarded {
        return Some(forwarded.to_owned());
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(real_ip) = real_ip {
        return Some(real_ip.to_owned());
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
