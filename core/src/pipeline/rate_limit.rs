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

//! Per-client rate limiting based on token buckets.
//!
//! Every client gets a bucket that holds up to `burst` tokens and that refills at `rate` tokens
//! per second.  Each request takes one token and requests that find an empty bucket are rejected
//! before reaching the router.

use crate::clocks::Clock;
use crate::env::get_optional_var;
use crate::pipeline::client_address;
use crate::rest::RestError;
use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use futures::lock::Mutex;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Default sustained number of requests per second per client.
const DEFAULT_RATE: u32 = 20;

/// Default idle time after which the bucket of a client is forgotten.
const DEFAULT_EXPIRY: Duration = Duration::from_secs(3 * 60);

/// Key used for requests whose client cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Configuration for the rate limiter.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitOptions {
    /// Sustained number of requests per second allowed per client.
    pub rate: u32,

    /// Maximum number of requests a client can issue at once.
    pub burst: u32,

    /// Idle time after which a client's allowance is reset.
    pub expiry: Duration,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self { rate: DEFAULT_RATE, burst: DEFAULT_RATE, expiry: DEFAULT_EXPIRY }
    }
}

impl RateLimitOptions {
    /// Creates a new set of options from environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let rate = get_optional_var::<u32>(prefix, "RATE_LIMIT")?.unwrap_or(DEFAULT_RATE);
        let burst = get_optional_var::<u32>(prefix, "RATE_LIMIT_BURST")?.unwrap_or(rate);
        if rate == 0 || burst == 0 {
            return Err(format!(
                "{}_RATE_LIMIT and {}_RATE_LIMIT_BURST must be positive",
                prefix, prefix
            ));
        }
        Ok(Self {
            rate,
            burst,
            expiry: get_optional_var::<Duration>(prefix, "RATE_LIMIT_EXPIRY")?
                .unwrap_or(DEFAULT_EXPIRY),
        })
    }
}

/// Allowance of a single client.
struct Bucket {
    /// Requests the client can still issue right now.
    tokens: f64,

    /// Last time the client issued a request.
    last_seen: OffsetDateTime,
}

/// Mutable state of the rate limiter.
struct Buckets {
    /// Allowances of all recently-seen clients.
    by_client: HashMap<String, Bucket>,

    /// Last time idle buckets were purged.
    last_sweep: OffsetDateTime,
}

/// Token bucket rate limiter keyed by client.
pub struct RateLimiter {
    /// Configuration of the limiter.
    options: RateLimitOptions,

    /// Clock used to refill the buckets.
    clock: Arc<dyn Clock + Send + Sync>,

    /// Per-client buckets.
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    /// Creates a new rate limiter configured by `options`.
    pub fn new(options: RateLimitOptions, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let now = clock.now_utc();
        Self {
            options,
            clock,
            buckets: Mutex::new(Buckets { by_client: HashMap::new(), last_sweep: now }),
        }
    }

    /// Consumes one token from the bucket of `client` and returns whether that was possible.
    pub async fn allow(&self, client: &str) -> bool {
        let now = self.clock.now_utc();
        let rate = f64::from(self.options.rate);
        let burst = f64::from(self.options.burst);
        let expiry = self.options.expiry.as_secs_f64();

        let mut buckets = self.buckets.lock().await;
        if (now - buckets.last_sweep).as_seconds_f64() >= expiry {
            buckets
                .by_client
                .retain(|_, bucket| (now - bucket.last_seen).as_seconds_f64() < expiry);
            buckets.last_sweep = now;
        }

        let bucket = buckets
            .by_client
            .entry(client.to_owned())
            .or_insert(Bucket { tokens: burst, last_seen: now });
        let elapsed = (now - bucket.last_seen).as_seconds_f64().max(0.0);
        bucket.tokens = (bucket.tokens + elapsed * rate).min(burst);
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Returns the number of clients currently tracked.
    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.by_client.len()
    }
}

/// Rejects the request with a 429 if its client exhausted its allowance.
async fn enforce(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let client = client_address(&req).unwrap_or_else(|| UNKNOWN_CLIENT.to_owned());
    if limiter.allow(&client).await {
        next.run(req).await
    } else {
        warn!(
            "Rate limit exceeded for client {} on {} {}",
            client,
            req.method(),
            req.uri().path()
        );
        RestError::TooManyRequests.into_response()
    }
}

/// Adds the rate limiting stage backed by `limiter` to `router`.
pub(super) fn apply(router: Router, limiter: Arc<RateLimiter>) -> Router {
    router.layer(middleware::from_fn_with_state(limiter, enforce))
}
