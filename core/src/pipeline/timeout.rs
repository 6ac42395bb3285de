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

//! Bounds on handler execution time.
//!
//! The deadline computed by this stage is published as a `Deadline` request extension so that
//! handlers can hand it to the driver, which then cancels its database work at the same instant
//! at which the client gets its timeout response.

use crate::rest::RestError;
use async_trait::async_trait;
use axum::Router;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use log::warn;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::Instant;

/// The instant by which a request must complete, if any.
///
/// Extracting this from a request that did not go through the timeout stage yields a deadline
/// that never expires.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Deadline(pub Option<Instant>);

#[async_trait]
impl<S> FromRequestParts<S> for Deadline
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Deadline>().copied().unwrap_or_default())
    }
}

/// Runs the rest of the pipeline with a deadline of `timeout` from now.
async fn enforce(State(timeout): State<Duration>, mut req: Request, next: Next) -> Response {
    let deadline = Instant::now() + timeout;
    req.extensions_mut().insert(Deadline(Some(deadline)));

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    match tokio::time::timeout_at(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Request {} {} did not complete within {:?}", method, path, timeout);
            RestError::RequestTimeout.into_response()
        }
    }
}

/// Adds the timeout stage to `router`, bounding handlers to `timeout`.
pub(super) fn apply(router: Router, timeout: Duration) -> Router {
    router.layer(middleware::from_fn_with_state(timeout, enforce))
}
