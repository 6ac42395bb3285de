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

//! One log line per request.

use crate::pipeline::client_address;
use crate::pipeline::request_id::RequestId;
use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use log::{Level, log};
use std::time::Instant;

/// Returns the level at which to log a request that finished with `status`.
fn level_for(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::Error
    } else if status.is_client_error() {
        Level::Warn
    } else {
        Level::Info
    }
}

/// Logs the method, path, status, latency, remote address and correlation id of the request.
async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let remote = client_address(&req).unwrap_or_else(|| "-".to_owned());
    let request_id = match req.extensions().get::<RequestId>() {
        Some(id) => id.as_str().to_owned(),
        None => "-".to_owned(),
    };

    let start = Instant::now();
    let response = next.run(req).await;
    let latency = start.elapsed();

    let status = response.status();
    log!(
        level_for(status),
        "{} {} {} {:?} remote={} request_id={}",
        method,
        path,
        status.as_u16(),
        latency,
        remote,
        request_id
    );
    response
}

/// Adds the access logging stage to `router`.
pub(super) fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(log_request))
}
