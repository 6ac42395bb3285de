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

//! Conversion of panics into error responses.

use crate::pipeline::request_id::{RequestIdSlot, X_REQUEST_ID};
use crate::pipeline::security_headers;
use crate::rest::INTERNAL_ERROR_MESSAGE;
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use log::error;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Extracts a printable message from the payload of a panic.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Runs the rest of the pipeline and turns any panic into a 500 response.
///
/// The response for a recovered panic is built here from scratch, so it carries the security
/// headers and the correlation id that the inner stages would otherwise have added.
async fn recover(mut req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let slot = RequestIdSlot::default();
    req.extensions_mut().insert(slot.clone());

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let request_id = slot.get();
            error!(
                "Recovered from panic: {} (method={} path={} request_id={})",
                panic_message(payload.as_ref()),
                method,
                path,
                request_id.unwrap_or("-")
            );

            let mut response =
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response();
            let headers = response.headers_mut();
            security_headers::insert_all(headers);
            if let Some(value) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
                headers.insert(X_REQUEST_ID, value);
            }
            response
        }
    }
}

/// Adds the recovery stage to `router`.
pub(super) fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(recover))
}
