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

//! Correlation ids for requests.

use crate::rest::get_unique_header;
use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::Response;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Header that carries the correlation id in requests and responses.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Maximum length of a client-provided correlation id.
const MAX_REQUEST_ID_LENGTH: usize = 128;

/// Correlation id of a request, available as a request extension after this stage runs.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestId(String);

impl RequestId {
    /// Returns a string view of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Placeholder inserted by outer stages to learn the correlation id of a request that may never
/// produce a response.
#[derive(Clone, Debug, Default)]
pub struct RequestIdSlot(Arc<OnceLock<String>>);

impl RequestIdSlot {
    /// Returns the id recorded in the slot, if any.
    pub fn get(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }
}

/// Returns true if a client-provided `id` can be propagated as is.
fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Reuses the client-provided id of `req` if it is acceptable or generates a new one.
fn pick_id(req: &Request) -> String {
    match get_unique_header(req.headers(), &X_REQUEST_ID) {
        Ok(Some(value)) => match value.to_str() {
            Ok(id) if is_well_formed(id) => return id.to_owned(),
            _ => (),
        },
        Ok(None) | Err(_) => (),
    }
    Uuid::new_v4().to_string()
}

/// Assigns a correlation id to the request and echoes it in the response.
async fn assign(mut req: Request, next: Next) -> Response {
    let id = pick_id(&req);
    let value = HeaderValue::from_str(&id).ok();

    if let Some(slot) = req.extensions().get::<RequestIdSlot>() {
        let _already_set = slot.0.set(id.clone());
    }
    if let Some(value) = &value {
        req.headers_mut().insert(X_REQUEST_ID, value.clone());
    }
    req.extensions_mut().insert(RequestId(id));

    let mut response = next.run(req).await;
    if let Some(value) = value {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

/// Adds the request identification stage to `router`.
pub(super) fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(assign))
}
