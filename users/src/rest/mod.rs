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

//! Entry point to the REST server.

use crate::driver::Driver;
use axum::Router;
use iii_iv_core::pipeline::Pipeline;
use iii_iv_core::rest::RestError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tower_http::services::ServeDir;

mod health_get;
mod index_get;
mod user_deactivate_patch;
mod user_delete;
mod user_edit_get;
mod user_put;
mod users_count_get;
mod users_form_get;
mod users_list_get;
mod users_page_get;
mod users_post;
#[cfg(test)]
mod testutils;
mod views;

/// Form submitted to create or update a user.
///
/// All fields are optional at the wire level so that missing values are reported with the same
/// messages as empty ones.
#[derive(Debug, Default, Deserialize, Serialize)]
pub(crate) struct UserForm {
    /// Display name.
    #[serde(default)]
    pub(crate) name: String,

    /// Email address.  Ignored on updates.
    #[serde(default)]
    pub(crate) email: String,

    /// Biography, empty if none.
    #[serde(default)]
    pub(crate) bio: String,

    /// Avatar URL, empty if none.
    #[serde(default)]
    pub(crate) avatar_url: String,
}

/// Responds to requests that do not match any route.
async fn not_found() -> RestError {
    RestError::NotFound("Not found".to_owned())
}

/// Creates the router for the application, wrapped in `pipeline`, serving static assets from
/// `static_dir`.
pub(crate) fn app(driver: Driver, static_dir: &Path, pipeline: Pipeline) -> Router {
    use axum::routing::{get, patch, put};
    let router = Router::new()
        .route("/", get(index_get::handler))
        .route("/health", get(health_get::handler))
        .route("/users", get(users_page_get::handler).post(users_post::handler))
        .route("/users/list", get(users_list_get::handler))
        .route("/users/form", get(users_form_get::handler))
        .route("/users/:id", put(user_put::handler).delete(user_delete::handler))
        .route("/users/:id/edit", get(user_edit_get::handler))
        .route("/users/:id/deactivate", patch(user_deactivate_patch::handler))
        .route("/api/users/count", get(users_count_get::handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .with_state(driver);
    pipeline.wrap(router)
}
