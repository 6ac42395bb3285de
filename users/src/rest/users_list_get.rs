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

//! API to render the list of active users.

use crate::driver::Driver;
use crate::model::ListScope;
use crate::rest::views;
use axum::extract::State;
use axum::response::Html;
use iii_iv_core::pipeline::Deadline;
use iii_iv_core::rest::{EmptyBody, RestError};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    deadline: Deadline,
    _: EmptyBody,
) -> Result<Html<String>, RestError> {
    let users = driver.with_deadline(deadline).list_users(ListScope::Active).await?;
    Ok(Html(views::user_list(&users)))
}
