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

//! API to render the form to edit an existing user.

use crate::driver::Driver;
use crate::model::UserId;
use crate::rest::views;
use axum::extract::{Path, State};
use axum::response::Html;
use iii_iv_core::pipeline::Deadline;
use iii_iv_core::rest::{EmptyBody, RestError};

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<String>,
    deadline: Deadline,
    _: EmptyBody,
) -> Result<Html<String>, RestError> {
    let id = UserId::parse(&id)?;
    let user = driver.with_deadline(deadline).get_user(id).await?;
    Ok(Html(views::user_form(Some(&user))))
}
