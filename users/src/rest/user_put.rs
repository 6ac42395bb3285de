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

//! API to update an existing user.

use crate::driver::Driver;
use crate::model::{AvatarUrl, Bio, UserId, UserName, UserUpdate};
use crate::rest::UserForm;
use crate::rest::views::{self, HX_TRIGGER};
use axum::Form;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use iii_iv_core::pipeline::Deadline;
use iii_iv_core::rest::RestError;

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<String>,
    deadline: Deadline,
    Form(form): Form<UserForm>,
) -> Result<impl IntoResponse, RestError> {
    let id = UserId::parse(&id)?;
    let update = UserUpdate::new(
        UserName::new(form.name)?,
        Bio::new_optional(form.bio)?,
        AvatarUrl::new_optional(form.avatar_url)?,
    );

    let users = driver.with_deadline(deadline).update_user(id, update).await?;
    Ok(([(HX_TRIGGER, "userUpdated")], Html(views::user_list_after_save(&users))))
}
