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

//! HTML rendering of pages and fragments.

use crate::model::{AvatarUrl, Bio, User};
use axum::http::HeaderName;
use iii_iv_core::template::{apply, escape};

/// Header that carries the name of a domain event for the front end to react to.
pub(crate) const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");

/// Escapes an optional `value`, rendering a missing value as empty.
fn escape_optional(value: Option<&str>) -> String {
    escape(value.unwrap_or(""))
}

/// Renders a full page titled `title` with `content` as its main section.
pub(crate) fn page(title: &str, content: &str) -> String {
    apply(
        include_str!("templates/layout.html"),
        &[("title", escape(title).as_str()), ("content", content)],
    )
}

/// Renders the landing page.
pub(crate) fn home() -> String {
    page("Home", include_str!("templates/home.html"))
}

/// Renders the user management page.  The list itself is loaded separately.
pub(crate) fn users_page() -> String {
    page("Users", include_str!("templates/users.html"))
}

/// Renders the table row for `user`.
pub(crate) fn user_row(user: &User) -> String {
    let avatar = match user.avatar_url() {
        Some(url) => {
            let url = escape(url.as_str());
            apply(include_str!("templates/user_avatar.html"), &[("url", url.as_str())])
        }
        None => String::new(),
    };
    let (status, status_class) = if *user.is_active() {
        ("Active", "active")
    } else {
        ("Inactive", "inactive")
    };
    apply(
        include_str!("templates/user_row.html"),
        &[
            ("id", user.id().to_string().as_str()),
            ("status_class", status_class),
            ("avatar", avatar.as_str()),
            ("name", escape(user.name().as_str()).as_str()),
            ("email", escape(user.email().as_str()).as_str()),
            ("bio", escape_optional(user.bio().as_ref().map(Bio::as_str)).as_str()),
            ("status", status),
            ("created_at", user.created_at().date().to_string().as_str()),
        ],
    )
}

/// Renders the list of `users`.
pub(crate) fn user_list(users: &[User]) -> String {
    if users.is_empty() {
        return include_str!("templates/user_list_empty.html").to_owned();
    }
    let rows = users.iter().map(user_row).collect::<Vec<String>>().join("");
    apply(include_str!("templates/user_list.html"), &[("rows", rows.as_str())])
}

/// Renders the form to create a new user, or to edit `user` if given.
pub(crate) fn user_form(user: Option<&User>) -> String {
    let template = include_str!("templates/user_form.html");
    match user {
        None => apply(
            template,
            &[
                ("action", "hx-post=\"/users\""),
                ("heading", "New user"),
                ("name", ""),
                ("email", ""),
                ("email_attrs", ""),
                ("bio", ""),
                ("avatar_url", ""),
                ("submit", "Create"),
            ],
        ),
        Some(user) => {
            let avatar_url = escape_optional(user.avatar_url().as_ref().map(AvatarUrl::as_str));
            apply(
                template,
                &[
                    ("action", format!("hx-put=\"/users/{}\"", user.id()).as_str()),
                    ("heading", "Edit user"),
                    ("name", escape(user.name().as_str()).as_str()),
                    ("email", escape(user.email().as_str()).as_str()),
                    ("email_attrs", "readonly"),
                    ("bio", escape_optional(user.bio().as_ref().map(Bio::as_str)).as_str()),
                    ("avatar_url", avatar_url.as_str()),
                    ("submit", "Save"),
                ],
            )
        }
    }
}

/// Renders the list of `users` after a save, also emptying the form container out of band.
pub(crate) fn user_list_after_save(users: &[User]) -> String {
    let mut html = user_list(users);
    html.push_str(include_str!("templates/user_form_closed.html"));
    html
}

/// Renders the number of active users.
pub(crate) fn user_count(count: u64) -> String {
    apply(include_str!("templates/user_count.html"), &[("count", count.to_string().as_str())])
}
