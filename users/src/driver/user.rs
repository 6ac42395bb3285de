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

//! Operations on one user.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use iii_iv_core::db::DbError;
use iii_iv_core::driver::{DriverError, DriverResult};
use log::info;

/// Converts a database error on a single-user lookup into a driver error.
fn user_error(e: DbError) -> DriverError {
    match e {
        DbError::NotFound => DriverError::NotFound("User not found".to_owned()),
        e => e.into(),
    }
}

impl Driver {
    /// Creates a new user and returns the refreshed list of active users.
    pub(crate) async fn create_user(self, new_user: NewUser) -> DriverResult<Vec<User>> {
        let now = self.clock.now_utc();
        self.bounded(async {
            let mut tx = self.db.begin().await?;
            let email = new_user.email().clone();
            let user = match db::create_user(tx.ex(), new_user, now).await {
                Ok(user) => user,
                Err(DbError::AlreadyExists) => {
                    return Err(DriverError::AlreadyExists(format!(
                        "A user with email {} already exists",
                        email.as_str()
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            let users = db::list_users(tx.ex(), ListScope::Active).await?;
            tx.commit().await?;
            info!("Created user {}", user.id());
            Ok(users)
        })
        .await
    }

    /// Gets the user identified by `id`, whether active or not.
    pub(crate) async fn get_user(self, id: UserId) -> DriverResult<User> {
        self.bounded(async {
            let user = db::get_user(&mut self.db.ex().await?, id).await.map_err(user_error)?;
            Ok(user)
        })
        .await
    }

    /// Updates user `id` with the values in `update` and returns the refreshed list of active
    /// users.
    pub(crate) async fn update_user(
        self,
        id: UserId,
        update: UserUpdate,
    ) -> DriverResult<Vec<User>> {
        let now = self.clock.now_utc();
        self.bounded(async {
            let mut tx = self.db.begin().await?;
            db::update_user(tx.ex(), id, update, now).await.map_err(user_error)?;
            let users = db::list_users(tx.ex(), ListScope::Active).await?;
            tx.commit().await?;
            Ok(users)
        })
        .await
    }

    /// Deactivates user `id` and returns its new state.  Deactivating an inactive user is not an
    /// error.
    pub(crate) async fn deactivate_user(self, id: UserId) -> DriverResult<User> {
        let now = self.clock.now_utc();
        self.bounded(async {
            let mut tx = self.db.begin().await?;
            db::deactivate_user(tx.ex(), id, now).await.map_err(user_error)?;
            let user = db::get_user(tx.ex(), id).await.map_err(user_error)?;
            tx.commit().await?;
            info!("Deactivated user {}", id);
            Ok(user)
        })
        .await
    }

    /// Permanently deletes user `id`.
    pub(crate) async fn delete_user(self, id: UserId) -> DriverResult<()> {
        self.bounded(async {
            db::delete_user(&mut self.db.ex().await?, id).await.map_err(user_error)?;
            info!("Deleted user {}", id);
            Ok(())
        })
        .await
    }
}
