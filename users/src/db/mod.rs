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

//! Database abstraction to manipulate users.

use crate::model::{AvatarUrl, Bio, ListScope, NewUser, User, UserId, UserName, UserUpdate};
use iii_iv_core::db::sqlite::{self, build_timestamp, unpack_timestamp};
use iii_iv_core::db::{DbError, DbResult, Executor};
use iii_iv_core::model::EmailAddress;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use time::OffsetDateTime;

#[cfg(test)]
mod tests;

/// Initializes the database schema.
pub(crate) async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,
    }
}

/// Checks that the database can serve queries.
pub(crate) async fn ping(ex: &mut Executor) -> DbResult<()> {
    match ex {
        Executor::Sqlite(ex) => {
            sqlx::query("SELECT 1").execute(ex.conn()).await.map_err(sqlite::map_sqlx_error)?;
        }
    }
    Ok(())
}

impl TryFrom<SqliteRow> for User {
    type Error = DbError;

    fn try_from(row: SqliteRow) -> DbResult<Self> {
        let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
        let email: String = row.try_get("email").map_err(sqlite::map_sqlx_error)?;
        let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;
        let bio: Option<String> = row.try_get("bio").map_err(sqlite::map_sqlx_error)?;
        let avatar_url: Option<String> =
            row.try_get("avatar_url").map_err(sqlite::map_sqlx_error)?;
        let is_active: bool = row.try_get("is_active").map_err(sqlite::map_sqlx_error)?;
        let created_at_secs: i64 = row.try_get("created_at_secs").map_err(sqlite::map_sqlx_error)?;
        let created_at_nsecs: i64 =
            row.try_get("created_at_nsecs").map_err(sqlite::map_sqlx_error)?;
        let updated_at_secs: i64 = row.try_get("updated_at_secs").map_err(sqlite::map_sqlx_error)?;
        let updated_at_nsecs: i64 =
            row.try_get("updated_at_nsecs").map_err(sqlite::map_sqlx_error)?;

        let bio = match bio {
            Some(bio) => Bio::new_optional(bio)?,
            None => None,
        };
        let avatar_url = match avatar_url {
            Some(avatar_url) => AvatarUrl::new_optional(avatar_url)?,
            None => None,
        };

        Ok(User::new(
            UserId::new(id),
            EmailAddress::new(email)?,
            UserName::new(name)?,
            bio,
            avatar_url,
            is_active,
            build_timestamp(created_at_secs, created_at_nsecs)?,
            build_timestamp(updated_at_secs, updated_at_nsecs)?,
        ))
    }
}

/// Creates a new active user from `new_user` with both timestamps set to `now`.
///
/// Fails with `AlreadyExists` if the email address is already taken by any user, active or not.
pub(crate) async fn create_user(
    ex: &mut Executor,
    new_user: NewUser,
    now: OffsetDateTime,
) -> DbResult<User> {
    let id = match ex {
        Executor::Sqlite(ex) => {
            let (now_secs, now_nsecs) = unpack_timestamp(now)?;

            let query_str = "
                INSERT INTO users
                    (email, name, bio, avatar_url, is_active,
                    created_at_secs, created_at_nsecs, updated_at_secs, updated_at_nsecs)
                VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)";
            let done = sqlx::query(query_str)
                .bind(new_user.email().as_str())
                .bind(new_user.name().as_str())
                .bind(new_user.bio().as_ref().map(Bio::as_str))
                .bind(new_user.avatar_url().as_ref().map(AvatarUrl::as_str))
                .bind(now_secs)
                .bind(now_nsecs)
                .bind(now_secs)
                .bind(now_nsecs)
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            if done.rows_affected() != 1 {
                return Err(DbError::BackendError(
                    "Insertion affected more than one row".to_owned(),
                ));
            }
            done.last_insert_rowid()
        }
    };

    Ok(User::new(
        UserId::new(id),
        new_user.email().clone(),
        new_user.name().clone(),
        new_user.bio().clone(),
        new_user.avatar_url().clone(),
        true,
        now,
        now,
    ))
}

/// Gets the user identified by `id`, whether active or not.
pub(crate) async fn get_user(ex: &mut Executor, id: UserId) -> DbResult<User> {
    match ex {
        Executor::Sqlite(ex) => {
            let query_str = "SELECT * FROM users WHERE id = ?";
            let raw_user = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            User::try_from(raw_user)
        }
    }
}

/// Gets the users that match `scope` in creation order.
pub(crate) async fn list_users(ex: &mut Executor, scope: ListScope) -> DbResult<Vec<User>> {
    match ex {
        Executor::Sqlite(ex) => {
            let query_str = match scope {
                ListScope::Active => "SELECT * FROM users WHERE is_active = 1 ORDER BY id",
                ListScope::All => "SELECT * FROM users ORDER BY id",
            };
            let rows = sqlx::query(query_str)
                .fetch_all(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            rows.into_iter().map(User::try_from).collect()
        }
    }
}

/// Counts the users that have not been deactivated.
pub(crate) async fn count_active_users(ex: &mut Executor) -> DbResult<u64> {
    match ex {
        Executor::Sqlite(ex) => {
            let query_str = "SELECT COUNT(*) AS count FROM users WHERE is_active = 1";
            let row = sqlx::query(query_str)
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            let count: i64 = row.try_get("count").map_err(sqlite::map_sqlx_error)?;
            u64::try_from(count)
                .map_err(|_| DbError::DataIntegrityError(format!("Invalid user count {}", count)))
        }
    }
}

/// Replaces the mutable fields of user `id` with `update` and records `now` as its modification
/// time.
pub(crate) async fn update_user(
    ex: &mut Executor,
    id: UserId,
    update: UserUpdate,
    now: OffsetDateTime,
) -> DbResult<()> {
    let rows_affected = match ex {
        Executor::Sqlite(ex) => {
            let (now_secs, now_nsecs) = unpack_timestamp(now)?;

            let query_str = "
                UPDATE users
                SET name = ?, bio = ?, avatar_url = ?, updated_at_secs = ?, updated_at_nsecs = ?
                WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(update.name().as_str())
                .bind(update.bio().as_ref().map(Bio::as_str))
                .bind(update.avatar_url().as_ref().map(AvatarUrl::as_str))
                .bind(now_secs)
                .bind(now_nsecs)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Update affected more than one row".to_owned())),
    }
}

/// Marks user `id` as inactive.
///
/// Deactivating a user that is already inactive succeeds and leaves its modification time alone.
pub(crate) async fn deactivate_user(
    ex: &mut Executor,
    id: UserId,
    now: OffsetDateTime,
) -> DbResult<()> {
    let rows_affected = match ex {
        Executor::Sqlite(ex) => {
            let (now_secs, now_nsecs) = unpack_timestamp(now)?;

            let query_str = "
                UPDATE users
                SET
                    updated_at_secs = CASE WHEN is_active THEN ? ELSE updated_at_secs END,
                    updated_at_nsecs = CASE WHEN is_active THEN ? ELSE updated_at_nsecs END,
                    is_active = 0
                WHERE id = ?";
            let done = sqlx::query(query_str)
                .bind(now_secs)
                .bind(now_nsecs)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deactivation affected more than one row".to_owned())),
    }
}

/// Removes user `id` from the database.
pub(crate) async fn delete_user(ex: &mut Executor, id: UserId) -> DbResult<()> {
    let rows_affected = match ex {
        Executor::Sqlite(ex) => {
            let done = sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}
