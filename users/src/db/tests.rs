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

//! Tests for the users database operations.

use crate::db::*;
use iii_iv_core::clocks::testutils::utc_datetime;
use iii_iv_core::db::Db;

/// Prepares the schema in `db` so that it can hold users.
async fn setup_schema(db: &dyn Db) {
    init_schema(&mut db.ex().await.unwrap()).await.unwrap();
}

/// Syntactic sugar to describe a new user given only the local part of its email address.
fn simple_new_user(local: &str, name: &str) -> NewUser {
    NewUser::new(
        EmailAddress::new(format!("{}@example.com", local)).unwrap(),
        UserName::new(name).unwrap(),
        None,
        None,
    )
}

/// Creates a user given only the local part of its email address.
async fn create_simple_user(ex: &mut Executor, local: &str) -> User {
    create_user(ex, simple_new_user(local, local), utc_datetime(2024, 1, 1, 0, 0, 0)).await.unwrap()
}

/// Extracts the identifiers of `users`.
fn ids(users: &[User]) -> Vec<i64> {
    users.iter().map(|u| u.id().as_i64()).collect()
}

pub(super) async fn test_init_schema_is_idempotent(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();
    create_simple_user(&mut ex, "first").await;

    init_schema(&mut ex).await.unwrap();
    assert_eq!(1, count_active_users(&mut ex).await.unwrap());
}

pub(super) async fn test_create_and_get(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let now = utc_datetime(2024, 3, 15, 10, 20, 30);
    let new_user = NewUser::new(
        EmailAddress::from("john@example.com"),
        UserName::new("John Doe").unwrap(),
        Bio::new_optional("Hello there").unwrap(),
        AvatarUrl::new_optional("https://example.com/john.png").unwrap(),
    );
    let user = create_user(&mut ex, new_user, now).await.unwrap();
    assert_eq!("john@example.com", user.email().as_str());
    assert_eq!("John Doe", user.name().as_str());
    assert_eq!(Some("Hello there"), user.bio().as_ref().map(Bio::as_str));
    assert_eq!(
        Some("https://example.com/john.png"),
        user.avatar_url().as_ref().map(AvatarUrl::as_str)
    );
    assert!(*user.is_active());
    assert_eq!(now, *user.created_at());
    assert_eq!(now, *user.updated_at());

    assert_eq!(user, get_user(&mut ex, *user.id()).await.unwrap());
}

pub(super) async fn test_create_assigns_increasing_ids(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user1 = create_simple_user(&mut ex, "a").await;
    let user2 = create_simple_user(&mut ex, "b").await;
    assert!(user2.id() > user1.id());
}

pub(super) async fn test_create_empty_optionals_are_null(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user = create_simple_user(&mut ex, "plain").await;
    match &mut ex {
        Executor::Sqlite(ex) => {
            let row = sqlx::query("SELECT bio IS NULL AND avatar_url IS NULL AS nulls FROM users")
                .fetch_one(ex.conn())
                .await
                .unwrap();
            let nulls: i64 = row.try_get("nulls").unwrap();
            assert_eq!(1, nulls);
        }
    }
    assert_eq!(&None, get_user(&mut ex, *user.id()).await.unwrap().bio());
}

pub(super) async fn test_create_duplicate_email(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user = create_simple_user(&mut ex, "dup").await;
    let now = utc_datetime(2024, 1, 2, 0, 0, 0);
    assert_eq!(
        DbError::AlreadyExists,
        create_user(&mut ex, simple_new_user("dup", "Other name"), now).await.unwrap_err()
    );

    deactivate_user(&mut ex, *user.id(), now).await.unwrap();
    assert_eq!(
        DbError::AlreadyExists,
        create_user(&mut ex, simple_new_user("dup", "Other name"), now).await.unwrap_err()
    );

    assert_eq!(vec![user.id().as_i64()], ids(&list_users(&mut ex, ListScope::All).await.unwrap()));
}

pub(super) async fn test_create_aborted_tx(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;

    {
        let mut tx = db.begin().await.unwrap();
        create_simple_user(tx.ex(), "ghost").await;
    }

    assert_eq!(0, count_active_users(&mut db.ex().await.unwrap()).await.unwrap());
}

pub(super) async fn test_get_not_found(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    assert_eq!(DbError::NotFound, get_user(&mut ex, UserId::new(999)).await.unwrap_err());
}

pub(super) async fn test_get_corrupted_email(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    match &mut ex {
        Executor::Sqlite(ex) => {
            sqlx::query(
                "INSERT INTO users (id, email, name, created_at_secs, created_at_nsecs,
                    updated_at_secs, updated_at_nsecs)
                VALUES (5, 'not-an-email', 'Broken', 0, 0, 0, 0)",
            )
            .execute(ex.conn())
            .await
            .unwrap();
        }
    }

    match get_user(&mut ex, UserId::new(5)).await {
        Err(DbError::DataIntegrityError(msg)) => assert!(msg.contains("not-an-email")),
        e => panic!("{:?}", e),
    }
}

pub(super) async fn test_list_empty(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    assert!(list_users(&mut ex, ListScope::Active).await.unwrap().is_empty());
    assert!(list_users(&mut ex, ListScope::All).await.unwrap().is_empty());
    assert_eq!(0, count_active_users(&mut ex).await.unwrap());
}

pub(super) async fn test_list_scopes_and_count(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user1 = create_simple_user(&mut ex, "one").await;
    let user2 = create_simple_user(&mut ex, "two").await;
    let user3 = create_simple_user(&mut ex, "three").await;
    assert_eq!(3, count_active_users(&mut ex).await.unwrap());

    deactivate_user(&mut ex, *user2.id(), utc_datetime(2024, 2, 1, 0, 0, 0)).await.unwrap();

    let active = list_users(&mut ex, ListScope::Active).await.unwrap();
    assert_eq!(vec![user1.id().as_i64(), user3.id().as_i64()], ids(&active));
    assert_eq!(2, count_active_users(&mut ex).await.unwrap());

    let all = list_users(&mut ex, ListScope::All).await.unwrap();
    assert_eq!(
        vec![user1.id().as_i64(), user2.id().as_i64(), user3.id().as_i64()],
        ids(&all)
    );
    assert!(!*all[1].is_active());
}

pub(super) async fn test_update_ok(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user = create_simple_user(&mut ex, "editme").await;
    let later = utc_datetime(2024, 5, 5, 5, 5, 5);
    let update = UserUpdate::new(
        UserName::new("New Name").unwrap(),
        Bio::new_optional("New bio").unwrap(),
        AvatarUrl::new_optional("http://example.com/new.png").unwrap(),
    );
    update_user(&mut ex, *user.id(), update, later).await.unwrap();

    let updated = get_user(&mut ex, *user.id()).await.unwrap();
    assert_eq!(user.email(), updated.email());
    assert_eq!("New Name", updated.name().as_str());
    assert_eq!(Some("New bio"), updated.bio().as_ref().map(Bio::as_str));
    assert_eq!(
        Some("http://example.com/new.png"),
        updated.avatar_url().as_ref().map(AvatarUrl::as_str)
    );
    assert_eq!(user.created_at(), updated.created_at());
    assert_eq!(later, *updated.updated_at());

    let update = UserUpdate::new(UserName::new("New Name").unwrap(), None, None);
    update_user(&mut ex, *user.id(), update, later).await.unwrap();
    let updated = get_user(&mut ex, *user.id()).await.unwrap();
    assert_eq!(&None, updated.bio());
    assert_eq!(&None, updated.avatar_url());
}

pub(super) async fn test_update_not_found(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let update = UserUpdate::new(UserName::new("Nobody").unwrap(), None, None);
    assert_eq!(
        DbError::NotFound,
        update_user(&mut ex, UserId::new(42), update, utc_datetime(2024, 1, 1, 0, 0, 0))
            .await
            .unwrap_err()
    );
}

pub(super) async fn test_deactivate_is_idempotent(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user = create_simple_user(&mut ex, "leaving").await;

    let first = utc_datetime(2024, 6, 1, 0, 0, 0);
    deactivate_user(&mut ex, *user.id(), first).await.unwrap();
    let deactivated = get_user(&mut ex, *user.id()).await.unwrap();
    assert!(!*deactivated.is_active());
    assert_eq!(first, *deactivated.updated_at());

    let second = utc_datetime(2024, 7, 1, 0, 0, 0);
    deactivate_user(&mut ex, *user.id(), second).await.unwrap();
    assert_eq!(deactivated, get_user(&mut ex, *user.id()).await.unwrap());
}

pub(super) async fn test_deactivate_not_found(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    assert_eq!(
        DbError::NotFound,
        deactivate_user(&mut ex, UserId::new(7), utc_datetime(2024, 1, 1, 0, 0, 0))
            .await
            .unwrap_err()
    );
}

pub(super) async fn test_delete_ok(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    let user1 = create_simple_user(&mut ex, "keep").await;
    let user2 = create_simple_user(&mut ex, "gone").await;

    delete_user(&mut ex, *user2.id()).await.unwrap();
    assert_eq!(DbError::NotFound, get_user(&mut ex, *user2.id()).await.unwrap_err());
    assert_eq!(DbError::NotFound, delete_user(&mut ex, *user2.id()).await.unwrap_err());
    assert_eq!(vec![user1.id().as_i64()], ids(&list_users(&mut ex, ListScope::All).await.unwrap()));
}

pub(super) async fn test_delete_not_found(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    let mut ex = db.ex().await.unwrap();

    assert_eq!(DbError::NotFound, delete_user(&mut ex, UserId::new(1)).await.unwrap_err());
}

pub(super) async fn test_ping(db: Box<dyn Db + Send + Sync>) {
    ping(&mut db.ex().await.unwrap()).await.unwrap();
}

pub(super) async fn test_unavailable_after_close(db: Box<dyn Db + Send + Sync>) {
    setup_schema(db.as_ref()).await;
    create_simple_user(&mut db.ex().await.unwrap(), "closed").await;

    db.close().await;

    assert_eq!(DbError::Unavailable, db.ex().await.unwrap_err());
    assert_eq!(DbError::Unavailable, db.begin().await.unwrap_err());
}

macro_rules! generate_db_tests [
    ( $setup:expr $(, #[$extra:meta] )? ) => {
        iii_iv_core::db::testutils::generate_tests!(
            $(#[$extra],)?
            $setup,
            $crate::db::tests,
            test_init_schema_is_idempotent,
            test_create_and_get,
            test_create_assigns_increasing_ids,
            test_create_empty_optionals_are_null,
            test_create_duplicate_email,
            test_create_aborted_tx,
            test_get_not_found,
            test_get_corrupted_email,
            test_list_empty,
            test_list_scopes_and_count,
            test_update_ok,
            test_update_not_found,
            test_deactivate_is_idempotent,
            test_deactivate_not_found,
            test_delete_ok,
            test_delete_not_found,
            test_ping,
            test_unavailable_after_close
        );
    }
];

mod sqlite {
    use iii_iv_core::db::sqlite::testutils::setup;

    generate_db_tests!(Box::new(setup().await));
}
