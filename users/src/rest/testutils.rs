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

//! Test utilities for the REST API.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use crate::rest::app;
use axum::Router;
use iii_iv_core::clocks::Clock;
use iii_iv_core::clocks::testutils::{SettableClock, utc_datetime};
use iii_iv_core::db::Db;
use iii_iv_core::model::EmailAddress;
use iii_iv_core::pipeline::{Pipeline, PipelineOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Returns the directory holding the static assets shipped with the service.
pub(crate) fn static_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
}

/// State of a running test.
pub(crate) struct TestContext {
    /// The database backing the app.
    db: Arc<dyn Db + Send + Sync>,

    /// The clock backing the app, which only moves when told to.
    clock: Arc<SettableClock>,

    /// The app under test, with the full request pipeline in place.
    app: Router,
}

impl TestContext {
    /// Initializes the app using an in-memory database and a stopped clock.
    pub(crate) async fn setup() -> Self {
        let db: Arc<dyn Db + Send + Sync> =
            Arc::new(iii_iv_core::db::sqlite::testutils::setup().await);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let clock = Arc::new(SettableClock::new(utc_datetime(2024, 1, 15, 9, 30, 0)));
        let driver = Driver::new(db.clone(), clock.clone());
        let pipeline = Pipeline::new(PipelineOptions::default(), clock.clone());
        let app = app(driver, &static_dir(), pipeline);
        Self { db, clock, app }
    }

    /// Gets a copy of the app, sharing state with any other copies.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Consumes the context and returns the app.
    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    /// Moves the clock seen by the app forward by `delta`.
    pub(crate) fn advance_clock(&self, delta: Duration) {
        self.clock.advance(delta);
    }

    /// Closes the database so that any further access fails.
    pub(crate) async fn close_db(&self) {
        self.db.close().await;
    }

    /// Creates an active user directly in the database and returns its identifier.
    pub(crate) async fn create_user(&self, name: &str, email: &str) -> UserId {
        let new_user =
            NewUser::new(EmailAddress::from(email), UserName::new(name).unwrap(), None, None);
        let user = db::create_user(&mut self.db.ex().await.unwrap(), new_user, self.clock.now_utc())
            .await
            .unwrap();
        *user.id()
    }

    /// Deactivates user `id` directly in the database.
    pub(crate) async fn deactivate_user(&self, id: UserId) {
        db::deactivate_user(&mut self.db.ex().await.unwrap(), id, self.clock.now_utc())
            .await
            .unwrap();
    }

    /// Gets user `id` directly from the database.
    pub(crate) async fn get_user(&self, id: UserId) -> User {
        db::get_user(&mut self.db.ex().await.unwrap(), id).await.unwrap()
    }

    /// Gets all users, active or not, directly from the database.
    pub(crate) async fn all_users(&self) -> Vec<User> {
        db::list_users(&mut self.db.ex().await.unwrap(), ListScope::All).await.unwrap()
    }
}
