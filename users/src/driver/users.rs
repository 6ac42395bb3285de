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

//! Operations on the collection of users.

use crate::db;
use crate::driver::Driver;
use crate::model::*;
use iii_iv_core::driver::DriverResult;

impl Driver {
    /// Gets the users that match `scope` in creation order.
    pub(crate) async fn list_users(self, scope: ListScope) -> DriverResult<Vec<User>> {
        self.bounded(async {
            let users = db::list_users(&mut self.db.ex().await?, scope).await?;
            Ok(users)
        })
        .await
    }

    /// Counts the users that have not been deactivated.
    pub(crate) async fn count_active_users(self) -> DriverResult<u64> {
        self.bounded(async {
            let count = db::count_active_users(&mut self.db.ex().await?).await?;
            Ok(count)
        })
        .await
    }
}
