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

//! Generic data types shared by services.
//!
//! Every service should define its own `model` module with the newtypes that represent the
//! concepts of its domain.  Constructors of those types validate their input and return a
//! `ModelError` when the input is not acceptable, so that holding a value of the type is proof
//! that the value is valid.

mod emailaddress;
pub use emailaddress::EmailAddress;

/// Model errors.  These are all validation failures of user-supplied data.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;
