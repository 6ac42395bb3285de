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

//! High-level data types.

use derive_getters::Getters;
use derive_more::{Constructor, Display};
use iii_iv_core::model::{EmailAddress, ModelError, ModelResult};
use time::OffsetDateTime;
use url::Url;

/// Maximum length of a user's display name, in characters.
pub(crate) const MAX_NAME_LENGTH: usize = 100;

/// Maximum length of a user's biography, in characters.
pub(crate) const MAX_BIO_LENGTH: usize = 1000;

/// Maximum length of an avatar URL.
pub(crate) const MAX_AVATAR_URL_LENGTH: usize = 2048;

/// Identifier of a user, assigned by the database on creation.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct UserId(i64);

impl UserId {
    /// Creates a user identifier from its database representation.
    pub(crate) fn new(id: i64) -> Self {
        Self(id)
    }

    /// Parses a user identifier from an untrusted string, such as a URL path component.
    pub(crate) fn parse(s: &str) -> ModelResult<Self> {
        match s.parse::<i64>() {
            Ok(id) => Ok(Self(id)),
            Err(_) => Err(ModelError("Invalid user ID".to_owned())),
        }
    }

    /// Returns the identifier as stored in the database.
    pub(crate) fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Display name of a user.
#[derive(Clone, Debug, Display, PartialEq)]
pub(crate) struct UserName(String);

impl UserName {
    /// Creates a new name from an untrusted string `s`, making sure it is valid.
    ///
    /// Surrounding whitespace is dropped.
    pub(crate) fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();
        let s = s.trim();
        if s.is_empty() {
            return Err(ModelError("Name is required".to_owned()));
        }
        if s.chars().count() > MAX_NAME_LENGTH {
            return Err(ModelError(format!(
                "Name cannot be longer than {} characters",
                MAX_NAME_LENGTH
            )));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns a string view of the name.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Free-form description of a user.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Bio(String);

impl Bio {
    /// Creates a new biography from an untrusted string `s`.  Surrounding whitespace is dropped
    /// and an empty biography is represented as `None`.
    pub(crate) fn new_optional<S: Into<String>>(s: S) -> ModelResult<Option<Self>> {
        let s = s.into();
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        if s.chars().count() > MAX_BIO_LENGTH {
            return Err(ModelError(format!(
                "Bio cannot be longer than {} characters",
                MAX_BIO_LENGTH
            )));
        }
        Ok(Some(Self(s.to_owned())))
    }

    /// Returns a string view of the biography.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Absolute http(s) URL of a user's picture, kept as submitted minus surrounding whitespace.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AvatarUrl(String);

impl AvatarUrl {
    /// Creates a new avatar URL from an untrusted string `s`.  Surrounding whitespace is dropped
    /// and an empty URL is represented as `None`.
    pub(crate) fn new_optional<S: Into<String>>(s: S) -> ModelResult<Option<Self>> {
        let s = s.into();
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        if s.len() > MAX_AVATAR_URL_LENGTH {
            return Err(ModelError("Avatar URL is too long".to_owned()));
        }
        let url = Url::parse(s).map_err(|e| ModelError(format!("Invalid avatar URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" => Ok(Some(Self(s.to_owned()))),
            scheme => {
                Err(ModelError(format!("Avatar URL must use http or https, not {}", scheme)))
            }
        }
    }

    /// Returns a string view of the URL.
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which users to include in a listing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ListScope {
    /// Only users that have not been deactivated.
    Active,

    /// All users, active or not.
    All,
}

/// Details of a user to be created.
#[derive(Clone, Constructor, Debug, Getters, PartialEq)]
pub(crate) struct NewUser {
    /// Email address, which must not be in use by any other user.
    email: EmailAddress,

    /// Display name.
    name: UserName,

    /// Optional biography.
    bio: Option<Bio>,

    /// Optional picture.
    avatar_url: Option<AvatarUrl>,
}

/// New values for the mutable fields of an existing user.
#[derive(Clone, Constructor, Debug, Getters, PartialEq)]
pub(crate) struct UserUpdate {
    /// Display name.
    name: UserName,

    /// Optional biography.  `None` clears any existing value.
    bio: Option<Bio>,

    /// Optional picture.  `None` clears any existing value.
    avatar_url: Option<AvatarUrl>,
}

/// A user as stored in the database.
#[derive(Clone, Constructor, Debug, Getters, PartialEq)]
pub(crate) struct User {
    /// Identifier assigned on creation.
    id: UserId,

    /// Email address.  Immutable after creation.
    email: EmailAddress,

    /// Display name.
    name: UserName,

    /// Optional biography.
    bio: Option<Bio>,

    /// Optional picture.
    avatar_url: Option<AvatarUrl>,

    /// Whether the user has not been deactivated.
    is_active: bool,

    /// When the user was created.
    created_at: OffsetDateTime,

    /// When the user was last modified.
    updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userid_parse() {
        assert_eq!(UserId::new(42), UserId::parse("42").unwrap());
        assert_eq!(ModelError("Invalid user ID".to_owned()), UserId::parse("abc").unwrap_err());
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("1.5").is_err());
        assert!(UserId::parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_username() {
        assert_eq!("John Doe", UserName::new("  John Doe ").unwrap().as_str());
        assert_eq!(ModelError("Name is required".to_owned()), UserName::new("").unwrap_err());
        assert_eq!(ModelError("Name is required".to_owned()), UserName::new(" \t").unwrap_err());
        assert!(UserName::new("a".repeat(MAX_NAME_LENGTH)).is_ok());
        assert!(UserName::new("a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_bio() {
        assert_eq!(None, Bio::new_optional("   ").unwrap());
        assert_eq!("Hello", Bio::new_optional(" Hello ").unwrap().unwrap().as_str());
        assert!(Bio::new_optional("b".repeat(MAX_BIO_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_avatarurl() {
        assert_eq!(None, AvatarUrl::new_optional("").unwrap());
        assert_eq!(
            "https://example.com/a.png",
            AvatarUrl::new_optional("https://example.com/a.png").unwrap().unwrap().as_str()
        );
        assert_eq!(
            "https://example.com",
            AvatarUrl::new_optional(" https://example.com\t").unwrap().unwrap().as_str()
        );
        assert_eq!(
            "HTTPS://Example.com/a%7e.png",
            AvatarUrl::new_optional("HTTPS://Example.com/a%7e.png").unwrap().unwrap().as_str()
        );
        assert!(AvatarUrl::new_optional("not a url").unwrap_err().0.contains("Invalid avatar URL"));
        assert!(AvatarUrl::new_optional("javascript:alert(1)").unwrap_err().0.contains("http"));
        assert!(AvatarUrl::new_optional("/relative.png").is_err());
    }
}
