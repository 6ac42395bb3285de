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

//! Cross-origin resource sharing.

use crate::env::get_optional_var;
use axum::Router;
use axum::http::{HeaderValue, Method};
use log::warn;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// How long browsers may cache the answer to a preflight request.
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// Configuration for cross-origin requests.
#[derive(Clone, Debug, PartialEq)]
pub struct CorsOptions {
    /// Origins allowed to issue cross-origin requests.  `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self { allowed_origins: vec!["*".to_owned()] }
    }
}

impl CorsOptions {
    /// Creates a new set of options from environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        Ok(Self {
            allowed_origins: get_optional_var::<Vec<String>>(prefix, "ALLOWED_ORIGINS")?
                .unwrap_or_else(|| CorsOptions::default().allowed_origins),
        })
    }
}

/// Builds the CORS layer described by `options`.
fn layer(options: &CorsOptions) -> CorsLayer {
    let allow_origin = if options.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = options.allowed_origins.iter().filter_map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| warn!("Ignoring invalid CORS origin '{}'", o))
                .ok()
        });
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Adds the CORS stage to `router`.
pub(super) fn apply(router: Router, options: &CorsOptions) -> Router {
    router.layer(layer(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testutils::OneShotBuilder;
    use axum::routing::get;

    /// Builds a router with CORS restricted to `origins`.
    fn app(origins: &[&str]) -> Router {
        let options =
            CorsOptions { allowed_origins: origins.iter().map(|o| (*o).to_owned()).collect() };
        apply(Router::new().route("/", get(|| async { "hello" })), &options)
    }

    #[test]
    fn test_corsoptions_from_env() {
        let origins = "https://a.example, https://b.example";
        temp_env::with_var("CORSTEST_ALLOWED_ORIGINS", Some(origins), || {
            assert_eq!(
                vec!["https://a.example".to_owned(), "https://b.example".to_owned()],
                CorsOptions::from_env("CORSTEST").unwrap().allowed_origins
            );
        });
        temp_env::with_var_unset("CORSTEST_ALLOWED_ORIGINS", || {
            assert_eq!(CorsOptions::default(), CorsOptions::from_env("CORSTEST").unwrap());
        });
    }

    #[tokio::test]
    async fn test_wildcard_origin() {
        OneShotBuilder::new(app(&["*"]), (Method::GET, "/"))
            .with_header("origin", "https://anything.example")
            .send_empty()
            .await
            .expect_header("access-control-allow-origin", "*")
            .expect_text("hello")
            .await;
    }

    #[tokio::test]
    async fn test_listed_origin() {
        OneShotBuilder::new(app(&["https://app.example"]), (Method::GET, "/"))
            .with_header("origin", "https://app.example")
            .send_empty()
            .await
            .expect_header("access-control-allow-origin", "https://app.example")
            .expect_text("hello")
            .await;
    }

    #[tokio::test]
    async fn test_unlisted_origin() {
        OneShotBuilder::new(app(&["https://app.example"]), (Method::GET, "/"))
            .with_header("origin", "https://evil.example")
            .send_empty()
            .await
            .expect_no_header("access-control-allow-origin")
            .expect_text("hello")
            .await;
    }

    #[tokio::test]
    async fn test_preflight() {
        let response = OneShotBuilder::new(app(&["*"]), (Method::OPTIONS, "/"))
            .with_header("origin", "https://app.example")
            .with_header("access-control-request-method", "DELETE")
            .send_empty()
            .await
            .expect_header("access-control-max-age", "86400")
            .take_response()
            .await;
        let methods = response.headers().get("access-control-allow-methods").unwrap();
        let methods = methods.to_str().unwrap();
        for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            assert!(methods.contains(method), "{} not in {}", method, methods);
        }
    }
}
