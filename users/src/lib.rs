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

//! Server-rendered user management service.
//!
//! The service keeps a table of users in SQLite and exposes CRUD operations over HTTP.  Responses
//! are HTML fragments meant to be swapped into the page by a hypermedia-driven front end, which
//! learns about changes through `HX-Trigger` event headers.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use iii_iv_core::clocks::{Clock, SystemClock};
use iii_iv_core::db::sqlite::{self, SqliteDb};
use iii_iv_core::db::{Db, DbResult};
use iii_iv_core::env::get_optional_var;
use iii_iv_core::logging::{LogFormat, LoggingOptions};
use iii_iv_core::pipeline::{Pipeline, PipelineOptions};
use log::{info, warn};
use sqlx::migrate::Migrator;
use std::error::Error;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinError;

mod db;
mod driver;
use driver::Driver;
mod model;
mod rest;

/// Versioned migrations applied on top of the base schema.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Default address to listen on.
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default port to listen on.
const DEFAULT_PORT: u16 = 8080;

/// Default database connection string.
const DEFAULT_DATABASE_URL: &str = "sqlite://data.db?mode=rwc";

/// Default directory to serve static assets from.
const DEFAULT_STATIC_DIR: &str = "static";

/// Default grace period for in-flight requests on shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Deployment environment of the service.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Environment {
    /// Local development, with permissive defaults.
    #[default]
    Development,

    /// Production deployment, with locked-down settings.
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            _ => Err(format!("Invalid environment '{}'; must be development or production", s)),
        }
    }
}

/// Configuration for the whole service.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    /// Address to listen on.
    pub host: IpAddr,

    /// Port to listen on.
    pub port: u16,

    /// Connection string for the SQLite database.
    pub database_url: String,

    /// Whether to apply pending migrations after initializing the schema.
    pub run_migrations: bool,

    /// Directory with the static assets served under `/static`.
    pub static_dir: PathBuf,

    /// Maximum time to wait for in-flight requests on shutdown.
    pub shutdown_timeout: Duration,

    /// Deployment environment.
    pub environment: Environment,

    /// Logger configuration.
    pub logging: LoggingOptions,

    /// Request pipeline configuration.
    pub pipeline: PipelineOptions,
}

impl ServerOptions {
    /// Creates a new set of options from environment variables.
    ///
    /// The production environment overrides some settings: logs are always JSON, cross-origin
    /// requests are not allowed from any origin, and migrations are left to external tooling.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let environment = match get_optional_var::<String>(prefix, "ENVIRONMENT")? {
            Some(raw) => raw.parse::<Environment>()?,
            None => Environment::default(),
        };

        let mut logging = LoggingOptions::from_env(prefix)?;
        let mut pipeline = PipelineOptions::from_env(prefix)?;
        let mut run_migrations =
            get_optional_var::<bool>(prefix, "RUN_MIGRATIONS")?.unwrap_or(true);
        if environment == Environment::Production {
            logging.format = LogFormat::Json;
            if let Some(cors) = pipeline.cors.as_mut() {
                cors.allowed_origins.clear();
            }
            run_migrations = false;
        }

        Ok(Self {
            host: get_optional_var::<IpAddr>(prefix, "HOST")?.unwrap_or(DEFAULT_HOST),
            port: get_optional_var::<u16>(prefix, "PORT")?.unwrap_or(DEFAULT_PORT),
            database_url: get_optional_var::<String>(prefix, "DATABASE_URL")?
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            run_migrations,
            static_dir: PathBuf::from(
                get_optional_var::<String>(prefix, "STATIC_DIR")?
                    .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_owned()),
            ),
            shutdown_timeout: get_optional_var::<Duration>(prefix, "SHUTDOWN_TIMEOUT")?
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            environment,
            logging,
            pipeline,
        })
    }
}

/// Initializes the schema of `db` and, if `run_migrations` is true, applies pending migrations.
async fn prepare(db: &SqliteDb, run_migrations: bool) -> DbResult<()> {
    db::init_schema(&mut db.ex().await?).await?;
    info!("Database schema initialized");

    if run_migrations {
        db.migrate(&MIGRATOR).await?;
        info!("Database migrations applied");
    }
    Ok(())
}

/// Connects to the database at `database_url` and gets it ready to serve requests.
///
/// The database is closed again if it cannot be prepared.
pub async fn connect_and_prepare(database_url: &str, run_migrations: bool) -> DbResult<SqliteDb> {
    let db = sqlite::connect(database_url).await?;
    info!("Connected to database");

    if let Err(e) = prepare(&db, run_migrations).await {
        db.close().await;
        return Err(e);
    }
    Ok(db)
}

/// Waits until the process is asked to terminate.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => (),
        () = terminate => (),
    }
    info!("Shutdown signal received");
}

/// Flattens the outcome of the server task.
fn server_outcome(result: Result<std::io::Result<()>, JoinError>) -> Result<(), Box<dyn Error>> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(e.into()),
    }
}

/// Serves the application on `listener` until `shutdown` completes or the server fails.
///
/// On shutdown, stops accepting connections and waits up to the configured grace period for
/// in-flight requests before abandoning them.  The database is closed in all cases.
async fn serve_on<F>(
    listener: TcpListener,
    db: Arc<SqliteDb>,
    options: &ServerOptions,
    shutdown: F,
) -> Result<(), Box<dyn Error>>
where
    F: Future<Output = ()>,
{
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(SystemClock::default());
    let driver = Driver::new(db.clone(), clock.clone());
    let pipeline = Pipeline::new(options.pipeline.clone(), clock);
    let app = rest::app(driver, &options.static_dir, pipeline);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    let result = tokio::select! {
        result = &mut server => {
            warn!("Server stopped unexpectedly");
            server_outcome(result)
        }
        () = shutdown => {
            info!(
                "Waiting up to {:?} for in-flight requests to complete",
                options.shutdown_timeout
            );
            let _ = stop_tx.send(());
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => server_outcome(result),
                Err(_) => {
                    warn!("Grace period expired; abandoning in-flight requests");
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    db.close().await;
    info!("Shutdown complete");
    result
}

/// Instantiates all resources to serve the application as configured by `options`.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(options: ServerOptions) -> Result<(), Box<dyn Error>> {
    let db = Arc::new(connect_and_prepare(&options.database_url, options.run_migrations).await?);

    let bind_addr = SocketAddr::new(options.host, options.port);
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            db.close().await;
            return Err(format!("Cannot listen on {}: {}", bind_addr, e).into());
        }
    };
    info!("Listening on {}", bind_addr);

    serve_on(listener, db, &options, shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// Names of all the variables read by `ServerOptions::from_env` with the `TEST` prefix.
    const ALL_VARS: [&str; 16] = [
        "TEST_HOST",
        "TEST_PORT",
        "TEST_DATABASE_URL",
        "TEST_RUN_MIGRATIONS",
        "TEST_STATIC_DIR",
        "TEST_SHUTDOWN_TIMEOUT",
        "TEST_ENVIRONMENT",
        "TEST_LOG_LEVEL",
        "TEST_LOG_FORMAT",
        "TEST_READ_TIMEOUT",
        "TEST_ENABLE_CORS",
        "TEST_ALLOWED_ORIGINS",
        "TEST_RATE_LIMIT",
        "TEST_RATE_LIMIT_BURST",
        "TEST_RATE_LIMIT_EXPIRY",
        "RUST_LOG",
    ];

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::Development, "development".parse().unwrap());
        assert_eq!(Environment::Production, "PRODUCTION".parse().unwrap());
        assert!("staging".parse::<Environment>().unwrap_err().contains("Invalid environment"));
    }

    #[test]
    fn test_serveroptions_from_env_defaults() {
        temp_env::with_vars_unset(ALL_VARS, || {
            let options = ServerOptions::from_env("TEST").unwrap();
            assert_eq!(
                ServerOptions {
                    host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    port: 8080,
                    database_url: "sqlite://data.db?mode=rwc".to_owned(),
                    run_migrations: true,
                    static_dir: PathBuf::from("static"),
                    shutdown_timeout: Duration::from_secs(30),
                    environment: Environment::Development,
                    logging: LoggingOptions::default(),
                    pipeline: PipelineOptions::default(),
                },
                options
            );
        });
    }

    #[test]
    fn test_serveroptions_from_env_overrides() {
        let mut vars = ALL_VARS.iter().map(|name| (*name, None)).collect::<Vec<_>>();
        vars.extend([
            ("TEST_HOST", Some("127.0.0.1")),
            ("TEST_PORT", Some("9000")),
            ("TEST_DATABASE_URL", Some(":memory:")),
            ("TEST_RUN_MIGRATIONS", Some("false")),
            ("TEST_STATIC_DIR", Some("/srv/assets")),
            ("TEST_SHUTDOWN_TIMEOUT", Some("5s")),
            ("TEST_LOG_FORMAT", Some("json")),
            ("TEST_READ_TIMEOUT", Some("2s")),
            ("TEST_ENABLE_CORS", Some("false")),
        ]);
        temp_env::with_vars(vars, || {
            let options = ServerOptions::from_env("TEST").unwrap();
            assert_eq!(IpAddr::V4(Ipv4Addr::LOCALHOST), options.host);
            assert_eq!(9000, options.port);
            assert_eq!(":memory:", options.database_url);
            assert!(!options.run_migrations);
            assert_eq!(PathBuf::from("/srv/assets"), options.static_dir);
            assert_eq!(Duration::from_secs(5), options.shutdown_timeout);
            assert_eq!(LogFormat::Json, options.logging.format);
            assert_eq!(Duration::from_secs(2), options.pipeline.handler_timeout);
            assert_eq!(None, options.pipeline.cors);
        });
    }

    #[test]
    fn test_serveroptions_from_env_production() {
        let mut vars = ALL_VARS.iter().map(|name| (*name, None)).collect::<Vec<_>>();
        vars.extend([
            ("TEST_ENVIRONMENT", Some("production")),
            ("TEST_RUN_MIGRATIONS", Some("true")),
            ("TEST_LOG_FORMAT", Some("text")),
            ("TEST_ALLOWED_ORIGINS", Some("https://example.com")),
        ]);
        temp_env::with_vars(vars, || {
            let options = ServerOptions::from_env("TEST").unwrap();
            assert_eq!(Environment::Production, options.environment);
            assert!(!options.run_migrations);
            assert_eq!(LogFormat::Json, options.logging.format);
            let origins = options.pipeline.cors.map(|cors| cors.allowed_origins);
            assert_eq!(Some(Vec::<String>::new()), origins);
        });
    }

    #[test]
    fn test_serveroptions_from_env_bad_values() {
        for (name, value) in
            [("TEST_ENVIRONMENT", "staging"), ("TEST_PORT", "http"), ("TEST_HOST", "localhost")]
        {
            let mut vars = ALL_VARS.iter().map(|name| (*name, None)).collect::<Vec<_>>();
            vars.push((name, Some(value)));
            temp_env::with_vars(vars, || {
                assert!(ServerOptions::from_env("TEST").is_err(), "{} should be rejected", name);
            });
        }
    }

    #[tokio::test]
    async fn test_connect_and_prepare_with_migrations() {
        let db = connect_and_prepare(":memory:", true).await.unwrap();
        prepare(&db, true).await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_and_prepare_bad_url() {
        assert!(connect_and_prepare("postgres://localhost/db", false).await.is_err());
    }

    /// Sends a bare HTTP/1.1 GET request for `path` to `addr` and returns the raw response.
    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serve_on_until_shutdown() {
        let db = Arc::new(connect_and_prepare(":memory:", true).await.unwrap());
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let options = ServerOptions {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: addr.port(),
            database_url: ":memory:".to_owned(),
            run_migrations: true,
            static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"),
            shutdown_timeout: Duration::from_secs(5),
            environment: Environment::Development,
            logging: LoggingOptions::default(),
            pipeline: PipelineOptions::default(),
        };

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shutdown = async {
            let _ = stop_rx.await;
        };
        let client = async {
            let response = http_get(addr, "/health").await;
            assert!(response.starts_with("HTTP/1.1 200 OK"), "Unexpected response: {}", response);
            assert!(response.contains("\"status\":\"ok\""));
            assert!(response.to_ascii_lowercase().contains("x-request-id:"));

            let response = http_get(addr, "/api/users/count").await;
            assert!(response.contains("<span id=\"user-count\">0</span>"));

            stop_tx.send(()).unwrap();
        };
        let (result, ()) = tokio::join!(serve_on(listener, db.clone(), &options, shutdown), client);
        result.unwrap();

        assert!(db.ex().await.is_err());
    }
}
