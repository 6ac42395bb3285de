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

//! Logger initialization for services.
//!
//! All code logs through the `log` facade.  This module configures the `env_logger` backend to
//! emit either human-readable lines or one JSON object per line, the latter being what log
//! collectors in production environments expect.

use crate::env::get_optional_var;
use log::Record;
use serde_json::json;
use std::io::Write;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Default level filter when none is configured.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format of log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,

    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format '{}'; must be text or json", s)),
        }
    }
}

/// Configuration for the logger.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggingOptions {
    /// Level filter in `env_logger` syntax, such as `debug` or `info,sqlx=warn`.
    pub level: String,

    /// Format of the emitted lines.
    pub format: LogFormat,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_owned(), format: LogFormat::default() }
    }
}

impl LoggingOptions {
    /// Creates a new set of options from environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let format = match get_optional_var::<String>(prefix, "LOG_FORMAT")? {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };
        Ok(Self {
            level: get_optional_var::<String>(prefix, "LOG_LEVEL")?
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
            format,
        })
    }
}

/// Renders `record` as a JSON object stamped with `now`.
fn json_line(record: &Record<'_>, now: OffsetDateTime) -> serde_json::Value {
    json!({
        "time": now.format(&Rfc3339).unwrap_or_default(),
        "level": record.level().as_str(),
        "target": record.target(),
        "msg": record.args().to_string(),
    })
}

/// Installs the global logger as described by `options`.
///
/// The `RUST_LOG` variable, if set, takes precedence over the configured level.  Fails if a
/// logger was already installed.
pub fn init(options: &LoggingOptions) -> Result<(), String> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&options.level);
    builder.parse_default_env();
    if options.format == LogFormat::Json {
        builder.format(|buf, record| {
            writeln!(buf, "{}", json_line(record, OffsetDateTime::now_utc()))
        });
    }
    builder.try_init().map_err(|e| format!("Failed to initialize logging: {}", e))
}
