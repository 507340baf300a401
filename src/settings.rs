use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use config::{Config, Environment, File};

use secrecy::Secret;

use serde::Deserialize;
use serde_aux::prelude::*;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use url::Url;

/// Runtime environment, either `Dev` for local development, or `Prod` for release
#[derive(Debug)]
pub enum Runtime {
    Dev,
    Prod,
}

impl Runtime {
    pub fn as_str(&self) -> &str {
        match self {
            Runtime::Dev => "dev",
            Runtime::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = anyhow::Error;

    fn try_from(s: String) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => anyhow::bail!("{} is not a valid runtime environment", other),
        }
    }
}

/// Application settings wrapper
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub log_filter: String,
    pub catalog: CatalogSettings,
    pub poller: PollerSettings,
    pub mediator: MediatorSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load application settings from the settings directory
    pub fn load() -> anyhow::Result<Self> {
        let path = env::current_dir()?.join("settings");
        // Get the current environment based on the `APP_ENV` environment variable, default to `Dev`
        let runtime: Runtime = env::var("APP_ENV")
            .unwrap_or_else(|_| "dev".into())
            .try_into()?;

        Self::load_from(runtime, &path)
    }
    /// Load application settings from a specified path and runtime
    pub fn load_from(runtime: Runtime, base_path: &Path) -> anyhow::Result<Self> {
        Config::builder()
            .add_source(File::from(base_path.join("base")).required(true))
            .add_source(File::from(base_path.join(runtime.as_str())).required(true))
            // NOTE: Should be used for any prod secrets. Takes the form `APP_<settings category>__<setting name>`.
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Failed to load/deserialize settings")
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogSettings {
    base_url: String,
    language: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    timeout_milliseconds: u64,
}

impl CatalogSettings {
    /// The catalog site root, e.g. `https://shop.example/`
    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.base_url).context("Failed to parse catalog base URL")
    }
    /// The catalog language segment, e.g. `ru`
    pub fn language(&self) -> &str {
        &self.language
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct PollerSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    interval_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_concurrent_fetches: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub snapshot_buffer: usize,
}

impl PollerSettings {
    /// Time between two polls of the watch-list
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_milliseconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct MediatorSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub notification_buffer: usize,
}

/// Which subscription store backend to run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize)]
pub struct StorageSettings {
    pub driver: StorageDriver,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    timeout_milliseconds: u64,
    /// Connection settings, required by the `postgres` driver
    pub database: Option<DatabaseSettings>,
}

impl StorageSettings {
    /// Upper bound for a single store operation
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    port: u16,
    host: String,
    name: String,
    username: String,
    password: Secret<String>,
    require_ssl: bool,
}

impl DatabaseSettings {
    /// The database connection options, without specifying the database name
    pub fn without_db(&self) -> PgConnectOptions {
        use secrecy::ExposeSecret;

        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .port(self.port)
            .host(&self.host)
            .ssl_mode(ssl_mode)
            .username(&self.username)
            .password(self.password.expose_secret())
    }
    /// The database connection options, with the database name
    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.name)
    }
}
