pub mod model;
pub mod notifier;
pub mod poll;
pub mod registry;
pub mod source;
pub mod store;
pub mod tracker;

use crate::error::ConfigError;
use crate::model::Direction;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const ENV_VAR_PREFIX: &str = "ENROUTE__";
pub const SETTINGS_FILE: &str = "Settings.toml";

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_RESULT_LIMIT: usize = 120;
pub const DEFAULT_HEALTH_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub airport: String,
    #[serde(default)]
    pub direction: Direction,
    pub poller: Option<PollerConfig>,
    pub flightaware: Option<FlightAwareConfig>,
    pub replay: Option<ReplayConfig>,
    pub postgres: Option<PostgresConfig>,
    pub health: Option<HealthConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    pub interval_seconds: u64,
    pub result_limit: usize,
}

#[derive(Deserialize, Clone)]
pub struct FlightAwareConfig {
    pub api_key: String,
    pub base_url: Option<String>,
}

// Keeps the api key out of the "config loaded" log line.
impl std::fmt::Debug for FlightAwareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightAwareConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    pub addr: String,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poller
                .as_ref()
                .map_or(DEFAULT_POLL_INTERVAL_SECONDS, |p| p.interval_seconds),
        )
    }

    pub fn result_limit(&self) -> usize {
        self.poller
            .as_ref()
            .map_or(DEFAULT_RESULT_LIMIT, |p| p.result_limit)
    }

    pub fn health_addr(&self) -> &str {
        self.health
            .as_ref()
            .map_or(DEFAULT_HEALTH_ADDR, |h| h.addr.as_str())
    }

    /// Rejects settings the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(poller) = &self.poller {
            if poller.interval_seconds == 0 {
                return Err(ConfigError::Invalid(
                    "poller.interval_seconds must be at least 1".into(),
                ));
            }
            if poller.result_limit == 0 {
                return Err(ConfigError::Invalid(
                    "poller.result_limit must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Toml::file(SETTINGS_FILE))
        .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
        .extract::<Config>()?;
    config.validate()?;
    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM and cancels `token` if one is given.
pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(name: "signal.ctrlc.received", "received Ctrl+C signal, shutting down"),
        _ = terminate => info!(name: "signal.sigterm.received", "received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
        #[error("invalid configuration: {0}")]
        Invalid(String),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
        #[error(transparent)]
        Migration(#[from] sqlx::migrate::MigrateError),
        #[error(transparent)]
        Db(#[from] sqlx::Error),
        #[error(transparent)]
        Store(#[from] StoreError),
        #[error("could not initialize flight data source: {0}")]
        Source(#[from] FetchError),
        #[error("no flight data source configured, set either flightaware.api_key or replay.path")]
        MissingSource,
    }

    #[derive(Debug, Error)]
    pub enum StoreError {
        #[error("failed to commit {rows} changed rows: {reason}")]
        Commit { rows: usize, reason: String },
        #[error("database error: {0}")]
        Db(#[from] sqlx::Error),
    }

    #[derive(Debug, Error)]
    pub enum FetchError {
        #[error("http error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("response deserialization error: {0}")]
        Deserialize(#[from] serde_json::Error),
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
        #[error("api key is not a valid header value: {0}")]
        InvalidApiKey(#[from] reqwest::header::InvalidHeaderValue),
        #[error("no record found for {0}")]
        NotFound(String),
    }

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum MalformedRecord {
        #[error("airport code must not be empty")]
        EmptyAirportCode,
        #[error("flight ident must not be empty")]
        EmptyFlightIdent,
        #[error("airline code must not be empty")]
        EmptyAirlineCode,
    }
}
