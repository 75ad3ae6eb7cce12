//! Upstream fetch interfaces and their implementations.
//!
//! [`FlightAwareClient`] talks to the live AeroAPI. [`ReplaySource`] serves a
//! recorded dataset through the same traits when no live credentials exist.

pub mod flightaware;
mod replay;

pub use flightaware::FlightAwareClient;
pub use replay::{ReplayDataset, ReplaySource};

use crate::Config;
use crate::error::{FetchError, InitializationError};
use crate::model::{AirportCode, AirportInfo, FlightBatchEntry, PollTarget};
use std::future::Future;
use tracing::info;

/// One-shot airport metadata lookup.
pub trait AirportInfoSource: Send + Sync {
    fn fetch_airport_info(
        &self,
        code: &AirportCode,
    ) -> impl Future<Output = Result<AirportInfo, FetchError>> + Send;
}

/// Flights en route to or from an airport, at most `limit` of them.
pub trait EnrouteSource: Send + Sync {
    fn fetch_enroute(
        &self,
        target: &PollTarget,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<FlightBatchEntry>, FetchError>> + Send;
}

pub enum ConfiguredSource {
    FlightAware(FlightAwareClient),
    Replay(ReplaySource),
}

impl ConfiguredSource {
    /// Prefers the live API when an api key is configured.
    pub async fn from_config(config: &Config) -> Result<Self, InitializationError> {
        if let Some(flightaware) = &config.flightaware {
            info!("using FlightAware AeroAPI as flight data source");
            return Ok(Self::FlightAware(FlightAwareClient::new(flightaware)?));
        }
        if let Some(replay) = &config.replay {
            info!(path = %replay.path, "no live credentials, replaying recorded flight data");
            return Ok(Self::Replay(ReplaySource::load(&replay.path).await?));
        }
        Err(InitializationError::MissingSource)
    }
}

impl AirportInfoSource for ConfiguredSource {
    async fn fetch_airport_info(&self, code: &AirportCode) -> Result<AirportInfo, FetchError> {
        match self {
            ConfiguredSource::FlightAware(client) => client.fetch_airport_info(code).await,
            ConfiguredSource::Replay(replay) => replay.fetch_airport_info(code).await,
        }
    }
}

impl EnrouteSource for ConfiguredSource {
    async fn fetch_enroute(
        &self,
        target: &PollTarget,
        limit: usize,
    ) -> Result<Vec<FlightBatchEntry>, FetchError> {
        match self {
            ConfiguredSource::FlightAware(client) => client.fetch_enroute(target, limit).await,
            ConfiguredSource::Replay(replay) => replay.fetch_enroute(target, limit).await,
        }
    }
}
