//! FlightAware AeroAPI client.

pub mod api;

use crate::FlightAwareConfig;
use crate::error::FetchError;
use crate::model::{AirportCode, AirportInfo, FlightBatchEntry, PollTarget};
use crate::source::{AirportInfoSource, EnrouteSource};
use api::{API_KEY_HEADER, AirportResponse, DEFAULT_BASE_URL, EnrouteResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FlightAwareClient {
    http: reqwest::Client,
    base_url: String,
}

impl FlightAwareClient {
    pub fn new(config: &FlightAwareConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

impl AirportInfoSource for FlightAwareClient {
    async fn fetch_airport_info(&self, code: &AirportCode) -> Result<AirportInfo, FetchError> {
        let resp = self
            .http
            .get(api::airport_url(&self.base_url, code.as_str()))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let airport: AirportResponse = serde_json::from_str(&resp)?;
        debug!(airport = %code, name = ?airport.name, "fetched airport info from AeroAPI");
        Ok(airport.into())
    }
}

impl EnrouteSource for FlightAwareClient {
    async fn fetch_enroute(
        &self,
        target: &PollTarget,
        limit: usize,
    ) -> Result<Vec<FlightBatchEntry>, FetchError> {
        let resp = self
            .http
            .get(api::enroute_url(
                &self.base_url,
                target.airport.as_str(),
                target.direction,
            ))
            .query(&[("max_pages", api::pages_for(limit))])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let enroute: EnrouteResponse = serde_json::from_str(&resp)?;
        let flights: Vec<FlightBatchEntry> = enroute
            .scheduled_arrivals
            .into_iter()
            .take(limit)
            .map(FlightBatchEntry::from)
            .collect();
        debug!(target = %target, len = flights.len(), "fetched en route flights from AeroAPI");
        Ok(flights)
    }
}
