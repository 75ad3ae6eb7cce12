use crate::error::FetchError;
use crate::model::{AirportCode, AirportInfo, Direction, FlightBatchEntry, PollTarget};
use crate::source::{AirportInfoSource, EnrouteSource};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Recorded airports and flights, stored as JSON.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReplayDataset {
    #[serde(default)]
    pub airports: Vec<AirportInfo>,
    #[serde(default)]
    pub flights: Vec<FlightBatchEntry>,
}

/// Serves a [`ReplayDataset`] through the live fetch interfaces.
pub struct ReplaySource {
    dataset: ReplayDataset,
}

impl ReplaySource {
    pub fn new(dataset: ReplayDataset) -> Self {
        Self { dataset }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let dataset: ReplayDataset = serde_json::from_str(&raw)?;
        debug!(
            airports = dataset.airports.len(),
            flights = dataset.flights.len(),
            "loaded replay dataset"
        );
        Ok(Self::new(dataset))
    }
}

fn same_code(raw: Option<&str>, code: &AirportCode) -> bool {
    raw.is_some_and(|raw| raw.trim() == code.as_str())
}

impl AirportInfoSource for ReplaySource {
    async fn fetch_airport_info(&self, code: &AirportCode) -> Result<AirportInfo, FetchError> {
        self.dataset
            .airports
            .iter()
            .find(|airport| same_code(Some(&airport.code), code))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(code.to_string()))
    }
}

impl EnrouteSource for ReplaySource {
    async fn fetch_enroute(
        &self,
        target: &PollTarget,
        limit: usize,
    ) -> Result<Vec<FlightBatchEntry>, FetchError> {
        Ok(self
            .dataset
            .flights
            .iter()
            .filter(|flight| match target.direction {
                Direction::Incoming => same_code(flight.destination_code.as_deref(), &target.airport),
                Direction::Outgoing => same_code(flight.origin_code.as_deref(), &target.airport),
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> ReplayDataset {
        serde_json::from_str(
            r#"{
                "airports": [
                    { "code": "KSFO", "name": "San Francisco Intl", "location": "San Francisco, CA" }
                ],
                "flights": [
                    { "ident": "UAL1", "originCode": "KLAS", "destinationCode": "KSFO" },
                    { "ident": "UAL2", "originCode": "KLAS", "destinationCode": "KSFO" },
                    { "ident": "SWA3", "originCode": "KSFO", "destinationCode": "KLAS" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn enroute_filters_by_direction_and_limit() {
        let source = ReplaySource::new(dataset());
        let ksfo = AirportCode::parse("KSFO").unwrap();

        let incoming = source
            .fetch_enroute(&PollTarget::incoming(ksfo.clone()), 1)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].ident, "UAL1");

        let outgoing = source
            .fetch_enroute(&PollTarget::outgoing(ksfo), 120)
            .await
            .unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].ident, "SWA3");
    }

    #[tokio::test]
    async fn unknown_airport_is_not_found() {
        let source = ReplaySource::new(dataset());
        let result = source
            .fetch_airport_info(&AirportCode::parse("KOAK").unwrap())
            .await;
        assert!(matches!(result, Err(FetchError::NotFound(code)) if code == "KOAK"));
    }

    #[tokio::test]
    async fn bundled_demo_dataset_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/replay.json");
        let source = ReplaySource::load(path).await.unwrap();
        let ksfo = AirportCode::parse("KSFO").unwrap();

        let incoming = source
            .fetch_enroute(&PollTarget::incoming(ksfo.clone()), 120)
            .await
            .unwrap();
        assert_eq!(incoming.len(), 3);
        let info = source.fetch_airport_info(&ksfo).await.unwrap();
        assert_eq!(info.name.as_deref(), Some("San Francisco Intl"));
    }
}
