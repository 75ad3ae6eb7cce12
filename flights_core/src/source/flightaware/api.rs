use crate::model::{AirportInfo, Direction, FlightBatchEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://aeroapi.flightaware.com/aeroapi";
pub const API_KEY_HEADER: &str = "x-apikey";

/// AeroAPI returns at most this many flights per page.
pub const PAGE_SIZE: usize = 15;

pub fn airport_url(base_url: &str, code: &str) -> String {
    format!("{}/airports/{code}", base_url.trim_end_matches('/'))
}

pub fn enroute_url(base_url: &str, code: &str, direction: Direction) -> String {
    let base_url = base_url.trim_end_matches('/');
    match direction {
        Direction::Incoming => format!("{base_url}/airports/{code}/flights/scheduled_arrivals"),
        Direction::Outgoing => format!("{base_url}/airports/{code}/flights/scheduled_departures"),
    }
}

pub fn pages_for(limit: usize) -> usize {
    limit.div_ceil(PAGE_SIZE).max(1)
}

#[derive(Deserialize, Debug, Clone)]
pub struct AirportResponse {
    pub airport_code: String,
    pub code_icao: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
}

impl From<AirportResponse> for AirportInfo {
    fn from(value: AirportResponse) -> Self {
        let location = [value.city.as_deref(), value.state.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        AirportInfo {
            code: value.code_icao.unwrap_or(value.airport_code),
            name: value.name,
            location: (!location.is_empty()).then_some(location),
            latitude: value.latitude,
            longitude: value.longitude,
            timezone: value.timezone,
        }
    }
}

/// Body of both the scheduled arrivals and scheduled departures endpoints.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct EnrouteResponse {
    #[serde(default, alias = "scheduled_departures")]
    pub scheduled_arrivals: Vec<FlightResponse>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FlightResponse {
    pub ident: String,
    pub ident_icao: Option<String>,
    pub operator: Option<String>,
    pub operator_icao: Option<String>,
    pub flight_number: Option<String>,
    pub origin: Option<FlightEndpoint>,
    pub destination: Option<FlightEndpoint>,
    pub scheduled_off: Option<DateTime<Utc>>,
    pub actual_off: Option<DateTime<Utc>>,
    pub scheduled_on: Option<DateTime<Utc>>,
    pub actual_on: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FlightEndpoint {
    pub code: Option<String>,
    pub code_icao: Option<String>,
}

impl FlightEndpoint {
    fn preferred_code(self) -> Option<String> {
        self.code_icao.or(self.code)
    }
}

impl From<FlightResponse> for FlightBatchEntry {
    fn from(value: FlightResponse) -> Self {
        FlightBatchEntry {
            ident: value.ident_icao.unwrap_or(value.ident),
            airline_code: value.operator_icao.or(value.operator),
            number: value.flight_number,
            origin_code: value.origin.and_then(FlightEndpoint::preferred_code),
            destination_code: value.destination.and_then(FlightEndpoint::preferred_code),
            scheduled_departure: value.scheduled_off,
            actual_departure: value.actual_off,
            scheduled_arrival: value.scheduled_on,
            actual_arrival: value.actual_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_against_base() {
        assert_eq!(
            enroute_url("https://example.test/aeroapi/", "KSFO", Direction::Incoming),
            "https://example.test/aeroapi/airports/KSFO/flights/scheduled_arrivals"
        );
        assert_eq!(
            airport_url(DEFAULT_BASE_URL, "KLAS"),
            "https://aeroapi.flightaware.com/aeroapi/airports/KLAS"
        );
        assert_eq!(pages_for(120), 8);
        assert_eq!(pages_for(0), 1);
    }

    #[test]
    fn airport_response_maps_city_and_state_into_location() {
        let body = r#"{
            "airport_code": "SFO",
            "code_icao": "KSFO",
            "name": "San Francisco Intl",
            "city": "San Francisco",
            "state": "CA",
            "latitude": 37.6188,
            "longitude": -122.3754,
            "timezone": "America/Los_Angeles",
            "elevation": 13
        }"#;
        let info: AirportInfo = serde_json::from_str::<AirportResponse>(body).unwrap().into();
        assert_eq!(info.code, "KSFO");
        assert_eq!(info.location.as_deref(), Some("San Francisco, CA"));
        assert_eq!(info.timezone.as_deref(), Some("America/Los_Angeles"));
    }

    #[test]
    fn departures_body_deserializes_like_arrivals() {
        let body = r#"{
            "scheduled_departures": [{
                "ident": "UAL123",
                "ident_icao": "UAL123",
                "operator_icao": "UAL",
                "flight_number": "123",
                "origin": { "code": "KSFO", "code_icao": "KSFO" },
                "destination": { "code": "LAS", "code_icao": null },
                "scheduled_off": "2021-05-17T16:00:00Z",
                "actual_off": null,
                "scheduled_on": "2021-05-17T17:30:00Z",
                "actual_on": null
            }],
            "links": null,
            "num_pages": 1
        }"#;
        let response: EnrouteResponse = serde_json::from_str(body).unwrap();
        let entry = FlightBatchEntry::from(response.scheduled_arrivals[0].clone());
        assert_eq!(entry.ident, "UAL123");
        assert_eq!(entry.airline_code.as_deref(), Some("UAL"));
        assert_eq!(entry.destination_code.as_deref(), Some("LAS"));
        assert!(entry.actual_departure.is_none());
    }
}
