use crate::model::{AirportCode, Direction, FlightIdent};
use std::cmp::Ordering;
use std::collections::BTreeSet;

const INTERNATIONAL_MARKERS: [&str; 2] = ["Intl", "Int'l"];

#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    code: AirportCode,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub(crate) flights_to: BTreeSet<FlightIdent>,
    pub(crate) flights_from: BTreeSet<FlightIdent>,
}

impl Airport {
    /// An airport with only its code populated, pending metadata.
    pub fn stub(code: AirportCode) -> Self {
        Self {
            code,
            name: None,
            location: None,
            latitude: None,
            longitude: None,
            timezone: None,
            flights_to: BTreeSet::new(),
            flights_from: BTreeSet::new(),
        }
    }

    pub fn code(&self) -> &AirportCode {
        &self.code
    }

    /// Flights whose destination is this airport.
    pub fn flights_to(&self) -> &BTreeSet<FlightIdent> {
        &self.flights_to
    }

    /// Flights whose origin is this airport.
    pub fn flights_from(&self) -> &BTreeSet<FlightIdent> {
        &self.flights_from
    }

    /// The relationship set a flight joins when it travels in `direction`
    /// relative to this airport.
    pub(crate) fn flights_mut(&mut self, direction: Direction) -> &mut BTreeSet<FlightIdent> {
        match direction {
            Direction::Incoming => &mut self.flights_to,
            Direction::Outgoing => &mut self.flights_from,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.name.is_none() && self.location.is_none()
    }

    pub fn friendly_name(&self) -> String {
        let friendly = friendly_name(
            self.name.as_deref().unwrap_or_default(),
            self.location.as_deref().unwrap_or_default(),
        );
        if friendly.is_empty() {
            self.code.to_string()
        } else {
            friendly
        }
    }

    /// Location ascending, falling back to the friendly name, ties broken by code.
    pub fn display_order(a: &Airport, b: &Airport) -> Ordering {
        let key = |airport: &Airport| {
            airport
                .location
                .clone()
                .unwrap_or_else(|| airport.friendly_name())
        };
        key(a).cmp(&key(b)).then_with(|| a.code.cmp(&b.code))
    }
}

/// Builds a human readable airport label out of its name and location.
///
/// International markers and any comma separated part of the location are
/// removed from the name. What remains is appended to the location in
/// parentheses, e.g. `"McCarran Intl"` at `"Las Vegas, NV"` becomes
/// `"Las Vegas, NV (McCarran)"`. Returns an empty string when both inputs are
/// blank.
pub fn friendly_name(name: &str, location: &str) -> String {
    let mut short = format!(" {} ", name.split_whitespace().collect::<Vec<_>>().join(" "));
    for marker in INTERNATIONAL_MARKERS {
        short = short.replace(&format!(" {marker} "), " ");
    }
    for component in location.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        short = short.replace(&format!(" {component} "), " ");
    }
    let short = short.split_whitespace().collect::<Vec<_>>().join(" ");
    let location = location.trim();

    match (short.is_empty(), location.is_empty()) {
        (false, false) => format!("{location} ({short})"),
        (false, true) => short,
        (true, _) => location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> AirportCode {
        AirportCode::parse(raw).unwrap()
    }

    #[test]
    fn friendly_name_drops_name_parts_repeated_in_location() {
        assert_eq!(
            friendly_name("San Francisco Intl", "San Francisco, CA"),
            "San Francisco, CA"
        );
        assert_eq!(
            friendly_name("McCarran Intl", "Las Vegas, NV"),
            "Las Vegas, NV (McCarran)"
        );
        assert_eq!(friendly_name("Meigs Field", ""), "Meigs Field");
        assert_eq!(friendly_name("", ""), "");
    }

    #[test]
    fn stub_falls_back_to_code() {
        let airport = Airport::stub(code("KSFO"));
        assert!(airport.is_stub());
        assert_eq!(airport.friendly_name(), "KSFO");
    }

    #[test]
    fn display_order_sorts_by_location_then_code() {
        let mut sfo = Airport::stub(code("KSFO"));
        sfo.location = Some("San Francisco, CA".into());
        let mut las = Airport::stub(code("KLAS"));
        las.location = Some("Las Vegas, NV".into());
        let oak = Airport::stub(code("KOAK"));
        let oak_twin = Airport::stub(code("KOAA"));

        let mut airports = [sfo, oak, las, oak_twin];
        airports.sort_by(Airport::display_order);
        let codes: Vec<_> = airports.iter().map(|a| a.code().as_str()).collect();
        // stubs sort on their code since it is their friendly name
        assert_eq!(codes, ["KOAA", "KOAK", "KLAS", "KSFO"]);
    }
}
