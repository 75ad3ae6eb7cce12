use crate::model::{AirlineCode, AirportCode, Flight};
use crate::store::{Store, StoreBackend};
use std::cmp::Ordering;

/// Filter used to list the flights heading to an airport.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSearch {
    pub destination: AirportCode,
    pub origin: Option<AirportCode>,
    pub airline: Option<AirlineCode>,
    pub in_the_air: bool,
}

impl FlightSearch {
    /// Flights to `destination` that have already departed.
    pub fn arriving_at(destination: AirportCode) -> Self {
        Self {
            destination,
            origin: None,
            airline: None,
            in_the_air: true,
        }
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        flight.destination.as_ref() == Some(&self.destination)
            && self
                .origin
                .as_ref()
                .is_none_or(|origin| flight.origin.as_ref() == Some(origin))
            && self
                .airline
                .as_ref()
                .is_none_or(|airline| flight.airline.as_ref() == Some(airline))
            && (!self.in_the_air || flight.has_departed())
    }

    /// Matching flights, earliest arrival first. Flights without any arrival
    /// time sort last.
    pub fn run<'s, B: StoreBackend>(&self, store: &'s Store<B>) -> Vec<&'s Flight> {
        store.find::<Flight>(|flight| self.matches(flight), by_arrival)
    }
}

fn by_arrival(a: &Flight, b: &Flight) -> Ordering {
    match (a.arrival(), b.arrival()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.ident().cmp(b.ident()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FlightIdent;
    use chrono::{TimeZone, Utc};

    fn flight(ident: &str, destination: &str, departed: bool) -> Flight {
        let mut flight = Flight::new(FlightIdent::parse(ident).unwrap());
        flight.destination = AirportCode::parse_optional(Some(destination));
        flight.origin = AirportCode::parse_optional(Some("KLAS"));
        flight.airline = AirlineCode::parse_optional(Some("UAL"));
        if departed {
            flight.actual_departure = Some(Utc.with_ymd_and_hms(2021, 5, 17, 16, 0, 0).unwrap());
        }
        flight
    }

    #[test]
    fn in_the_air_excludes_flights_still_at_the_gate() {
        let search = FlightSearch::arriving_at(AirportCode::parse("KSFO").unwrap());
        assert!(search.matches(&flight("UAL1", "KSFO", true)));
        assert!(!search.matches(&flight("UAL2", "KSFO", false)));
        assert!(!search.matches(&flight("UAL3", "KOAK", true)));

        let all = FlightSearch {
            in_the_air: false,
            ..search
        };
        assert!(all.matches(&flight("UAL2", "KSFO", false)));
    }

    #[test]
    fn origin_and_airline_filters_apply_when_set() {
        let mut search = FlightSearch::arriving_at(AirportCode::parse("KSFO").unwrap());
        search.origin = AirportCode::parse_optional(Some("KJFK"));
        assert!(!search.matches(&flight("UAL1", "KSFO", true)));

        search.origin = AirportCode::parse_optional(Some("KLAS"));
        search.airline = AirlineCode::parse_optional(Some("SWA"));
        assert!(!search.matches(&flight("UAL1", "KSFO", true)));

        search.airline = AirlineCode::parse_optional(Some("UAL"));
        assert!(search.matches(&flight("UAL1", "KSFO", true)));
    }
}
