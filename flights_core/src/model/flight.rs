use crate::model::{Airline, AirlineCode, AirportCode, FlightIdent};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Flight {
    ident: FlightIdent,
    pub airline: Option<AirlineCode>,
    pub number: Option<String>,
    pub origin: Option<AirportCode>,
    pub destination: Option<AirportCode>,
    pub scheduled_departure: Option<DateTime<Utc>>,
    pub actual_departure: Option<DateTime<Utc>>,
    pub scheduled_arrival: Option<DateTime<Utc>>,
    pub actual_arrival: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn new(ident: FlightIdent) -> Self {
        Self {
            ident,
            airline: None,
            number: None,
            origin: None,
            destination: None,
            scheduled_departure: None,
            actual_departure: None,
            scheduled_arrival: None,
            actual_arrival: None,
        }
    }

    pub fn ident(&self) -> &FlightIdent {
        &self.ident
    }

    /// `None` until the flight has actually left the gate.
    pub fn departure(&self) -> Option<DateTime<Utc>> {
        self.actual_departure
    }

    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        self.actual_arrival.or(self.scheduled_arrival)
    }

    pub fn has_departed(&self) -> bool {
        self.actual_departure.is_some()
    }

    pub fn has_arrived(&self, now: DateTime<Utc>) -> bool {
        self.actual_arrival.is_some_and(|arrival| arrival <= now)
    }

    /// Display label such as "United 123", given the flight's airline row.
    pub fn label(&self, airline: Option<&Airline>) -> String {
        let airline = airline
            .and_then(Airline::friendly_name)
            .unwrap_or("Unknown Airline");
        match self.number.as_deref() {
            Some(number) => format!("{airline} {number}"),
            None => format!("{airline} {}", self.ident),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn arrival_prefers_actual_time() {
        let scheduled = Utc.with_ymd_and_hms(2021, 5, 17, 18, 0, 0).unwrap();
        let actual = Utc.with_ymd_and_hms(2021, 5, 17, 18, 12, 0).unwrap();
        let mut flight = Flight::new(FlightIdent::parse("UAL123").unwrap());
        assert_eq!(flight.arrival(), None);

        flight.scheduled_arrival = Some(scheduled);
        assert_eq!(flight.arrival(), Some(scheduled));
        assert!(!flight.has_arrived(actual));

        flight.actual_arrival = Some(actual);
        assert_eq!(flight.arrival(), Some(actual));
        assert!(flight.has_arrived(actual));
        assert!(!flight.has_departed());
    }

    #[test]
    fn label_falls_back_to_unknown_airline() {
        let mut flight = Flight::new(FlightIdent::parse("UAL123").unwrap());
        assert_eq!(flight.label(None), "Unknown Airline UAL123");

        flight.number = Some("123".into());
        let mut airline = Airline::stub(AirlineCode::parse("UAL").unwrap());
        assert_eq!(flight.label(Some(&airline)), "Unknown Airline 123");

        airline.name = Some("United".into());
        assert_eq!(flight.label(Some(&airline)), "United 123");
    }
}
