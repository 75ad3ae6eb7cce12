mod airline;
mod airport;
mod flight;
mod record;
mod search;

pub use airline::Airline;
pub use airport::{Airport, friendly_name};
pub use flight::Flight;
pub use record::{AirportInfo, FlightBatchEntry};
pub use search::FlightSearch;

use crate::error::MalformedRecord;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident, $empty:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Trims surrounding whitespace and rejects empty identities.
            pub fn parse(raw: &str) -> Result<Self, MalformedRecord> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    Err($empty)
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Like [`Self::parse`] but treats a missing or blank value as absent.
            pub fn parse_optional(raw: Option<&str>) -> Option<Self> {
                raw.and_then(|r| Self::parse(r).ok())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = MalformedRecord;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identity!(
    /// ICAO-like airport code, e.g. `KSFO`.
    AirportCode,
    MalformedRecord::EmptyAirportCode
);
identity!(
    /// Flight ident as reported by the upstream provider, e.g. `UAL123`.
    FlightIdent,
    MalformedRecord::EmptyFlightIdent
);
identity!(AirlineCode, MalformedRecord::EmptyAirlineCode);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// The slot a poll is keyed on: one airport and which way its flights are headed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollTarget {
    pub airport: AirportCode,
    pub direction: Direction,
}

impl PollTarget {
    pub fn incoming(airport: AirportCode) -> Self {
        Self {
            airport,
            direction: Direction::Incoming,
        }
    }

    pub fn outgoing(airport: AirportCode) -> Self {
        Self {
            airport,
            direction: Direction::Outgoing,
        }
    }
}

impl Display for PollTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.airport, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_are_trimmed() {
        let code = AirportCode::parse("  KSFO ").unwrap();
        assert_eq!(code.as_str(), "KSFO");
    }

    #[test]
    fn blank_identities_are_malformed() {
        assert_eq!(
            AirportCode::parse("   "),
            Err(MalformedRecord::EmptyAirportCode)
        );
        assert_eq!(FlightIdent::parse(""), Err(MalformedRecord::EmptyFlightIdent));
        assert_eq!(AirlineCode::parse_optional(Some(" ")), None);
        assert_eq!(AirlineCode::parse_optional(None), None);
    }

    #[test]
    fn identities_deserialize_through_validation() {
        let ok: AirportCode = serde_json::from_str("\"KLAS\"").unwrap();
        assert_eq!(ok.as_str(), "KLAS");
        assert!(serde_json::from_str::<AirportCode>("\"\"").is_err());
    }
}
