use crate::error::StoreError;
use crate::model::{Airline, AirlineCode, Airport, AirportCode, Flight, FlightIdent};
use crate::store::{Rows, StoreBackend};
use std::collections::BTreeMap;

/// Backend that keeps committed rows in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    airports: BTreeMap<AirportCode, Airport>,
    airlines: BTreeMap<AirlineCode, Airline>,
    flights: BTreeMap<FlightIdent, Flight>,
    commits: usize,
    last_commit: Option<Rows>,
}

impl MemoryBackend {
    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn last_commit(&self) -> Option<&Rows> {
        self.last_commit.as_ref()
    }

    pub fn airport(&self, code: &AirportCode) -> Option<&Airport> {
        self.airports.get(code)
    }

    pub fn flight(&self, ident: &FlightIdent) -> Option<&Flight> {
        self.flights.get(ident)
    }

    /// Everything committed so far.
    pub fn rows(&self) -> Rows {
        Rows {
            airports: self.airports.values().cloned().collect(),
            airlines: self.airlines.values().cloned().collect(),
            flights: self.flights.values().cloned().collect(),
        }
    }
}

impl StoreBackend for MemoryBackend {
    async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
        for airport in &changes.airports {
            self.airports.insert(airport.code().clone(), airport.clone());
        }
        for airline in &changes.airlines {
            self.airlines.insert(airline.code().clone(), airline.clone());
        }
        for flight in &changes.flights {
            self.flights.insert(flight.ident().clone(), flight.clone());
        }
        self.commits += 1;
        self.last_commit = Some(changes.clone());
        Ok(())
    }
}
