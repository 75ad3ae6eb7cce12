use crate::error::MalformedRecord;
use crate::model::{
    AirlineCode, Airport, AirportCode, Direction, Flight, FlightBatchEntry, FlightIdent,
};
use crate::notifier::{ChangeNotifier, EntityRef};
use crate::registry::{AirlineRegistry, AirportRegistry, save_and_announce};
use crate::store::{Store, StoreBackend};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What happened to one poll result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub dropped: usize,
    pub committed: bool,
}

#[derive(Clone)]
pub struct FlightRegistry {
    airports: AirportRegistry,
    airlines: AirlineRegistry,
    notifier: Arc<ChangeNotifier>,
}

impl FlightRegistry {
    pub fn new(airports: AirportRegistry, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            airports,
            airlines: AirlineRegistry,
            notifier,
        }
    }

    /// Merges one entry into the store without committing.
    ///
    /// Non-null fields of the entry overwrite the stored flight; null fields
    /// leave it untouched. Origin and destination are resolved to airports
    /// first, creating stubs when needed.
    pub fn update<B: StoreBackend>(
        &self,
        entry: &FlightBatchEntry,
        store: &mut Store<B>,
    ) -> Result<FlightIdent, MalformedRecord> {
        let mut relinked = BTreeSet::new();
        let ident = self.merge(entry, store, &mut relinked)?;
        self.fire_airports(relinked);
        Ok(ident)
    }

    /// Applies every entry of a batch independently, then commits once.
    ///
    /// Malformed entries are dropped without affecting the others. A failed
    /// commit rolls back the whole batch and is logged.
    pub async fn apply_batch<B: StoreBackend>(
        &self,
        entries: &[FlightBatchEntry],
        store: &mut Store<B>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut relinked = BTreeSet::new();

        for entry in entries {
            match self.merge(entry, store, &mut relinked) {
                Ok(_) => outcome.applied += 1,
                Err(e) => {
                    outcome.dropped += 1;
                    debug!(error = %e, entry = ?entry, "dropping malformed flight entry");
                }
            }
        }
        self.fire_airports(relinked);

        match save_and_announce(store, &self.notifier).await {
            Ok(()) => outcome.committed = true,
            Err(e) => {
                warn!(error = ?e, applied = outcome.applied, "could not save flight batch");
            }
        }
        outcome
    }

    fn merge<B: StoreBackend>(
        &self,
        entry: &FlightBatchEntry,
        store: &mut Store<B>,
        relinked: &mut BTreeSet<AirportCode>,
    ) -> Result<FlightIdent, MalformedRecord> {
        let ident = FlightIdent::parse(&entry.ident)?;
        let origin = AirportCode::parse_optional(entry.origin_code.as_deref());
        let destination = AirportCode::parse_optional(entry.destination_code.as_deref());
        let airline = AirlineCode::parse_optional(entry.airline_code.as_deref());

        for code in [&origin, &destination].into_iter().flatten() {
            self.airports.with_code(code, store);
        }
        if let Some(code) = &airline {
            self.airlines.with_code(code, store);
        }

        let (flight, created) = store.upsert(&ident, || Flight::new(ident.clone()));
        let previous_origin = flight.origin.clone();
        let previous_destination = flight.destination.clone();

        if airline.is_some() {
            flight.airline = airline;
        }
        if let Some(number) = entry.number.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            flight.number = Some(number.to_string());
        }
        if origin.is_some() {
            flight.origin = origin;
        }
        if destination.is_some() {
            flight.destination = destination;
        }
        flight.scheduled_departure = entry.scheduled_departure.or(flight.scheduled_departure);
        flight.actual_departure = entry.actual_departure.or(flight.actual_departure);
        flight.scheduled_arrival = entry.scheduled_arrival.or(flight.scheduled_arrival);
        flight.actual_arrival = entry.actual_arrival.or(flight.actual_arrival);

        let current_origin = flight.origin.clone();
        let current_destination = flight.destination.clone();
        trace!(flight = %ident, created, "merged flight entry");

        relink(
            store,
            &ident,
            Direction::Incoming,
            previous_destination,
            current_destination,
            relinked,
        );
        relink(
            store,
            &ident,
            Direction::Outgoing,
            previous_origin,
            current_origin,
            relinked,
        );

        self.notifier.will_change(&EntityRef::Flight(ident.clone()));
        Ok(ident)
    }

    fn fire_airports(&self, relinked: BTreeSet<AirportCode>) {
        for code in relinked {
            self.notifier.will_change(&EntityRef::Airport(code));
        }
    }
}

/// Moves `ident` from the previous airport's relationship set to the current one.
fn relink<B: StoreBackend>(
    store: &mut Store<B>,
    ident: &FlightIdent,
    direction: Direction,
    previous: Option<AirportCode>,
    current: Option<AirportCode>,
    relinked: &mut BTreeSet<AirportCode>,
) {
    if previous == current {
        return;
    }
    if let Some(code) = previous
        && let Some(airport) = store.get_mut::<Airport>(&code)
    {
        airport.flights_mut(direction).remove(ident);
        relinked.insert(code);
    }
    if let Some(code) = current
        && let Some(airport) = store.get_mut::<Airport>(&code)
    {
        airport.flights_mut(direction).insert(ident.clone());
        relinked.insert(code);
    }
}
