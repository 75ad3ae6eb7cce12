//! Stateless façades that keep the entity graph consistent.
//!
//! Registries never surface errors to their callers: malformed records are
//! dropped, failed commits are logged, and the next successful write
//! reconciles.

mod airline;
mod airport;
mod flight;
mod info;

pub use airline::AirlineRegistry;
pub use airport::AirportRegistry;
pub use flight::{BatchOutcome, FlightRegistry};
pub use info::InfoFetcher;

use crate::error::StoreError;
use crate::notifier::{ChangeNotifier, EntityRef};
use crate::store::{Store, StoreBackend};

/// Saves the store. When the commit fails, every entity the rollback touched
/// gets a change signal so observers re-read the restored state.
pub async fn save_and_announce<B: StoreBackend>(
    store: &mut Store<B>,
    notifier: &ChangeNotifier,
) -> Result<(), StoreError> {
    let result = store.save().await;
    if result.is_err() {
        let reverted = store.take_reverted();
        let entities = reverted
            .airports
            .into_iter()
            .map(EntityRef::Airport)
            .chain(reverted.airlines.into_iter().map(EntityRef::Airline))
            .chain(reverted.flights.into_iter().map(EntityRef::Flight));
        for entity in entities {
            notifier.will_change(&entity);
        }
    }
    result
}
