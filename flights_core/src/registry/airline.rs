use crate::model::{Airline, AirlineCode};
use crate::store::{Store, StoreBackend};
use tracing::trace;

/// Airlines are looked up by code and never synced; unknown codes get a stub.
#[derive(Clone, Default)]
pub struct AirlineRegistry;

impl AirlineRegistry {
    pub fn with_code<'s, B: StoreBackend>(
        &self,
        code: &AirlineCode,
        store: &'s mut Store<B>,
    ) -> &'s Airline {
        let (airline, created) = store.find_or_create(code, || Airline::stub(code.clone()));
        if created {
            trace!(airline = %code, "created stub airline");
        }
        airline
    }
}
