use crate::model::{Airport, AirportCode, AirportInfo};
use crate::notifier::{ChangeNotifier, EntityRef};
use crate::registry::{InfoFetcher, save_and_announce};
use crate::store::{Store, StoreBackend};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AirportRegistry {
    info: InfoFetcher,
    notifier: Arc<ChangeNotifier>,
}

impl AirportRegistry {
    pub fn new(info: InfoFetcher, notifier: Arc<ChangeNotifier>) -> Self {
        Self { info, notifier }
    }

    /// Finds the airport for `code`, creating a stub when it is unknown.
    ///
    /// A new stub triggers an asynchronous metadata request and is returned
    /// right away; callers must not assume it has been enriched. Nothing is
    /// committed here.
    pub fn with_code<'s, B: StoreBackend>(
        &self,
        code: &AirportCode,
        store: &'s mut Store<B>,
    ) -> &'s Airport {
        let (airport, created) = store.find_or_create(code, || Airport::stub(code.clone()));
        if created {
            debug!(airport = %code, "created stub airport, requesting airport info");
            self.info.request(code);
        }
        airport
    }

    /// Writes fetched metadata onto the airport and commits.
    ///
    /// Fires the airport's change signal and that of every flight to or from
    /// it, since their labels include the airport's friendly name. Records
    /// without a code are dropped. When the commit fails the metadata is
    /// written again and left pending, so the next successful save persists
    /// it.
    pub async fn apply_info<B: StoreBackend>(&self, info: AirportInfo, store: &mut Store<B>) {
        let code = match AirportCode::parse(&info.code) {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "dropping airport info without a code");
                return;
            }
        };

        self.write_info(&code, &info, store);
        if let Err(e) = save_and_announce(store, &self.notifier).await {
            warn!(airport = %code, error = ?e, "could not save airport info, keeping it pending");
            self.write_info(&code, &info, store);
        }
    }

    fn write_info<B: StoreBackend>(&self, code: &AirportCode, info: &AirportInfo, store: &mut Store<B>) {
        // The metadata is already in hand, so a missing row is created
        // without requesting it again.
        let (airport, _) = store.upsert(code, || Airport::stub(code.clone()));
        airport.latitude = info.latitude;
        airport.longitude = info.longitude;
        airport.name = info.name.clone();
        airport.location = info.location.clone();
        airport.timezone = info.timezone.clone();

        let affected: Vec<EntityRef> = airport
            .flights_to
            .iter()
            .chain(airport.flights_from.iter())
            .cloned()
            .map(EntityRef::Flight)
            .collect();
        debug!(
            airport = %code,
            friendly_name = %airport.friendly_name(),
            flights = affected.len(),
            "applied airport info"
        );

        self.notifier.will_change(&EntityRef::Airport(code.clone()));
        for flight in &affected {
            self.notifier.will_change(flight);
        }
    }
}
