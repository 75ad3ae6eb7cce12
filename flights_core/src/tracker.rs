//! The single logical timeline that owns the store.
//!
//! Network tasks never touch the store. Airport info responses and poll
//! batches are sent to the [`Tracker`] as [`TrackerEvent`]s and applied one at
//! a time, which keeps every write and every change signal in order.

use crate::model::{Airline, Airport, AirportCode, AirportInfo, Direction, FlightSearch, PollTarget};
use crate::notifier::ChangeNotifier;
use crate::poll::{PollConfig, PollCoordinator, PollState, PolledBatch, SharedPollStatus};
use crate::registry::{
    AirportRegistry, BatchOutcome, FlightRegistry, InfoFetcher, save_and_announce,
};
use crate::source::{AirportInfoSource, EnrouteSource};
use crate::store::{Store, StoreBackend};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, enabled, info, warn};

#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// Start polling `target`, replacing any running poll.
    Track(PollTarget),
    StopTracking,
    AirportInfo(AirportInfo),
    Batch(PolledBatch),
}

impl From<AirportInfo> for TrackerEvent {
    fn from(info: AirportInfo) -> Self {
        TrackerEvent::AirportInfo(info)
    }
}

impl From<PolledBatch> for TrackerEvent {
    fn from(batch: PolledBatch) -> Self {
        TrackerEvent::Batch(batch)
    }
}

/// Cloneable way to steer a running [`Tracker`].
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    events: UnboundedSender<TrackerEvent>,
}

impl TrackerHandle {
    /// Returns `false` once the tracker has shut down.
    pub fn track(&self, target: PollTarget) -> bool {
        self.events.send(TrackerEvent::Track(target)).is_ok()
    }

    pub fn fetch_incoming_flights(&self, airport: AirportCode) -> bool {
        self.track(PollTarget::incoming(airport))
    }

    pub fn stop(&self) -> bool {
        self.events.send(TrackerEvent::StopTracking).is_ok()
    }
}

pub struct Tracker<B, S> {
    store: Store<B>,
    airports: AirportRegistry,
    flights: FlightRegistry,
    notifier: Arc<ChangeNotifier>,
    poller: PollCoordinator<S, TrackerEvent>,
    status: SharedPollStatus,
    events: UnboundedReceiver<TrackerEvent>,
    handle: TrackerHandle,
}

impl<B, S> Tracker<B, S>
where
    B: StoreBackend,
    S: AirportInfoSource + EnrouteSource + 'static,
{
    pub fn new(store: Store<B>, source: Arc<S>, config: PollConfig) -> Self {
        let (sender, events) = unbounded_channel();
        let notifier = Arc::new(ChangeNotifier::new());
        let status = SharedPollStatus::default();

        let info = InfoFetcher::new(Arc::clone(&source), sender.clone());
        let airports = AirportRegistry::new(info, Arc::clone(&notifier));
        let flights = FlightRegistry::new(airports.clone(), Arc::clone(&notifier));
        let poller = PollCoordinator::new(source, sender.clone(), config, Arc::clone(&status));

        Self {
            store,
            airports,
            flights,
            notifier,
            poller,
            status,
            events,
            handle: TrackerHandle { events: sender },
        }
    }

    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(&self.notifier)
    }

    pub fn status(&self) -> SharedPollStatus {
        Arc::clone(&self.status)
    }

    pub fn store(&self) -> &Store<B> {
        &self.store
    }

    pub fn poll_state(&self) -> &PollState {
        self.poller.state()
    }

    /// Waits for the next event. Never returns `None` while the tracker
    /// holds its own handle.
    pub async fn next_event(&mut self) -> Option<TrackerEvent> {
        self.events.recv().await
    }

    pub async fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Track(target) => {
                self.airports.with_code(&target.airport, &mut self.store);
                if let Err(e) = save_and_announce(&mut self.store, &self.notifier).await {
                    warn!(airport = %target.airport, error = ?e, "could not save tracked airport");
                }
                self.poller.fetch_flights(target);
            }
            TrackerEvent::StopTracking => self.poller.stop_fetching(),
            TrackerEvent::AirportInfo(info) => self.airports.apply_info(info, &mut self.store).await,
            TrackerEvent::Batch(batch) => {
                self.apply_batch(batch).await;
            }
        }
    }

    /// Applies a poll batch unless the poll that fetched it has since been
    /// cancelled or replaced. Returns `None` for discarded batches.
    pub async fn apply_batch(&mut self, batch: PolledBatch) -> Option<BatchOutcome> {
        if !self.poller.accepts(batch.generation) {
            debug!(
                target = %batch.target,
                generation = batch.generation,
                "discarding batch from a cancelled poll"
            );
            return None;
        }

        let outcome = self.flights.apply_batch(&batch.entries, &mut self.store).await;
        if outcome.committed {
            let mut status = self.status.write();
            status.last_successful = Some(Utc::now());
            status.last_error = None;
        }
        debug!(
            target = %batch.target,
            applied = outcome.applied,
            dropped = outcome.dropped,
            committed = outcome.committed,
            "applied en route batch"
        );
        if batch.target.direction == Direction::Incoming {
            self.log_arrivals(&batch.target.airport);
        }
        Some(outcome)
    }

    fn log_arrivals(&self, airport: &AirportCode) {
        let flights = FlightSearch::arriving_at(airport.clone()).run(&self.store);
        let destination = self
            .store
            .get::<Airport>(airport)
            .map_or_else(|| airport.to_string(), Airport::friendly_name);
        info!(airport = %destination, in_the_air = flights.len(), "updated arrivals board");

        if !enabled!(Level::DEBUG) {
            return;
        }
        let now = Utc::now();
        for flight in flights {
            let airline = flight
                .airline
                .as_ref()
                .and_then(|code| self.store.get::<Airline>(code));
            let from = flight
                .origin
                .as_ref()
                .and_then(|code| self.store.get::<Airport>(code))
                .map(Airport::friendly_name);
            debug!(
                flight = %flight.label(airline),
                from = from.as_deref().unwrap_or("unknown origin"),
                arrival = ?flight.arrival(),
                status = if flight.has_arrived(now) { "arrived" } else { "arrives" },
                "en route"
            );
        }
    }

    /// Processes events until `shutdown` fires, then stops polling.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("flight tracker running");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutting down flight tracker");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
            }
        }
        self.poller.stop_fetching();
    }
}
