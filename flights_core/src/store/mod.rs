//! Transactional in-memory entity graph.
//!
//! All reads and writes go against the working graph. Every row touched since
//! the last [`Store::save`] is remembered in a per-table undo log together
//! with its pre-transaction value. `save` hands the touched rows to the
//! [`StoreBackend`]; a failed commit restores the undo log so the graph never
//! holds changes the backend did not accept.

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

use crate::PostgresConfig;
use crate::error::{InitializationError, StoreError};
use crate::model::{Airline, AirlineCode, Airport, AirportCode, Flight, FlightIdent};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use tracing::{debug, info, warn};

/// Rows handed to or loaded from a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub airports: Vec<Airport>,
    pub airlines: Vec<Airline>,
    pub flights: Vec<Flight>,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.airports.len() + self.airlines.len() + self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Durable side of the store. Rows are only ever upserted.
pub trait StoreBackend: Send {
    fn persist(&mut self, changes: &Rows) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait Entity: Clone + Send + Sync + 'static {
    type Key: Clone + Ord + Hash + Debug + Send + Sync;

    fn key(&self) -> &Self::Key;
    fn table(graph: &Graph) -> &Table<Self>;
    fn table_mut(graph: &mut Graph) -> &mut Table<Self>;
}

pub struct Table<E: Entity> {
    rows: BTreeMap<E::Key, E>,
    undo: HashMap<E::Key, Option<E>>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            undo: HashMap::new(),
        }
    }
}

impl<E: Entity> Table<E> {
    fn remember(&mut self, key: &E::Key) {
        if !self.undo.contains_key(key) {
            self.undo.insert(key.clone(), self.rows.get(key).cloned());
        }
    }

    fn get_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        if self.rows.contains_key(key) {
            self.remember(key);
        }
        self.rows.get_mut(key)
    }

    fn dirty(&self) -> Vec<E> {
        self.undo
            .keys()
            .filter_map(|key| self.rows.get(key).cloned())
            .collect()
    }

    fn rollback(&mut self) -> Vec<E::Key> {
        let mut reverted = Vec::with_capacity(self.undo.len());
        for (key, original) in self.undo.drain() {
            match original {
                Some(row) => {
                    self.rows.insert(key.clone(), row);
                }
                None => {
                    self.rows.remove(&key);
                }
            }
            reverted.push(key);
        }
        reverted.sort();
        reverted
    }
}

#[derive(Default)]
pub struct Graph {
    airports: Table<Airport>,
    airlines: Table<Airline>,
    flights: Table<Flight>,
}

impl Entity for Airport {
    type Key = AirportCode;

    fn key(&self) -> &Self::Key {
        self.code()
    }

    fn table(graph: &Graph) -> &Table<Self> {
        &graph.airports
    }

    fn table_mut(graph: &mut Graph) -> &mut Table<Self> {
        &mut graph.airports
    }
}

impl Entity for Airline {
    type Key = AirlineCode;

    fn key(&self) -> &Self::Key {
        self.code()
    }

    fn table(graph: &Graph) -> &Table<Self> {
        &graph.airlines
    }

    fn table_mut(graph: &mut Graph) -> &mut Table<Self> {
        &mut graph.airlines
    }
}

impl Entity for Flight {
    type Key = FlightIdent;

    fn key(&self) -> &Self::Key {
        self.ident()
    }

    fn table(graph: &Graph) -> &Table<Self> {
        &graph.flights
    }

    fn table_mut(graph: &mut Graph) -> &mut Table<Self> {
        &mut graph.flights
    }
}

/// Keys of the rows a rollback restored or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reverted {
    pub airports: Vec<AirportCode>,
    pub airlines: Vec<AirlineCode>,
    pub flights: Vec<FlightIdent>,
}

impl Reverted {
    pub fn len(&self) -> usize {
        self.airports.len() + self.airlines.len() + self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Store<B> {
    graph: Graph,
    backend: B,
    reverted: Reverted,
}

impl<B: StoreBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self {
            graph: Graph::default(),
            backend,
            reverted: Reverted::default(),
        }
    }

    /// Seeds the graph with already persisted rows. Airport flight sets are
    /// rebuilt from the flights since flights own the relationship.
    pub fn with_rows(backend: B, rows: Rows) -> Self {
        let mut graph = Graph::default();
        for airline in rows.airlines {
            graph.airlines.rows.insert(airline.code().clone(), airline);
        }
        for mut airport in rows.airports {
            airport.flights_to.clear();
            airport.flights_from.clear();
            graph.airports.rows.insert(airport.code().clone(), airport);
        }
        for flight in rows.flights {
            let links = [
                (flight.destination.as_ref(), true),
                (flight.origin.as_ref(), false),
            ];
            for (code, incoming) in links {
                let Some(code) = code else { continue };
                let airport = graph
                    .airports
                    .rows
                    .entry(code.clone())
                    .or_insert_with(|| Airport::stub(code.clone()));
                let set = if incoming {
                    &mut airport.flights_to
                } else {
                    &mut airport.flights_from
                };
                set.insert(flight.ident().clone());
            }
            graph.flights.rows.insert(flight.ident().clone(), flight);
        }
        debug!(
            airports = graph.airports.rows.len(),
            airlines = graph.airlines.rows.len(),
            flights = graph.flights.rows.len(),
            "seeded store from persisted rows"
        );
        Self {
            graph,
            backend,
            reverted: Reverted::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn get<E: Entity>(&self, key: &E::Key) -> Option<&E> {
        E::table(&self.graph).rows.get(key)
    }

    /// Mutable access; the row joins the current transaction.
    pub fn get_mut<E: Entity>(&mut self, key: &E::Key) -> Option<&mut E> {
        E::table_mut(&mut self.graph).get_mut(key)
    }

    pub fn count<E: Entity>(&self) -> usize {
        E::table(&self.graph).rows.len()
    }

    /// All rows matching `predicate`, ordered by `order`.
    pub fn find<E: Entity>(
        &self,
        predicate: impl Fn(&E) -> bool,
        order: impl Fn(&E, &E) -> Ordering,
    ) -> Vec<&E> {
        let mut found: Vec<&E> = E::table(&self.graph)
            .rows
            .values()
            .filter(|row| predicate(row))
            .collect();
        found.sort_by(|a, b| order(a, b));
        found
    }

    /// Looks a row up by key and creates it with `create` when absent, as one
    /// step. The returned flag is `true` when the row was created.
    pub fn find_or_create<E: Entity>(
        &mut self,
        key: &E::Key,
        create: impl FnOnce() -> E,
    ) -> (&E, bool) {
        let table = E::table_mut(&mut self.graph);
        let created = !table.rows.contains_key(key);
        if created {
            table.remember(key);
            table.rows.insert(key.clone(), create());
        }
        (&table.rows[key], created)
    }

    /// [`Self::find_or_create`] for callers that are about to write the row.
    pub fn upsert<E: Entity>(&mut self, key: &E::Key, create: impl FnOnce() -> E) -> (&mut E, bool) {
        let table = E::table_mut(&mut self.graph);
        let created = !table.rows.contains_key(key);
        table.remember(key);
        let row = table.rows.entry(key.clone()).or_insert_with(create);
        (row, created)
    }

    pub fn has_changes(&self) -> bool {
        !self.graph.airports.undo.is_empty()
            || !self.graph.airlines.undo.is_empty()
            || !self.graph.flights.undo.is_empty()
    }

    /// Commits every row touched since the last save. On failure all of
    /// those changes are rolled back before the error is returned, and the
    /// affected keys are kept for [`Self::take_reverted`].
    pub async fn save(&mut self) -> Result<(), StoreError> {
        if !self.has_changes() {
            return Ok(());
        }

        let changes = Rows {
            airports: self.graph.airports.dirty(),
            airlines: self.graph.airlines.dirty(),
            flights: self.graph.flights.dirty(),
        };

        match self.backend.persist(&changes).await {
            Ok(()) => {
                self.graph.airports.undo.clear();
                self.graph.airlines.undo.clear();
                self.graph.flights.undo.clear();
                debug!(rows = changes.len(), "committed store transaction");
                Ok(())
            }
            Err(e) => {
                let reverted = self.rollback();
                warn!(error = ?e, reverted = reverted.len(), "store commit failed, rolled back transaction");
                self.reverted = reverted;
                Err(e)
            }
        }
    }

    /// Discards every change since the last save.
    pub fn rollback(&mut self) -> Reverted {
        Reverted {
            airports: self.graph.airports.rollback(),
            airlines: self.graph.airlines.rollback(),
            flights: self.graph.flights.rollback(),
        }
    }

    /// Rows reverted by the last failed [`Self::save`], if not taken yet.
    pub fn take_reverted(&mut self) -> Reverted {
        std::mem::take(&mut self.reverted)
    }
}

/// Backend chosen from configuration at startup.
pub enum ConfiguredBackend {
    Memory(MemoryBackend),
    Postgres(PostgresBackend),
}

impl ConfiguredBackend {
    /// Connects to Postgres when configured and loads its rows; falls back to
    /// an empty in-memory backend otherwise.
    pub async fn from_config(
        postgres: Option<&PostgresConfig>,
    ) -> Result<(Self, Rows), InitializationError> {
        match postgres {
            Some(pg_config) => {
                let backend = PostgresBackend::connect(pg_config).await?;
                let rows = backend.load().await?;
                info!(rows = rows.len(), "loaded persisted entities from Postgres");
                Ok((Self::Postgres(backend), rows))
            }
            None => {
                info!("no Postgres configured, keeping entities in memory only");
                Ok((Self::Memory(MemoryBackend::default()), Rows::default()))
            }
        }
    }
}

impl StoreBackend for ConfiguredBackend {
    async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
        match self {
            ConfiguredBackend::Memory(backend) => backend.persist(changes).await,
            ConfiguredBackend::Postgres(backend) => backend.persist(changes).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl StoreBackend for FailingBackend {
        async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
            Err(StoreError::Commit {
                rows: changes.len(),
                reason: "disk full".into(),
            })
        }
    }

    fn code(raw: &str) -> AirportCode {
        AirportCode::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn find_or_create_returns_existing_row() {
        let mut store = Store::new(MemoryBackend::default());
        let (_, created) = store.find_or_create(&code("KSFO"), || Airport::stub(code("KSFO")));
        assert!(created);
        let (_, created) = store.find_or_create(&code("KSFO"), || Airport::stub(code("KSFO")));
        assert!(!created);
        assert_eq!(store.count::<Airport>(), 1);
    }

    #[tokio::test]
    async fn save_hands_only_touched_rows_to_backend() {
        let mut store = Store::new(MemoryBackend::default());
        store.find_or_create(&code("KSFO"), || Airport::stub(code("KSFO")));
        store.find_or_create(&code("KLAS"), || Airport::stub(code("KLAS")));
        store.save().await.unwrap();
        assert!(!store.has_changes());

        store.get_mut::<Airport>(&code("KLAS")).unwrap().name = Some("McCarran Intl".into());
        store.save().await.unwrap();

        assert_eq!(store.backend().commits(), 2);
        assert_eq!(store.backend().last_commit().map(Rows::len), Some(1));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_created_and_modified_rows() {
        let mut seeded = Airport::stub(code("KSFO"));
        seeded.name = Some("San Francisco Intl".into());
        let mut store = Store::with_rows(
            FailingBackend,
            Rows {
                airports: vec![seeded.clone()],
                ..Rows::default()
            },
        );

        store.get_mut::<Airport>(&code("KSFO")).unwrap().name = None;
        store.find_or_create(&code("KLAS"), || Airport::stub(code("KLAS")));

        assert!(store.save().await.is_err());
        assert_eq!(store.get::<Airport>(&code("KSFO")), Some(&seeded));
        assert!(store.get::<Airport>(&code("KLAS")).is_none());
        assert!(!store.has_changes());

        let reverted = store.take_reverted();
        assert_eq!(reverted.airports, [code("KLAS"), code("KSFO")]);
        assert!(store.take_reverted().is_empty());
    }

    #[test]
    fn with_rows_rebuilds_airport_flight_sets() {
        let mut flight = Flight::new(FlightIdent::parse("UAL123").unwrap());
        flight.origin = Some(code("KSFO"));
        flight.destination = Some(code("KLAS"));
        let store = Store::with_rows(
            MemoryBackend::default(),
            Rows {
                flights: vec![flight],
                ..Rows::default()
            },
        );

        let las = store.get::<Airport>(&code("KLAS")).unwrap();
        let sfo = store.get::<Airport>(&code("KSFO")).unwrap();
        assert_eq!(las.flights_to().len(), 1);
        assert_eq!(sfo.flights_from().len(), 1);
        assert!(sfo.flights_to().is_empty());
    }
}
