#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use flights_core::error::{FetchError, StoreError};
use flights_core::model::{AirportCode, AirportInfo, FlightBatchEntry, PollTarget};
use flights_core::source::{AirportInfoSource, EnrouteSource};
use flights_core::store::{MemoryBackend, Rows, StoreBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Source whose answers are set up by the test.
#[derive(Default)]
pub struct ScriptedSource {
    airports: Mutex<HashMap<String, AirportInfo>>,
    enroute: Mutex<Vec<FlightBatchEntry>>,
    fail_enroute: AtomicBool,
    info_calls: Mutex<Vec<AirportCode>>,
    enroute_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_airport(self, info: AirportInfo) -> Self {
        self.airports.lock().insert(info.code.clone(), info);
        self
    }

    /// Answers a request for `requested` with `info`, whatever code it carries.
    pub fn with_airport_as(self, requested: &str, info: AirportInfo) -> Self {
        self.airports.lock().insert(requested.to_string(), info);
        self
    }

    pub fn with_enroute(self, entries: Vec<FlightBatchEntry>) -> Self {
        *self.enroute.lock() = entries;
        self
    }

    pub fn set_enroute(&self, entries: Vec<FlightBatchEntry>) {
        *self.enroute.lock() = entries;
    }

    pub fn fail_enroute(&self, fail: bool) {
        self.fail_enroute.store(fail, Ordering::SeqCst);
    }

    pub fn info_calls(&self) -> Vec<AirportCode> {
        self.info_calls.lock().clone()
    }

    pub fn enroute_calls(&self) -> usize {
        self.enroute_calls.load(Ordering::SeqCst)
    }
}

impl AirportInfoSource for ScriptedSource {
    async fn fetch_airport_info(&self, code: &AirportCode) -> Result<AirportInfo, FetchError> {
        self.info_calls.lock().push(code.clone());
        self.airports
            .lock()
            .get(code.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(code.to_string()))
    }
}

impl EnrouteSource for ScriptedSource {
    async fn fetch_enroute(
        &self,
        _target: &PollTarget,
        limit: usize,
    ) -> Result<Vec<FlightBatchEntry>, FetchError> {
        self.enroute_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enroute.load(Ordering::SeqCst) {
            return Err(FetchError::NotFound("scripted outage".into()));
        }
        Ok(self.enroute.lock().iter().take(limit).cloned().collect())
    }
}

/// Backend that refuses every commit.
pub struct FailingBackend;

impl StoreBackend for FailingBackend {
    async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
        Err(StoreError::Commit {
            rows: changes.len(),
            reason: "connection reset".into(),
        })
    }
}

/// Memory backend that can be told to refuse its next commit.
#[derive(Default)]
pub struct FlakyBackend {
    fail_next: AtomicBool,
    inner: MemoryBackend,
}

impl FlakyBackend {
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn committed(&self) -> &MemoryBackend {
        &self.inner
    }
}

impl StoreBackend for FlakyBackend {
    async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Commit {
                rows: changes.len(),
                reason: "connection reset".into(),
            });
        }
        self.inner.persist(changes).await
    }
}

pub fn code(raw: &str) -> AirportCode {
    AirportCode::parse(raw).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 5, 17, hour, minute, 0).unwrap()
}

pub fn sfo_info() -> AirportInfo {
    AirportInfo {
        code: "KSFO".into(),
        name: Some("San Francisco Intl".into()),
        location: Some("San Francisco, CA".into()),
        latitude: Some(37.6),
        longitude: Some(-122.4),
        timezone: Some("America/Los_Angeles".into()),
    }
}

pub fn entry(ident: &str, origin: &str, destination: &str) -> FlightBatchEntry {
    FlightBatchEntry {
        ident: ident.into(),
        origin_code: Some(origin.into()),
        destination_code: Some(destination.into()),
        ..FlightBatchEntry::default()
    }
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
