use crate::model::{AirportCode, AirportInfo};
use crate::source::AirportInfoSource;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

type Spawn = dyn Fn(AirportCode) + Send + Sync;

/// Fire-and-forget airport metadata requests.
///
/// Each request runs on its own task and delivers at most one [`AirportInfo`]
/// to the sink, keyed by the code that was requested; failures are logged and
/// deliver nothing. A code that already
/// has a request in flight is not requested again until that one finishes.
#[derive(Clone)]
pub struct InfoFetcher {
    spawn: Option<Arc<Spawn>>,
    in_flight: Arc<Mutex<HashSet<AirportCode>>>,
}

impl InfoFetcher {
    pub fn new<S, T>(source: Arc<S>, sink: UnboundedSender<T>) -> Self
    where
        S: AirportInfoSource + 'static,
        T: From<AirportInfo> + Send + 'static,
    {
        let in_flight: Arc<Mutex<HashSet<AirportCode>>> = Arc::default();
        let pending = Arc::clone(&in_flight);
        let spawn = move |code: AirportCode| {
            let source = Arc::clone(&source);
            let sink = sink.clone();
            let pending = Arc::clone(&pending);
            tokio::spawn(async move {
                match source.fetch_airport_info(&code).await {
                    Ok(mut info) => {
                        if info.code.trim() != code.as_str() {
                            debug!(
                                airport = %code,
                                reported = %info.code,
                                "airport info reported under another code, keeping the requested one"
                            );
                        }
                        info.code = code.to_string();
                        debug!(airport = %code, "airport info fetched");
                        if sink.send(T::from(info)).is_err() {
                            debug!(airport = %code, "airport info receiver closed, dropping result");
                        }
                    }
                    Err(e) => {
                        warn!(airport = %code, error = ?e, "failed to fetch airport info");
                    }
                }
                pending.lock().remove(&code);
            });
        };

        Self {
            spawn: Some(Arc::new(spawn)),
            in_flight,
        }
    }

    /// Builds a fetcher that never requests anything.
    pub fn disabled() -> Self {
        Self {
            spawn: None,
            in_flight: Arc::default(),
        }
    }

    /// Returns `false` when nothing was requested, either because a request
    /// for `code` is already in flight or because fetching is disabled.
    pub fn request(&self, code: &AirportCode) -> bool {
        let Some(spawn) = &self.spawn else {
            debug!(airport = %code, "airport info fetching disabled");
            return false;
        };
        if !self.in_flight.lock().insert(code.clone()) {
            debug!(airport = %code, "airport info request already in flight");
            return false;
        }
        spawn(code.clone());
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }
}
