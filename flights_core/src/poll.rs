//! Repeating en route fetches with cancel-and-replace semantics.
//!
//! A [`PollCoordinator`] owns at most one [`EnrouteRequest`]. Starting a poll
//! for any target first stops the running one. Every batch is tagged with the
//! generation of the request that fetched it, and the consumer asks
//! [`PollCoordinator::accepts`] before applying it, so a response that was
//! already in flight when its poll was cancelled is discarded.

use crate::Config;
use crate::model::{AirportCode, FlightBatchEntry, PollTarget};
use crate::source::EnrouteSource;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub result_limit: usize,
}

impl From<&Config> for PollConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            result_limit: config.result_limit(),
        }
    }
}

/// Shared view of polling health, read by the health endpoint.
#[derive(Debug, Clone, Default)]
pub struct PollStatus {
    pub target: Option<PollTarget>,
    pub last_attempted: Option<DateTime<Utc>>,
    pub last_successful: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type SharedPollStatus = Arc<RwLock<PollStatus>>;

/// One delivery from a poll.
#[derive(Debug, Clone)]
pub struct PolledBatch {
    pub generation: u64,
    pub target: PollTarget,
    pub entries: Vec<FlightBatchEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling { target: PollTarget, generation: u64 },
    Stopped,
}

/// Handle on a single repeating fetch for one target.
pub struct EnrouteRequest<S, T> {
    source: Arc<S>,
    target: PollTarget,
    limit: usize,
    generation: u64,
    sink: UnboundedSender<T>,
    status: SharedPollStatus,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl<S, T> EnrouteRequest<S, T>
where
    S: EnrouteSource + 'static,
    T: From<PolledBatch> + Send + 'static,
{
    pub fn create(
        source: Arc<S>,
        target: PollTarget,
        limit: usize,
        generation: u64,
        sink: UnboundedSender<T>,
        status: SharedPollStatus,
    ) -> Self {
        Self {
            source,
            target,
            limit,
            generation,
            sink,
            status,
            running: None,
        }
    }

    pub fn target(&self) -> &PollTarget {
        &self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fetches now and then every `repeat_every`. Calling it again restarts
    /// the timer.
    pub fn fetch(&mut self, repeat_every: Duration) {
        self.stop_fetching();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            self.target.clone(),
            self.limit,
            self.generation,
            repeat_every,
            self.sink.clone(),
            Arc::clone(&self.status),
            cancel.clone(),
        ));
        self.running = Some((cancel, handle));
    }

    /// Cancels the timer. Safe to call when nothing is running.
    pub fn stop_fetching(&mut self) {
        if let Some((cancel, _handle)) = self.running.take() {
            cancel.cancel();
            trace!(target = %self.target, generation = self.generation, "cancelled en route poll");
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(cancel, handle)| !cancel.is_cancelled() && !handle.is_finished())
    }
}

impl<S, T> Drop for EnrouteRequest<S, T> {
    fn drop(&mut self) {
        if let Some((cancel, _)) = self.running.take() {
            cancel.cancel();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn poll_loop<S, T>(
    source: Arc<S>,
    target: PollTarget,
    limit: usize,
    generation: u64,
    repeat_every: Duration,
    sink: UnboundedSender<T>,
    status: SharedPollStatus,
    cancel: CancellationToken,
) where
    S: EnrouteSource,
    T: From<PolledBatch>,
{
    if repeat_every.is_zero() {
        error!(target = %target, generation, "en route poll interval must be greater than zero");
        status.write().last_error = Some("poll interval must be greater than zero".into());
        return;
    }
    debug!(target = %target, generation, every = ?repeat_every, "starting en route poll");
    let mut interval = tokio::time::interval(repeat_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        status.write().last_attempted = Some(Utc::now());
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.fetch_enroute(&target, limit) => result,
        };

        match result {
            Ok(entries) => {
                trace!(target = %target, generation, len = entries.len(), "fetched en route batch");
                if cancel.is_cancelled() {
                    break;
                }
                let batch = PolledBatch {
                    generation,
                    target: target.clone(),
                    entries,
                };
                if sink.send(T::from(batch)).is_err() {
                    debug!(target = %target, "batch receiver closed, stopping poll");
                    break;
                }
            }
            Err(e) => {
                // The next tick is the retry.
                warn!(target = %target, error = ?e, "failed to fetch en route flights");
                status.write().last_error = Some(e.to_string());
            }
        }
    }

    debug!(target = %target, generation, "en route poll stopped");
}

/// Keeps at most one en route poll running.
pub struct PollCoordinator<S, T> {
    source: Arc<S>,
    sink: UnboundedSender<T>,
    config: PollConfig,
    status: SharedPollStatus,
    request: Option<EnrouteRequest<S, T>>,
    next_generation: u64,
    state: PollState,
}

impl<S, T> PollCoordinator<S, T>
where
    S: EnrouteSource + 'static,
    T: From<PolledBatch> + Send + 'static,
{
    pub fn new(
        source: Arc<S>,
        sink: UnboundedSender<T>,
        config: PollConfig,
        status: SharedPollStatus,
    ) -> Self {
        Self {
            source,
            sink,
            config,
            status,
            request: None,
            next_generation: 0,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn is_polling(&self) -> bool {
        self.request.as_ref().is_some_and(EnrouteRequest::is_fetching)
    }

    pub fn fetch_incoming_flights(&mut self, airport: AirportCode) -> u64 {
        self.fetch_flights(PollTarget::incoming(airport))
    }

    /// Stops whatever is running, then starts polling `target`. Returns the
    /// generation of the new poll.
    pub fn fetch_flights(&mut self, target: PollTarget) -> u64 {
        if let Some(previous) = &self.request {
            info!(
                previous = %previous.target(),
                next = %target,
                "replacing running en route poll"
            );
        }
        self.stop_fetching();

        self.next_generation += 1;
        let generation = self.next_generation;
        let mut request = EnrouteRequest::create(
            Arc::clone(&self.source),
            target.clone(),
            self.config.result_limit,
            generation,
            self.sink.clone(),
            Arc::clone(&self.status),
        );
        request.fetch(self.config.interval);
        self.request = Some(request);

        self.status.write().target = Some(target.clone());
        info!(
            target = %target,
            generation,
            limit = self.config.result_limit,
            every = ?self.config.interval,
            "polling en route flights"
        );
        self.state = PollState::Polling { target, generation };
        generation
    }

    /// No-op unless a poll is running.
    pub fn stop_fetching(&mut self) {
        let Some(mut request) = self.request.take() else {
            return;
        };
        request.stop_fetching();
        self.status.write().target = None;
        info!(target = %request.target(), generation = request.generation(), "stopped en route poll");
        self.state = PollState::Stopped;
    }

    /// Whether a batch tagged with `generation` may still be applied.
    pub fn accepts(&self, generation: u64) -> bool {
        matches!(self.state, PollState::Polling { generation: active, .. } if active == generation)
    }
}
