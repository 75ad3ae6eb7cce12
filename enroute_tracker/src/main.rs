#[warn(clippy::pedantic)]
mod error;

use crate::error::MainError;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{TimeDelta, Utc};
use flights_core::error::InitializationError;
use flights_core::model::{AirportCode, PollTarget};
use flights_core::poll::{PollConfig, SharedPollStatus};
use flights_core::source::ConfiguredSource;
use flights_core::store::{ConfiguredBackend, Store};
use flights_core::tracker::Tracker;
use flights_core::{load_config, shutdown_listener};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Missed poll intervals tolerated before the health check fails.
const HEALTHY_INTERVALS: u32 = 6;

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(InitializationError::Tracing)?;

    let config = load_config().map_err(|e| {
        error!(error = ?e, "configuration could not be initialized");
        InitializationError::Config(e)
    })?;
    info!(config = ?config, "loaded configuration");

    let airport = AirportCode::parse(&config.airport)?;
    let target = PollTarget {
        airport,
        direction: config.direction,
    };
    let poll_config = PollConfig::from(&config);

    let (backend, rows) = ConfiguredBackend::from_config(config.postgres.as_ref()).await?;
    let store = Store::with_rows(backend, rows);
    let source = Arc::new(ConfiguredSource::from_config(&config).await?);

    let tracker = Tracker::new(store, source, poll_config);
    let handle = tracker.handle();
    let status = tracker.status();

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let axum_handle = tokio::spawn(run_health_server(
        config.health_addr().to_string(),
        status,
        poll_config.interval,
        shutdown_token.clone(),
    ));

    let tracker_handle = tokio::spawn(tracker.run(shutdown_token.clone()));
    handle.track(target);

    tokio::select! {
        res = axum_handle => {
            shutdown_token.cancel();
            res??;
        }
        res = tracker_handle => {
            shutdown_token.cancel();
            res?;
        }
        res = signal_handle => {
            shutdown_token.cancel();
            res?;
        }
    }

    Ok(())
}

#[derive(Clone)]
struct AxumState {
    status: SharedPollStatus,
    interval: Duration,
}

async fn run_health_server(
    addr: String,
    status: SharedPollStatus,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!(addr = %addr, "starting axum health server");
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(AxumState { status, interval });
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;
    Ok(())
}

/// How long the last success stays fresh. Saturates instead of overflowing.
fn health_window(interval: Duration) -> TimeDelta {
    interval
        .checked_mul(HEALTHY_INTERVALS)
        .and_then(|window| TimeDelta::from_std(window).ok())
        .unwrap_or(TimeDelta::MAX)
}

async fn health_check(State(state): State<AxumState>) -> impl IntoResponse {
    let status = state.status.read().clone();
    let last_error = status.last_error.as_deref().unwrap_or("unknown");
    let target = status
        .target
        .as_ref()
        .map_or_else(|| "nothing".to_string(), ToString::to_string);

    let Some(last_attempted) = status.last_attempted else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("No attempted en route updates, tracking {target}"),
        );
    };
    let Some(last_successful) = status.last_successful else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "En route flights have not been successfully updated for {target}. Last attempted update: {last_attempted}. Last error: {last_error}"
            ),
        );
    };

    let window = health_window(state.interval);
    if (Utc::now() - last_successful) > window {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "En route flights for {target} not updated in the last {} seconds. Last successful update: {last_successful}. Last attempted update: {last_attempted}. Last error: {last_error}",
                window.num_seconds()
            ),
        )
    } else {
        (
            StatusCode::OK,
            format!("En route flights for {target} last updated: {last_successful}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_window_spans_six_intervals() {
        assert_eq!(health_window(Duration::from_secs(10)), TimeDelta::seconds(60));
    }

    #[test]
    fn huge_interval_saturates_the_health_window() {
        assert_eq!(health_window(Duration::MAX), TimeDelta::MAX);
        assert_eq!(health_window(Duration::from_secs(u64::MAX / 2)), TimeDelta::MAX);
    }
}
