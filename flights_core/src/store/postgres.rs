use crate::PostgresConfig;
use crate::error::{InitializationError, MalformedRecord, StoreError};
use crate::model::{Airline, AirlineCode, Airport, AirportCode, Flight, FlightIdent};
use crate::store::{Rows, StoreBackend};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::{info, instrument, warn};

#[derive(Debug, sqlx::FromRow)]
struct AirportRow {
    code: String,
    name: Option<String>,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct AirlineRow {
    code: String,
    name: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct FlightRow {
    ident: String,
    airline_code: Option<String>,
    number: Option<String>,
    origin_code: Option<String>,
    destination_code: Option<String>,
    scheduled_departure: Option<DateTime<Utc>>,
    actual_departure: Option<DateTime<Utc>>,
    scheduled_arrival: Option<DateTime<Utc>>,
    actual_arrival: Option<DateTime<Utc>>,
}

impl TryFrom<AirportRow> for Airport {
    type Error = MalformedRecord;

    fn try_from(row: AirportRow) -> Result<Self, Self::Error> {
        let mut airport = Airport::stub(AirportCode::parse(&row.code)?);
        airport.name = row.name;
        airport.location = row.location;
        airport.latitude = row.latitude;
        airport.longitude = row.longitude;
        airport.timezone = row.timezone;
        Ok(airport)
    }
}

impl TryFrom<AirlineRow> for Airline {
    type Error = MalformedRecord;

    fn try_from(row: AirlineRow) -> Result<Self, Self::Error> {
        let mut airline = Airline::stub(AirlineCode::parse(&row.code)?);
        airline.name = row.name;
        Ok(airline)
    }
}

impl TryFrom<FlightRow> for Flight {
    type Error = MalformedRecord;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        let mut flight = Flight::new(FlightIdent::parse(&row.ident)?);
        flight.airline = AirlineCode::parse_optional(row.airline_code.as_deref());
        flight.number = row.number;
        flight.origin = AirportCode::parse_optional(row.origin_code.as_deref());
        flight.destination = AirportCode::parse_optional(row.destination_code.as_deref());
        flight.scheduled_departure = row.scheduled_departure;
        flight.actual_departure = row.actual_departure;
        flight.scheduled_arrival = row.scheduled_arrival;
        flight.actual_arrival = row.actual_arrival;
        Ok(flight)
    }
}

/// Drops rows whose identity column is blank instead of failing the load.
fn keep_valid<R, E: TryFrom<R, Error = MalformedRecord>>(rows: Vec<R>) -> Vec<E> {
    rows.into_iter()
        .filter_map(|row| match E::try_from(row) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(error = ?e, "skipping malformed persisted row");
                None
            }
        })
        .collect()
}

pub struct PostgresBackend {
    pool: Pool<Postgres>,
}

impl PostgresBackend {
    #[instrument(skip_all)]
    pub async fn connect(pg_config: &PostgresConfig) -> Result<Self, InitializationError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&pg_config.connection_string)
            .await?;

        info!(name: "db.connected", "db pool created and connected");

        // Run any new migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn load(&self) -> Result<Rows, StoreError> {
        let airports: Vec<AirportRow> = sqlx::query_as(
            "SELECT code, name, location, latitude, longitude, timezone FROM airports",
        )
        .fetch_all(&self.pool)
        .await?;

        let airlines: Vec<AirlineRow> = sqlx::query_as("SELECT code, name FROM airlines")
            .fetch_all(&self.pool)
            .await?;

        let flights: Vec<FlightRow> = sqlx::query_as(
            r#"
            SELECT ident,
                   airline_code,
                   number,
                   origin_code,
                   destination_code,
                   scheduled_departure,
                   actual_departure,
                   scheduled_arrival,
                   actual_arrival
            FROM flights
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Rows {
            airports: keep_valid(airports),
            airlines: keep_valid(airlines),
            flights: keep_valid(flights),
        })
    }
}

impl StoreBackend for PostgresBackend {
    async fn persist(&mut self, changes: &Rows) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Parents first so the flight foreign keys resolve.
        for airport in &changes.airports {
            sqlx::query(
                r#"
                INSERT INTO airports (code, name, location, latitude, longitude, timezone)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (code) DO UPDATE
                SET name = EXCLUDED.name,
                    location = EXCLUDED.location,
                    latitude = EXCLUDED.latitude,
                    longitude = EXCLUDED.longitude,
                    timezone = EXCLUDED.timezone
                "#,
            )
            .bind(airport.code().as_str())
            .bind(&airport.name)
            .bind(&airport.location)
            .bind(airport.latitude)
            .bind(airport.longitude)
            .bind(&airport.timezone)
            .execute(&mut *tx)
            .await?;
        }

        for airline in &changes.airlines {
            sqlx::query(
                r#"
                INSERT INTO airlines (code, name)
                VALUES ($1, $2)
                ON CONFLICT (code) DO UPDATE
                SET name = EXCLUDED.name
                "#,
            )
            .bind(airline.code().as_str())
            .bind(&airline.name)
            .execute(&mut *tx)
            .await?;
        }

        for flight in &changes.flights {
            sqlx::query(
                r#"
                INSERT INTO flights (
                    ident,
                    airline_code,
                    number,
                    origin_code,
                    destination_code,
                    scheduled_departure,
                    actual_departure,
                    scheduled_arrival,
                    actual_arrival
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (ident) DO UPDATE
                SET airline_code = EXCLUDED.airline_code,
                    number = EXCLUDED.number,
                    origin_code = EXCLUDED.origin_code,
                    destination_code = EXCLUDED.destination_code,
                    scheduled_departure = EXCLUDED.scheduled_departure,
                    actual_departure = EXCLUDED.actual_departure,
                    scheduled_arrival = EXCLUDED.scheduled_arrival,
                    actual_arrival = EXCLUDED.actual_arrival
                "#,
            )
            .bind(flight.ident().as_str())
            .bind(flight.airline.as_ref().map(AirlineCode::as_str))
            .bind(&flight.number)
            .bind(flight.origin.as_ref().map(AirportCode::as_str))
            .bind(flight.destination.as_ref().map(AirportCode::as_str))
            .bind(flight.scheduled_departure)
            .bind(flight.actual_departure)
            .bind(flight.scheduled_arrival)
            .bind(flight.actual_arrival)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
