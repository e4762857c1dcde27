//! TelemetryStore - durable persistence for raw readings
//!
//! ## Responsibilities
//!
//! - Append-only persistence of validated readings
//! - Recency-bounded queries for the HTTP boundary
//! - Cold-start history fetches for window seeding
//!
//! The trait seam keeps the ingestion pipeline testable without a live
//! database; `PgTelemetryStore` is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::{Error, Result};
use crate::models::{FishReading, Metric, PlantReading};

/// Persisted plant row
#[derive(Debug, Clone)]
pub struct PersistedPlant {
    pub ph: f64,
    pub tds: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub created_at: DateTime<Utc>,
}

/// Persisted fish row
#[derive(Debug, Clone)]
pub struct PersistedFish {
    pub turbidity: f64,
    pub water_temperature: f64,
    pub ph: f64,
    pub created_at: DateTime<Utc>,
}

/// Durable store consumed by the pipeline and the query endpoints
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Persist one plant reading. Failure aborts the ingest.
    async fn insert_plant(&self, reading: &PlantReading) -> Result<()>;

    /// Persist one fish reading. Failure aborts the ingest.
    async fn insert_fish(&self, reading: &FishReading) -> Result<()>;

    /// Most recent plant rows, newest first
    async fn recent_plant(&self, limit: i64) -> Result<Vec<PersistedPlant>>;

    /// Most recent fish rows, newest first
    async fn recent_fish(&self, limit: i64) -> Result<Vec<PersistedFish>>;

    /// Most recent samples of one metric, newest first (window seeding)
    async fn recent_metric(&self, metric: Metric, limit: i64) -> Result<Vec<f64>>;
}

/// Postgres-backed store
pub struct PgTelemetryStore {
    pool: PgPool,
}

impl PgTelemetryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables on boot. The original service created them lazily on
    /// first insert; doing it once up front keeps inserts single-statement.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS plant_data (
                id BIGSERIAL PRIMARY KEY,
                ph DOUBLE PRECISION NOT NULL,
                tds DOUBLE PRECISION NOT NULL,
                temperature DOUBLE PRECISION NOT NULL,
                humidity DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fish_data (
                id BIGSERIAL PRIMARY KEY,
                turbidity DOUBLE PRECISION NOT NULL,
                water_temperature DOUBLE PRECISION NOT NULL,
                ph DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                session_id UUID PRIMARY KEY,
                messages JSONB NOT NULL DEFAULT '[]'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for PgTelemetryStore {
    async fn insert_plant(&self, reading: &PlantReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO plant_data (ph, tds, temperature, humidity, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(reading.ph)
        .bind(reading.tds)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        tracing::debug!(ph = reading.ph, tds = reading.tds, "Plant reading persisted");
        Ok(())
    }

    async fn insert_fish(&self, reading: &FishReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fish_data (turbidity, water_temperature, ph, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reading.turbidity)
        .bind(reading.water_temperature)
        .bind(reading.ph)
        .bind(reading.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;

        tracing::debug!(turbidity = reading.turbidity, "Fish reading persisted");
        Ok(())
    }

    async fn recent_plant(&self, limit: i64) -> Result<Vec<PersistedPlant>> {
        let rows = sqlx::query(
            r#"
            SELECT ph, tds, temperature, humidity, created_at
            FROM plant_data
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PersistedPlant {
                ph: row.get("ph"),
                tds: row.get("tds"),
                temperature: row.get("temperature"),
                humidity: row.get("humidity"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn recent_fish(&self, limit: i64) -> Result<Vec<PersistedFish>> {
        let rows = sqlx::query(
            r#"
            SELECT turbidity, water_temperature, ph, created_at
            FROM fish_data
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PersistedFish {
                turbidity: row.get("turbidity"),
                water_temperature: row.get("water_temperature"),
                ph: row.get("ph"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn recent_metric(&self, metric: Metric, limit: i64) -> Result<Vec<f64>> {
        // Table and column names come from the Metric enum, never from input.
        let sql = format!(
            "SELECT {column} FROM {table} ORDER BY created_at DESC LIMIT $1",
            column = metric.column(),
            table = metric.table(),
        );

        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(|row| row.get::<f64, _>(0)).collect())
    }
}
