//! Postgres persistence: connection pool, migrations, and the store and
//! sink implementations the engine runs against in production.

pub mod activity;
pub mod habit;

use std::sync::Arc;

use crate::error::{Error, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;

const MAX_CONNECTIONS: u32 = 10;

/// Leases each pin a connection for their whole hold. Capped below the pool
/// size so lease holders can always get a connection for their own queries.
const MAX_LEASES: usize = 5;

/// Database handle. Owns the connection pool; implements both
/// [`crate::store::HabitStore`] and [`crate::store::ActivitySink`].
pub struct Db {
    pool: PgPool,
    leases: Arc<Semaphore>,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            leases: Arc::new(Semaphore::new(MAX_LEASES)),
        })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn leases(&self) -> &Arc<Semaphore> {
        &self.leases
    }
}
