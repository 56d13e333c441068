use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds the value.
    #[error("{0} already taken")]
    Conflict(&'static str),
    /// The owning user of a new contact does not exist.
    #[error("owner {0} does not exist")]
    MissingOwner(uuid::Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Postgres-backed implementation of the user and contact stores.
#[derive(Clone)]
pub struct PgStore {
    pub db: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

/// Maps a unique violation on `users` to the column that clashed.
pub(crate) fn user_conflict(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(c) if c.contains("username") => StoreError::Conflict("username"),
                _ => StoreError::Conflict("email"),
            };
        }
    }
    StoreError::Database(err)
}
