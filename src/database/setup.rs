use sqlx::{postgres::PgPoolOptions, Executor, Pool, Postgres};

use crate::error::QueryError;

const SCHEMA: &str = include_str!("../../migrations/0001_foodgram.sql");

pub async fn connect(database_url: &str) -> Result<Pool<Postgres>, potion::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(QueryError::from)?;

    Ok(pool)
}

/// Creates any missing tables. Safe to run on every start.
pub async fn apply_schema(pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    pool.execute(SCHEMA).await.map_err(QueryError::from)?;
    log::info!("Database schema is up to date");

    Ok(())
}
