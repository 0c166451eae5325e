// src/db/queries/mod.rs
use sqlx::PgPool;

pub mod assignment;
pub mod device_token;
pub mod notification;

/// Postgres-backed implementation of the store ports.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
