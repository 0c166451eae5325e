#[cfg(test)]
pub mod memory;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use queries::PgStore;
pub use store::{Store, StoreError, StoreResult};
