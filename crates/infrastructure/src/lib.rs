//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_store;
mod postgres_store;

pub use in_memory_store::InMemoryStore;
pub use postgres_store::{MIGRATOR, PostgresStore};
