//! SQLite backend for the shrinkage datamart.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Also hosts the Schema Provisioner that
//! creates the five star-schema tables.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::{ProvisionMode, SCHEMA_DESCRIPTION};
pub use store::SqliteWarehouse;
