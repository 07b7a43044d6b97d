//! The shrinkage ETL pipeline.
//!
//! Turns a parsed extract into committed star-schema rows through any
//! [`merma_core::warehouse::Warehouse`]:
//!
//! 1. [`resolve`] each dimension in turn: insert only the natural keys the
//!    warehouse does not hold yet, then map every working row to its
//!    surrogate key.
//! 2. [`assemble`] fact rows from the four surrogate keys and the measures,
//!    rejecting rows that did not resolve.
//! 3. Append the facts whose fingerprint is not already loaded.
//!
//! [`Pipeline`] drives the whole sequence and tracks its
//! [`PipelineStage`](merma_core::stage::PipelineStage).

pub mod assemble;
pub mod error;
mod pipeline;
pub mod profile;
pub mod resolve;

pub use error::{Error, Result, StageError};
pub use pipeline::{Pipeline, PipelineConfig};

#[cfg(test)]
mod tests;
