//! Core types and trait definitions for the shrinkage datamart.
//!
//! This crate is deliberately free of CSV and database dependencies. It
//! defines the star schema (four dimensions and one fact table), the pure
//! derivations that feed it, and the [`warehouse::Warehouse`] seam that
//! storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod dimension;
pub mod error;
pub mod extract;
pub mod fact;
pub mod measure;
pub mod report;
pub mod stage;
pub mod time;
pub mod warehouse;

pub use error::{Error, Result};
