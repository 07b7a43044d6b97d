//! The `Warehouse` trait: the storage seam of the pipeline.
//!
//! The trait is implemented by storage backends (e.g. `merma-store-sqlite`).
//! The pipeline in `merma-etl` depends on this abstraction, not on any
//! concrete backend.

use std::{collections::HashSet, future::Future};

use crate::{
  dimension::{DimensionTable, StoredRow, Value},
  fact::FactRow,
  report::TableCounts,
};

/// Abstraction over a star-schema warehouse.
///
/// Surrogate keys are assigned by storage on insert, so callers learn them
/// from the read-back of [`Warehouse::insert_dimension_rows`].
///
/// Every write method runs in its own transaction: either all rows of the
/// call are committed or none are.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Dimensions ────────────────────────────────────────────────────────

  /// Every stored row of `table`: surrogate key plus natural-key values in
  /// `table.natural_key` order.
  fn dimension_rows(
    &self,
    table: &'static DimensionTable,
  ) -> impl Future<Output = Result<Vec<StoredRow>, Self::Error>> + Send + '_;

  /// Insert `rows` into `table`, then read the whole table back inside the
  /// same transaction and pass it to `check`.
  ///
  /// The transaction commits only if `check` accepts the read-back; the
  /// result is then `Ok((inserted, value))`. If `check` refuses, nothing is
  /// committed and its error comes back as the inner `Err`. Each row holds
  /// `table.natural_key` then `table.attributes` values.
  fn insert_dimension_rows<T, E, F>(
    &self,
    table: &'static DimensionTable,
    rows: Vec<Vec<Value>>,
    check: F,
  ) -> impl Future<Output = Result<Result<(usize, T), E>, Self::Error>> + Send + '_
  where
    F: FnOnce(Vec<StoredRow>) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Fingerprints of every fact already loaded.
  fn fact_fingerprints(
    &self,
  ) -> impl Future<Output = Result<HashSet<String>, Self::Error>> + Send + '_;

  /// Append `facts` in one transaction and return how many were inserted.
  fn append_facts(
    &self,
    facts: Vec<FactRow>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn table_counts(
    &self,
  ) -> impl Future<Output = Result<TableCounts, Self::Error>> + Send + '_;
}
