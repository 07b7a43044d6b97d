//! The Dimension Resolver.
//!
//! One algorithm serves all four dimensions; only the [`Dimension`] impl
//! differs. For a dimension `D` and working rows `R`:
//!
//! ```text
//!   C  = distinct natural keys of R, first occurrence first
//!   K  = natural keys already stored
//!   insert  C ∖ K, reload and index    (one transaction)
//!   map every row of R to its surrogate key
//! ```
//!
//! The reload is indexed before the transaction commits. If it cannot be
//! read, decoded or indexed, the insert rolls back with it.
//!
//! A key is never inserted twice, and the surrogate key of an existing row
//! never changes, so resolving the same rows twice is a no-op the second
//! time.

use std::collections::{HashMap, HashSet};

use merma_core::{
  dimension::{Dimension, StoredRow, SurrogateKey},
  extract::ExtractRow,
  report::DimensionReport,
  warehouse::Warehouse,
};

use crate::StageError;

/// Surrogate keys for a batch of working rows.
#[derive(Debug, Clone)]
pub struct Resolution {
  /// One entry per input row, in input order. `None` when the natural key
  /// was not found after the reload.
  pub keys:   Vec<Option<SurrogateKey>>,
  pub report: DimensionReport,
}

/// Distinct natural keys of `rows`, in order of first occurrence.
pub fn distinct_keys<D: Dimension>(rows: &[ExtractRow]) -> Vec<D::Key> {
  let mut seen = HashSet::new();
  rows
    .iter()
    .map(D::natural_key)
    .filter(|key| seen.insert(key.clone()))
    .collect()
}

/// The candidates that are not stored yet (`C ∖ K`), order preserved.
pub fn missing_keys<D: Dimension>(
  candidates: &[D::Key],
  stored: &HashMap<D::Key, SurrogateKey>,
) -> Vec<D::Key> {
  candidates
    .iter()
    .filter(|key| !stored.contains_key(*key))
    .cloned()
    .collect()
}

/// Index stored rows by natural key.
///
/// Fails if a key appears twice: every later mapping would be ambiguous.
pub fn index_rows<D: Dimension>(
  rows: Vec<StoredRow>,
) -> Result<HashMap<D::Key, SurrogateKey>, StageError> {
  let table = D::TABLE.name;
  let mut index = HashMap::with_capacity(rows.len());
  for row in rows {
    let key = D::decode_key(row.natural_key)
      .map_err(|source| StageError::Decode { table, source })?;
    if let Some(first) = index.get(&key) {
      return Err(StageError::AmbiguousNaturalKey {
        table,
        key: format!("{key:?}"),
        first: *first,
        second: row.id,
      });
    }
    index.insert(key, row.id);
  }
  Ok(index)
}

/// Resolve dimension `D` for `rows` against `warehouse`.
///
/// On any error nothing of `D` is committed.
pub async fn resolve<D, W>(warehouse: &W, rows: &[ExtractRow]) -> Result<Resolution, StageError>
where
  D: Dimension,
  W: Warehouse,
{
  let table = D::TABLE;

  let candidates = distinct_keys::<D>(rows);
  let stored = load_index::<D, W>(warehouse).await?;
  let existing_before = stored.len();

  let new_keys = missing_keys::<D>(&candidates, &stored);
  let (inserted, reloaded) = warehouse
    .insert_dimension_rows(table, new_keys.iter().map(D::record).collect(), index_rows::<D>)
    .await
    .map_err(StageError::storage)??;

  let keys: Vec<Option<SurrogateKey>> = rows
    .iter()
    .map(|row| reloaded.get(&D::natural_key(row)).copied())
    .collect();

  let report = DimensionReport {
    dimension: table.kind,
    candidates: candidates.len(),
    existing_before,
    inserted,
    total_after: reloaded.len(),
  };
  tracing::info!(
    dimension = %table.kind,
    candidates = report.candidates,
    existing = report.existing_before,
    inserted = report.inserted,
    "dimension resolved"
  );

  Ok(Resolution { keys, report })
}

async fn load_index<D, W>(warehouse: &W) -> Result<HashMap<D::Key, SurrogateKey>, StageError>
where
  D: Dimension,
  W: Warehouse,
{
  let rows = warehouse
    .dimension_rows(D::TABLE)
    .await
    .map_err(StageError::storage)?;
  index_rows::<D>(rows)
}
