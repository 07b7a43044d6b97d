//! Fact rows, one per surviving extract line.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  dimension::SurrogateKey,
  extract::ExtractRow,
  measure::{Decimal2, UnitPrice},
};

/// A fully-resolved `fact_merma` row, ready to append.
///
/// Every foreign key is present by construction: rows that failed to resolve
/// a dimension never become a `FactRow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRow {
  pub time:        SurrogateKey,
  pub product:     SurrogateKey,
  pub store:       SurrogateKey,
  pub reason:      SurrogateKey,
  /// `cantidad_merma`
  pub quantity:    Option<Decimal2>,
  /// `monto_merma`
  pub amount:      Option<Decimal2>,
  /// `precio_producto`
  pub unit_price:  UnitPrice,
  /// `huella_origen`: identity of the source line; see [`fingerprint`].
  pub fingerprint: String,
}

/// Identity of an extract line across runs.
///
/// Hashes every field value of the row (not its line number) together with
/// `occurrence`, the 0-based index of this row among identical rows of the
/// same extract. Re-loading an unchanged extract therefore reproduces the
/// same fingerprints, while duplicated lines stay distinct facts.
pub fn fingerprint(row: &ExtractRow, occurrence: u32) -> String {
  let mut hasher = Sha256::new();
  for field in content_fields(row) {
    hasher.update(field.as_bytes());
    hasher.update([0x1f]);
  }
  hasher.update(occurrence.to_be_bytes());
  hex::encode(hasher.finalize())
}

/// Field values that define whether two extract rows are identical.
pub fn content_fields(row: &ExtractRow) -> [String; 16] {
  let measure = |m: Option<Decimal2>| m.map(|d| d.to_string()).unwrap_or_default();
  [
    row.date.to_string(),
    row.product.code.clone(),
    row.product.name.clone(),
    row.product.category.clone(),
    row.product.supply_type.clone(),
    row.product.line.clone(),
    row.product.section.clone(),
    row.product.business_unit.clone(),
    row.store.name.clone(),
    row.store.commune.clone(),
    row.store.region.clone(),
    row.store.zone.clone(),
    row.reason_type.clone(),
    row.reason_location.clone(),
    measure(row.quantity),
    measure(row.amount),
  ]
}
