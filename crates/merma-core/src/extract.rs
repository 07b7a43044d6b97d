//! The extract row: one line of the flat source extract that survived date
//! parsing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  dimension::{Product, Store},
  measure::Decimal2,
};

/// A denormalised transaction line, already typed.
///
/// Rows with a missing or unparseable date never become an `ExtractRow`;
/// the reader drops and counts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractRow {
  /// 1-based line number in the source file (header is line 1).
  pub line:            u64,
  pub date:            NaiveDate,
  pub product:         Product,
  pub store:           Store,
  pub reason_type:     String,
  pub reason_location: String,
  /// `merma_unidad_p`; `None` when empty or malformed.
  pub quantity:        Option<Decimal2>,
  /// `merma_monto_p`; `None` when empty or malformed.
  pub amount:          Option<Decimal2>,
}
