//! Encoding and decoding helpers between domain values and the plain SQLite
//! representations stored in warehouse columns.
//!
//! Dates are stored as `YYYY-MM-DD` text. Fixed-point measures are bound as
//! their decimal string and left to the column's `NUMERIC` affinity.

use chrono::NaiveDate;
use merma_core::{
  dimension::{ColumnKind, DimensionTable, StoredRow, SurrogateKey, Value},
  measure::Decimal2,
};
use rusqlite::types::Value as SqlValue;

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Quote an SQL identifier. Table and column names are compile-time
/// constants, but `dia_año` still needs quoting.
pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

pub fn select_dimension_sql(table: &DimensionTable) -> String {
  let columns: Vec<String> = std::iter::once(table.surrogate)
    .chain(table.natural_key.iter().map(|c| c.name))
    .map(quote)
    .collect();
  format!(
    "SELECT {} FROM {} ORDER BY {}",
    columns.join(", "),
    quote(table.name),
    quote(table.surrogate)
  )
}

pub fn insert_dimension_sql(table: &DimensionTable) -> String {
  let columns: Vec<String> = table.columns().map(|c| quote(c.name)).collect();
  let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    quote(table.name),
    columns.join(", "),
    placeholders.join(", ")
  )
}

/// Count natural keys of `table` that occur more than once.
pub fn duplicate_keys_sql(table: &DimensionTable) -> String {
  let key: Vec<String> = table.natural_key.iter().map(|c| quote(c.name)).collect();
  format!(
    "SELECT COUNT(*) FROM (SELECT 1 FROM {} GROUP BY {} HAVING COUNT(*) > 1)",
    quote(table.name),
    key.join(", ")
  )
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(v: Value) -> SqlValue {
  match v {
    Value::Text(s) => SqlValue::Text(s),
    Value::Integer(i) => SqlValue::Integer(i),
    Value::Date(d) => SqlValue::Text(encode_date(d)),
  }
}

/// Check arity and encode one insert row of `table`.
pub fn encode_row(table: &DimensionTable, row: Vec<Value>) -> Result<Vec<SqlValue>> {
  let expected = table.natural_key.len() + table.attributes.len();
  if row.len() != expected {
    return Err(Error::RowArity { table: table.name, expected, got: row.len() });
  }
  Ok(row.into_iter().map(encode_value).collect())
}

pub fn encode_decimal(d: Option<Decimal2>) -> Option<String> { d.map(|d| d.to_string()) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// A cell read directly from a natural-key column.
pub enum RawCell {
  Text(String),
  Integer(i64),
}

/// Read column `idx` of `row` as the storage type behind `kind`.
///
/// `NULL` text is read as the empty string: the pipeline never writes
/// `NULL` keys, and both mean "no value" in the extract.
pub fn read_cell(row: &rusqlite::Row<'_>, idx: usize, kind: ColumnKind) -> rusqlite::Result<RawCell> {
  Ok(match kind {
    ColumnKind::Integer => RawCell::Integer(row.get(idx)?),
    ColumnKind::Text | ColumnKind::Date => {
      RawCell::Text(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    }
  })
}

/// Raw values read directly from a dimension table row.
pub struct RawDimensionRow {
  pub id:    i64,
  pub cells: Vec<RawCell>,
}

impl RawDimensionRow {
  pub fn into_stored(self, table: &DimensionTable) -> Result<StoredRow> {
    let natural_key = table
      .natural_key
      .iter()
      .zip(self.cells)
      .map(|(column, cell)| match (column.kind, cell) {
        (ColumnKind::Date, RawCell::Text(s)) => decode_date(&s).map(Value::Date),
        (_, RawCell::Text(s)) => Ok(Value::Text(s)),
        (_, RawCell::Integer(i)) => Ok(Value::Integer(i)),
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(StoredRow { id: SurrogateKey(self.id), natural_key })
  }
}
