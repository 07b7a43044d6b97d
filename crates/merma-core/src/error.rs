//! Error types for `merma-core`.

use thiserror::Error;

use crate::dimension::ColumnKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid fixed-point decimal: {0:?}")]
  InvalidDecimal(String),

  #[error("{table}: expected {expected} natural-key values, got {got}")]
  KeyArity {
    table:    &'static str,
    expected: usize,
    got:      usize,
  },

  #[error("column {column}: expected a {expected} value")]
  ValueKind {
    column:   &'static str,
    expected: ColumnKind,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
