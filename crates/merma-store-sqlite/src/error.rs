//! Error type for `merma-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] merma_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date parse error: {0}")]
  DateParse(String),

  /// The Schema Provisioner has not run against this database.
  #[error("warehouse table {0} does not exist; run provisioning first")]
  SchemaMissing(&'static str),

  #[error("{table}: row has {got} values, table expects {expected}")]
  RowArity {
    table:    &'static str,
    expected: usize,
    got:      usize,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
