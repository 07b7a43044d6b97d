//! Error types for the extract reader.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to read extract {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("unknown text encoding label: {0:?}")]
  UnknownEncoding(String),

  #[error("delimiter must be a single ASCII character, got {0:?}")]
  InvalidDelimiter(char),

  #[error("extract is missing required column {0:?}")]
  MissingColumn(&'static str),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
