//! Character-delimited extract reader for the shrinkage datamart.
//!
//! Converts the flat transactional extract into typed
//! [`merma_core::extract::ExtractRow`]s. Lines without a usable date are
//! dropped and recorded, never silently lost.
//!
//! # Quick start
//!
//! ```no_run
//! use merma_extract::{ExtractFormat, parse};
//!
//! let csv = "fecha,codigo_producto,descripcion,categoria,abastecimiento,linea,\
//!            seccion,negocio,tienda,comuna,region,zonal,motivo,\
//!            ubicacion_motivo,merma_unidad_p,merma_monto_p\n";
//! let extract = parse(csv.as_bytes(), "inline", &ExtractFormat::default()).unwrap();
//! println!("{} rows, {} dropped", extract.rows.len(), extract.dropped.len());
//! ```

pub mod error;
mod parse;

use std::path::PathBuf;

pub use error::{Error, Result};
use merma_core::{extract::ExtractRow, report::DroppedRow};
use serde::Deserialize;

// ─── Public types
// ─────────────────────────────────────────────────────────────

/// How the extract bytes are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractFormat {
  /// Field separator; must be ASCII.
  #[serde(default = "default_delimiter")]
  pub delimiter:  char,
  /// WHATWG encoding label, e.g. `utf-8` or `windows-1252`.
  #[serde(default = "default_encoding")]
  pub encoding:   String,
  /// How to read numeric dates that do not start with the year.
  #[serde(default)]
  pub date_order: DateOrder,
}

impl Default for ExtractFormat {
  fn default() -> Self {
    Self {
      delimiter:  default_delimiter(),
      encoding:   default_encoding(),
      date_order: DateOrder::default(),
    }
  }
}

/// Field order of `NN/NN/YYYY` and `NN-NN-YYYY` dates.
///
/// The preferred order is tried first; a date that is only valid the other
/// way round (e.g. `25/03/2024` under [`DateOrder::MonthFirst`]) is still
/// accepted. Year-first dates are unaffected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
  #[default]
  MonthFirst,
  DayFirst,
}

fn default_delimiter() -> char { ',' }

fn default_encoding() -> String { "utf-8".to_string() }

/// Where the extract lives and how to read it.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractOptions {
  pub path:   PathBuf,
  #[serde(flatten)]
  pub format: ExtractFormat,
}

/// The parsed extract: accepted rows plus an account of everything else.
#[derive(Debug, Clone)]
pub struct Extract {
  pub source:             String,
  /// Data lines seen (excluding the header), dropped or not.
  pub rows_read:          usize,
  pub rows:               Vec<ExtractRow>,
  pub dropped:            Vec<DroppedRow>,
  /// Measures that were present but not numeric; the row was kept with the
  /// measure missing.
  pub malformed_measures: usize,
}

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Parse an extract already in memory.
///
/// `source` names the extract in reports and logs.
pub fn parse(input: &[u8], source: &str, format: &ExtractFormat) -> Result<Extract> {
  parse::parse_extract(input, source, format)
}

/// Read and parse the extract at `options.path`.
pub async fn read(options: &ExtractOptions) -> Result<Extract> {
  let bytes = tokio::fs::read(&options.path).await.map_err(|source| Error::Io {
    path: options.path.clone(),
    source,
  })?;
  parse(&bytes, &options.path.display().to_string(), &options.format)
}
