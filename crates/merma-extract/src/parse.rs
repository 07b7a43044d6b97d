//! Extract parser.
//!
//! Pipeline:
//!   raw bytes
//!     └─ decode_text()         → Cow<str>
//!          └─ csv reader + header check
//!               └─ RawRow (serde) per record
//!                    └─ into_row() → ExtractRow | DroppedRow

use std::borrow::Cow;

use chrono::NaiveDate;
use merma_core::{
  dimension::{Product, Store},
  extract::ExtractRow,
  measure::Decimal2,
  report::{DropReason, DroppedRow},
};
use serde::Deserialize;

use crate::{
  DateOrder, Extract, ExtractFormat,
  error::{Error, Result},
};

/// Header names every extract must carry.
pub(crate) const REQUIRED_COLUMNS: [&str; 16] = [
  "fecha",
  "codigo_producto",
  "descripcion",
  "categoria",
  "abastecimiento",
  "linea",
  "seccion",
  "negocio",
  "tienda",
  "comuna",
  "region",
  "zonal",
  "motivo",
  "ubicacion_motivo",
  "merma_unidad_p",
  "merma_monto_p",
];

const YEAR_FIRST: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const MONTH_FIRST: [&str; 2] = ["%m-%d-%Y", "%m/%d/%Y"];
const DAY_FIRST: [&str; 2] = ["%d-%m-%Y", "%d/%m/%Y"];

impl DateOrder {
  fn formats(self) -> impl Iterator<Item = &'static str> {
    let (preferred, fallback) = match self {
      Self::MonthFirst => (MONTH_FIRST, DAY_FIRST),
      Self::DayFirst => (DAY_FIRST, MONTH_FIRST),
    };
    YEAR_FIRST.into_iter().chain(preferred).chain(fallback)
  }
}

// ─── Raw record ──────────────────────────────────────────────────────────────

/// One CSV record, as text. Extra columns in the file are ignored.
#[derive(Debug, Deserialize)]
struct RawRow {
  fecha:            String,
  codigo_producto:  String,
  descripcion:      String,
  categoria:        String,
  abastecimiento:   String,
  linea:            String,
  seccion:          String,
  negocio:          String,
  tienda:           String,
  comuna:           String,
  region:           String,
  zonal:            String,
  motivo:           String,
  ubicacion_motivo: String,
  merma_unidad_p:   String,
  merma_monto_p:    String,
}

/// Result of typing a measure field.
enum Measure {
  Value(Decimal2),
  Missing,
  Malformed,
}

impl Measure {
  fn parse(s: &str) -> Self {
    if s.is_empty() {
      return Self::Missing;
    }
    match s.parse() {
      Ok(d) => Self::Value(d),
      Err(_) => Self::Malformed,
    }
  }

  fn value(&self) -> Option<Decimal2> {
    match self {
      Self::Value(d) => Some(*d),
      _ => None,
    }
  }

  fn is_malformed(&self) -> bool { matches!(self, Self::Malformed) }
}

impl RawRow {
  /// Type the record. A row without a usable date is dropped.
  fn into_row(self, line: u64, order: DateOrder) -> Result<(ExtractRow, usize), DropReason> {
    let date = parse_date(&self.fecha, order)?;
    let quantity = Measure::parse(&self.merma_unidad_p);
    let amount = Measure::parse(&self.merma_monto_p);
    let malformed = usize::from(quantity.is_malformed()) + usize::from(amount.is_malformed());

    let row = ExtractRow {
      line,
      date,
      product: Product {
        code:          self.codigo_producto,
        name:          self.descripcion,
        category:      self.categoria,
        supply_type:   self.abastecimiento,
        line:          self.linea,
        section:       self.seccion,
        business_unit: self.negocio,
      },
      store: Store {
        name:    self.tienda,
        commune: self.comuna,
        region:  self.region,
        zone:    self.zonal,
      },
      reason_type: self.motivo,
      reason_location: self.ubicacion_motivo,
      quantity: quantity.value(),
      amount: amount.value(),
    };
    Ok((row, malformed))
  }
}

// ─── Low-level helpers
// ────────────────────────────────────────────────────────

/// Parse a transaction date. A trailing time of day (after a space or `T`)
/// is ignored.
pub(crate) fn parse_date(raw: &str, order: DateOrder) -> Result<NaiveDate, DropReason> {
  let day = raw.trim().split([' ', 'T']).next().unwrap_or_default();
  if day.is_empty() {
    return Err(DropReason::MissingDate);
  }
  order
    .formats()
    .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
    .ok_or_else(|| DropReason::InvalidDate(raw.trim().to_string()))
}

fn decode_text<'a>(input: &'a [u8], label: &str) -> Result<Cow<'a, str>> {
  let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
    .ok_or_else(|| Error::UnknownEncoding(label.to_string()))?;
  let (text, actual, had_errors) = encoding.decode(input);
  if had_errors {
    tracing::warn!(
      encoding = actual.name(),
      "extract contains byte sequences invalid in the declared encoding; replaced"
    );
  }
  Ok(text)
}

fn delimiter_byte(c: char) -> Result<u8> {
  u8::try_from(c)
    .ok()
    .filter(u8::is_ascii)
    .ok_or(Error::InvalidDelimiter(c))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub(crate) fn parse_extract(
  input: &[u8],
  source: &str,
  format: &ExtractFormat,
) -> Result<Extract> {
  let delimiter = delimiter_byte(format.delimiter)?;
  let text = decode_text(input, &format.encoding)?;

  let mut reader = csv::ReaderBuilder::new()
    .delimiter(delimiter)
    .trim(csv::Trim::All)
    .from_reader(text.as_bytes());

  let headers = reader.headers()?.clone();
  if let Some(missing) = REQUIRED_COLUMNS
    .iter()
    .find(|col| !headers.iter().any(|h| h == **col))
  {
    return Err(Error::MissingColumn(missing));
  }

  let mut extract = Extract {
    source:             source.to_string(),
    rows_read:          0,
    rows:               Vec::new(),
    dropped:            Vec::new(),
    malformed_measures: 0,
  };

  for (index, result) in reader.records().enumerate() {
    extract.rows_read += 1;
    // +2: 1-indexed, plus the header line.
    let fallback_line = index as u64 + 2;

    let outcome = result
      .map_err(|e| {
        let line = e.position().map_or(fallback_line, |p| p.line());
        (line, DropReason::MalformedRecord(e.to_string()))
      })
      .and_then(|record| {
        let line = record.position().map_or(fallback_line, |p| p.line());
        record
          .deserialize::<RawRow>(Some(&headers))
          .map_err(|e| DropReason::MalformedRecord(e.to_string()))
          .and_then(|raw| raw.into_row(line, format.date_order))
          .map_err(|reason| (line, reason))
      });

    match outcome {
      Ok((row, malformed)) => {
        extract.malformed_measures += malformed;
        extract.rows.push(row);
      }
      Err((line, reason)) => {
        tracing::debug!(line, ?reason, "dropping extract line");
        extract.dropped.push(DroppedRow { line, reason });
      }
    }
  }

  if !extract.dropped.is_empty() {
    tracing::warn!(
      source,
      dropped = extract.dropped.len(),
      "extract lines excluded before dimension resolution"
    );
  }
  tracing::info!(
    source,
    read = extract.rows_read,
    accepted = extract.rows.len(),
    malformed_measures = extract.malformed_measures,
    "extract parsed"
  );

  Ok(extract)
}
