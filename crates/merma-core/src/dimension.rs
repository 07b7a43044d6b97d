//! Dimension definitions for the star schema.
//!
//! Each dimension is described twice: declaratively, as a [`DimensionTable`]
//! that storage backends turn into SQL, and behaviourally, as an
//! implementation of [`Dimension`] that projects an [`ExtractRow`] onto its
//! natural key and encodes that key as column [`Value`]s.

use std::{fmt::Debug, hash::Hash};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  extract::ExtractRow,
  time::{TimeAttributes, flag_label},
};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The four dimensions of the shrinkage star schema, in load order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DimensionKind {
  Time,
  Product,
  Store,
  Reason,
}

/// A storage-assigned identifier of a dimension row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct SurrogateKey(pub i64);

// ─── Column values ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnKind {
  Text,
  Integer,
  Date,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
  pub name: &'static str,
  pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column { Column { name, kind: ColumnKind::Text } }

const fn integer(name: &'static str) -> Column {
  Column { name, kind: ColumnKind::Integer }
}

const fn date(name: &'static str) -> Column { Column { name, kind: ColumnKind::Date } }

/// A single cell crossing the warehouse seam.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
  Text(String),
  Integer(i64),
  Date(NaiveDate),
}

impl Value {
  pub fn kind(&self) -> ColumnKind {
    match self {
      Self::Text(_) => ColumnKind::Text,
      Self::Integer(_) => ColumnKind::Integer,
      Self::Date(_) => ColumnKind::Date,
    }
  }

  pub fn into_text(self, column: &'static str) -> Result<String> {
    match self {
      Self::Text(s) => Ok(s),
      _ => Err(Error::ValueKind { column, expected: ColumnKind::Text }),
    }
  }

  pub fn into_date(self, column: &'static str) -> Result<NaiveDate> {
    match self {
      Self::Date(d) => Ok(d),
      _ => Err(Error::ValueKind { column, expected: ColumnKind::Date }),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

// ─── Table description ───────────────────────────────────────────────────────

/// Declarative shape of a dimension table.
///
/// Inserted rows carry `natural_key` columns followed by `attributes`
/// columns; the surrogate column is assigned by storage.
#[derive(Debug)]
pub struct DimensionTable {
  pub kind:        DimensionKind,
  pub name:        &'static str,
  pub surrogate:   &'static str,
  pub natural_key: &'static [Column],
  /// Columns derived from the natural key (time dimension only).
  pub attributes:  &'static [Column],
}

impl DimensionTable {
  pub fn columns(&self) -> impl Iterator<Item = &Column> {
    self.natural_key.iter().chain(self.attributes)
  }
}

/// A dimension row as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
  pub id:          SurrogateKey,
  pub natural_key: Vec<Value>,
}

// ─── Behaviour ───────────────────────────────────────────────────────────────

/// A dimension of the star schema.
///
/// `Key` is the full natural-key tuple: two candidates are the same entity
/// iff every component is equal.
pub trait Dimension: 'static {
  type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

  const TABLE: &'static DimensionTable;

  /// Project a working row onto this dimension's natural key.
  fn natural_key(row: &ExtractRow) -> Self::Key;

  /// Encode a key in `TABLE.natural_key` column order.
  fn encode_key(key: &Self::Key) -> Vec<Value>;

  fn decode_key(values: Vec<Value>) -> Result<Self::Key>;

  /// Values for `TABLE.attributes`, in column order.
  fn attributes(_key: &Self::Key) -> Vec<Value> { Vec::new() }

  /// The full insert row: natural key followed by derived attributes.
  fn record(key: &Self::Key) -> Vec<Value> {
    let mut values = Self::encode_key(key);
    values.extend(Self::attributes(key));
    values
  }
}

fn exact<const N: usize>(table: &DimensionTable, values: Vec<Value>) -> Result<[Value; N]> {
  let got = values.len();
  <[Value; N]>::try_from(values).map_err(|_| Error::KeyArity {
    table: table.name,
    expected: N,
    got,
  })
}

// ─── Time ────────────────────────────────────────────────────────────────────

pub struct TimeDimension;

pub const TIME_TABLE: DimensionTable = DimensionTable {
  kind:        DimensionKind::Time,
  name:        "dim_tiempo",
  surrogate:   "id_tiempo",
  natural_key: &[date("fecha")],
  attributes:  &[
    integer("dia"),
    integer("mes"),
    integer("anio"),
    text("semestre"),
    text("nombre_mes"),
    text("trimestre"),
    text("dia_semana"),
    text("feriado"),
    integer("dia_año"),
    text("es_finde"),
  ],
};

impl Dimension for TimeDimension {
  type Key = NaiveDate;

  const TABLE: &'static DimensionTable = &TIME_TABLE;

  fn natural_key(row: &ExtractRow) -> NaiveDate { row.date }

  fn encode_key(key: &NaiveDate) -> Vec<Value> { vec![Value::Date(*key)] }

  fn decode_key(values: Vec<Value>) -> Result<NaiveDate> {
    let [fecha] = exact::<1>(Self::TABLE, values)?;
    fecha.into_date("fecha")
  }

  fn attributes(key: &NaiveDate) -> Vec<Value> {
    let t = TimeAttributes::derive(*key);
    vec![
      Value::Integer(i64::from(t.day)),
      Value::Integer(i64::from(t.month)),
      Value::Integer(i64::from(t.year)),
      Value::Text(t.semester.to_string()),
      t.month_name().into(),
      Value::Text(t.quarter_label()),
      t.weekday_name().into(),
      flag_label(t.holiday).into(),
      Value::Integer(i64::from(t.day_of_year)),
      flag_label(t.is_weekend).into(),
    ]
  }
}

// ─── Product ─────────────────────────────────────────────────────────────────

/// A product as described by one extract line. The whole tuple is the
/// natural key, so the same code with a different category is a different
/// dimension row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Product {
  pub code:          String,
  pub name:          String,
  pub category:      String,
  pub supply_type:   String,
  pub line:          String,
  pub section:       String,
  pub business_unit: String,
}

pub struct ProductDimension;

pub const PRODUCT_TABLE: DimensionTable = DimensionTable {
  kind:        DimensionKind::Product,
  name:        "dim_producto",
  surrogate:   "id_producto",
  natural_key: &[
    text("codigo"),
    text("nombre"),
    text("categoria"),
    text("abastecimiento"),
    text("linea"),
    text("seccion"),
    text("negocio"),
  ],
  attributes:  &[],
};

impl Dimension for ProductDimension {
  type Key = Product;

  const TABLE: &'static DimensionTable = &PRODUCT_TABLE;

  fn natural_key(row: &ExtractRow) -> Product { row.product.clone() }

  fn encode_key(p: &Product) -> Vec<Value> {
    vec![
      p.code.as_str().into(),
      p.name.as_str().into(),
      p.category.as_str().into(),
      p.supply_type.as_str().into(),
      p.line.as_str().into(),
      p.section.as_str().into(),
      p.business_unit.as_str().into(),
    ]
  }

  fn decode_key(values: Vec<Value>) -> Result<Product> {
    let [code, name, category, supply_type, line, section, business_unit] =
      exact::<7>(Self::TABLE, values)?;
    Ok(Product {
      code:          code.into_text("codigo")?,
      name:          name.into_text("nombre")?,
      category:      category.into_text("categoria")?,
      supply_type:   supply_type.into_text("abastecimiento")?,
      line:          line.into_text("linea")?,
      section:       section.into_text("seccion")?,
      business_unit: business_unit.into_text("negocio")?,
    })
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Store {
  pub name:    String,
  pub commune: String,
  pub region:  String,
  pub zone:    String,
}

pub struct StoreDimension;

pub const STORE_TABLE: DimensionTable = DimensionTable {
  kind:        DimensionKind::Store,
  name:        "dim_tienda",
  surrogate:   "id_tienda",
  natural_key: &[text("nombre"), text("comuna"), text("region"), text("zonal")],
  attributes:  &[],
};

impl Dimension for StoreDimension {
  type Key = Store;

  const TABLE: &'static DimensionTable = &STORE_TABLE;

  fn natural_key(row: &ExtractRow) -> Store { row.store.clone() }

  fn encode_key(s: &Store) -> Vec<Value> {
    vec![
      s.name.as_str().into(),
      s.commune.as_str().into(),
      s.region.as_str().into(),
      s.zone.as_str().into(),
    ]
  }

  fn decode_key(values: Vec<Value>) -> Result<Store> {
    let [name, commune, region, zone] = exact::<4>(Self::TABLE, values)?;
    Ok(Store {
      name:    name.into_text("nombre")?,
      commune: commune.into_text("comuna")?,
      region:  region.into_text("region")?,
      zone:    zone.into_text("zonal")?,
    })
  }
}

// ─── Reason ──────────────────────────────────────────────────────────────────

/// A shrinkage reason. `date` is a copy of the transaction date, so the same
/// reason on two different days yields two dimension rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reason {
  pub kind:     String,
  pub location: String,
  pub date:     NaiveDate,
}

pub struct ReasonDimension;

pub const REASON_TABLE: DimensionTable = DimensionTable {
  kind:        DimensionKind::Reason,
  name:        "dim_motivo",
  surrogate:   "id_motivo",
  natural_key: &[text("tipo_motivo"), text("ubicacion_motivo"), date("fecha_motivo")],
  attributes:  &[],
};

impl Dimension for ReasonDimension {
  type Key = Reason;

  const TABLE: &'static DimensionTable = &REASON_TABLE;

  fn natural_key(row: &ExtractRow) -> Reason {
    Reason {
      kind:     row.reason_type.clone(),
      location: row.reason_location.clone(),
      date:     row.date,
    }
  }

  fn encode_key(r: &Reason) -> Vec<Value> {
    vec![r.kind.as_str().into(), r.location.as_str().into(), Value::Date(r.date)]
  }

  fn decode_key(values: Vec<Value>) -> Result<Reason> {
    let [kind, location, date] = exact::<3>(Self::TABLE, values)?;
    Ok(Reason {
      kind:     kind.into_text("tipo_motivo")?,
      location: location.into_text("ubicacion_motivo")?,
      date:     date.into_date("fecha_motivo")?,
    })
  }
}

/// All dimension tables, in load order.
pub static ALL_TABLES: [&DimensionTable; 4] =
  [&TIME_TABLE, &PRODUCT_TABLE, &STORE_TABLE, &REASON_TABLE];
