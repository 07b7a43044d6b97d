//! SQL schema for the shrinkage datamart.
//!
//! Provisioning is a one-time bootstrap. Pipeline runs only check that the
//! tables exist (see [`TABLES`]); they never issue DDL.

/// How [`SqliteWarehouse::provision`](crate::SqliteWarehouse::provision)
/// treats existing tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
  /// Create whatever is missing; keep existing data.
  IfMissing,
  /// Drop all five tables and create them empty.
  Recreate,
}

/// Per-connection settings, applied every time a connection is opened.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Every table the pipeline needs, facts last.
pub const TABLES: [&str; 5] =
  ["dim_tiempo", "dim_producto", "dim_tienda", "dim_motivo", "fact_merma"];

/// Drops in reverse dependency order.
pub const DROP_SCHEMA: &str = "
DROP TABLE IF EXISTS fact_merma;
DROP TABLE IF EXISTS dim_motivo;
DROP TABLE IF EXISTS dim_tienda;
DROP TABLE IF EXISTS dim_producto;
DROP TABLE IF EXISTS dim_tiempo;
";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Natural keys are `UNIQUE`, so storage refuses a duplicate dimension row
/// even if a caller skips the set difference.
pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS dim_tiempo (
    id_tiempo   INTEGER PRIMARY KEY AUTOINCREMENT,
    fecha       DATE NOT NULL,          -- ISO 8601 YYYY-MM-DD
    dia         INTEGER,
    mes         INTEGER,
    anio        INTEGER,
    semestre    VARCHAR(10),            -- '1st' | '2nd'
    nombre_mes  VARCHAR(20),
    trimestre   VARCHAR(20),            -- 'T1'..'T4'
    dia_semana  VARCHAR(20),
    feriado     VARCHAR(20),            -- placeholder, always 'No'
    \"dia_año\"   INTEGER,
    es_finde    VARCHAR(20),            -- 'Sí' | 'No'
    UNIQUE (fecha)
);

CREATE TABLE IF NOT EXISTS dim_producto (
    id_producto    INTEGER PRIMARY KEY AUTOINCREMENT,
    codigo         VARCHAR(50)  NOT NULL,
    nombre         VARCHAR(100) NOT NULL,
    categoria      VARCHAR(50)  NOT NULL,
    abastecimiento VARCHAR(50)  NOT NULL,
    linea          VARCHAR(50)  NOT NULL,
    seccion        VARCHAR(50)  NOT NULL,
    negocio        VARCHAR(50)  NOT NULL,
    UNIQUE (codigo, nombre, categoria, abastecimiento, linea, seccion, negocio)
);

CREATE TABLE IF NOT EXISTS dim_tienda (
    id_tienda INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre    VARCHAR(100) NOT NULL,
    comuna    VARCHAR(50)  NOT NULL,
    region    VARCHAR(50)  NOT NULL,
    zonal     VARCHAR(50)  NOT NULL,
    UNIQUE (nombre, comuna, region, zonal)
);

-- fecha_motivo repeats the transaction date, so one reason yields one row
-- per distinct day.
CREATE TABLE IF NOT EXISTS dim_motivo (
    id_motivo        INTEGER PRIMARY KEY AUTOINCREMENT,
    tipo_motivo      VARCHAR(100) NOT NULL,
    ubicacion_motivo VARCHAR(100) NOT NULL,
    fecha_motivo     DATE         NOT NULL,
    UNIQUE (tipo_motivo, ubicacion_motivo, fecha_motivo)
);

-- Facts are append-only. huella_origen identifies the source line so a
-- re-run of the same extract inserts nothing.
CREATE TABLE IF NOT EXISTS fact_merma (
    id_merma        INTEGER PRIMARY KEY AUTOINCREMENT,
    id_tiempo       INTEGER NOT NULL REFERENCES dim_tiempo(id_tiempo),
    id_producto     INTEGER NOT NULL REFERENCES dim_producto(id_producto),
    id_tienda       INTEGER NOT NULL REFERENCES dim_tienda(id_tienda),
    id_motivo       INTEGER NOT NULL REFERENCES dim_motivo(id_motivo),
    cantidad_merma  DECIMAL(10, 2),
    monto_merma     DECIMAL(12, 2),
    precio_producto DECIMAL(10, 2),         -- NULL when quantity is 0 or missing
    huella_origen   TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS fact_merma_tiempo_idx   ON fact_merma(id_tiempo);
CREATE INDEX IF NOT EXISTS fact_merma_producto_idx ON fact_merma(id_producto);
CREATE INDEX IF NOT EXISTS fact_merma_tienda_idx   ON fact_merma(id_tienda);
CREATE INDEX IF NOT EXISTS fact_merma_motivo_idx   ON fact_merma(id_motivo);
";

/// Table and column description handed to read-only query consumers.
///
/// Any change to the DDL above must be mirrored here.
pub const SCHEMA_DESCRIPTION: &str = "\
TABLE dim_tiempo (
    id_tiempo INTEGER PRIMARY KEY,
    fecha DATE NOT NULL,            -- YYYY-MM-DD, unique
    dia INTEGER,
    mes INTEGER,
    anio INTEGER,
    semestre VARCHAR(10),           -- '1st' or '2nd'
    nombre_mes VARCHAR(20),         -- English month name, e.g. 'March'
    trimestre VARCHAR(20),          -- 'T1'..'T4'
    dia_semana VARCHAR(20),         -- English weekday name, e.g. 'Saturday'
    feriado VARCHAR(20),            -- always 'No'
    dia_año INTEGER,                -- 1..366
    es_finde VARCHAR(20))           -- 'Sí' or 'No'

TABLE dim_producto (
    id_producto INTEGER PRIMARY KEY,
    codigo VARCHAR(50),
    nombre VARCHAR(100),
    categoria VARCHAR(50),
    abastecimiento VARCHAR(50),
    linea VARCHAR(50),
    seccion VARCHAR(50),
    negocio VARCHAR(50))

TABLE dim_tienda (
    id_tienda INTEGER PRIMARY KEY,
    nombre VARCHAR(100),
    comuna VARCHAR(50),
    region VARCHAR(50),
    zonal VARCHAR(50))

TABLE dim_motivo (
    id_motivo INTEGER PRIMARY KEY,
    tipo_motivo VARCHAR(100),
    ubicacion_motivo VARCHAR(100),
    fecha_motivo DATE)              -- same as the transaction date

TABLE fact_merma (
    id_merma INTEGER PRIMARY KEY,
    id_tiempo INTEGER REFERENCES dim_tiempo(id_tiempo),
    id_producto INTEGER REFERENCES dim_producto(id_producto),
    id_tienda INTEGER REFERENCES dim_tienda(id_tienda),
    id_motivo INTEGER REFERENCES dim_motivo(id_motivo),
    cantidad_merma DECIMAL(10, 2),  -- units lost
    monto_merma DECIMAL(12, 2),     -- amount lost
    precio_producto DECIMAL(10, 2), -- round(monto_merma / cantidad_merma); NULL if undefined
    huella_origen TEXT)             -- source line fingerprint
";
