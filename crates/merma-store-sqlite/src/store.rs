//! [`SqliteWarehouse`]: the SQLite implementation of [`Warehouse`].

use std::{collections::HashSet, path::Path};

use merma_core::{
  dimension::{ALL_TABLES, DimensionTable, StoredRow, Value},
  fact::FactRow,
  report::{IntegrityReport, TableCounts},
  warehouse::Warehouse,
};

use crate::{
  Error, Result,
  encode::{
    RawDimensionRow, duplicate_keys_sql, encode_decimal, encode_row,
    insert_dimension_sql, read_cell, select_dimension_sql,
  },
  schema::{CONNECTION_PRAGMAS, CREATE_SCHEMA, DROP_SCHEMA, ProvisionMode, TABLES},
};

// ─── Warehouse ───────────────────────────────────────────────────────────────

/// A shrinkage datamart backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. The
/// connection closes when the last clone is dropped, or explicitly with
/// [`SqliteWarehouse::close`].
#[derive(Clone)]
pub struct SqliteWarehouse {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteWarehouse {
  /// Open (or create) the database at `path`. No DDL is issued; see
  /// [`SqliteWarehouse::provision`] and [`SqliteWarehouse::verify_schema`].
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let warehouse = Self { conn };
    warehouse.configure().await?;
    Ok(warehouse)
  }

  /// Open an in-memory database, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let warehouse = Self { conn };
    warehouse.configure().await?;
    Ok(warehouse)
  }

  async fn configure(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run the Schema Provisioner.
  pub async fn provision(&self, mode: ProvisionMode) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if mode == ProvisionMode::Recreate {
          tx.execute_batch(DROP_SCHEMA)?;
        }
        tx.execute_batch(CREATE_SCHEMA)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    tracing::info!(?mode, "warehouse schema provisioned");
    Ok(())
  }

  /// Fail with [`Error::SchemaMissing`] unless all five tables exist.
  pub async fn verify_schema(&self) -> Result<()> {
    let present: HashSet<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(names)
      })
      .await?;

    match TABLES.iter().find(|t| !present.contains(**t)) {
      Some(missing) => Err(Error::SchemaMissing(*missing)),
      None => Ok(()),
    }
  }

  /// Count orphaned facts and duplicated natural keys.
  ///
  /// Both are zero for any warehouse loaded only by this pipeline; the
  /// check exists for databases touched by other loaders.
  pub async fn integrity(&self) -> Result<IntegrityReport> {
    let duplicate_sql: Vec<String> = ALL_TABLES.iter().map(|t| duplicate_keys_sql(t)).collect();

    let report = self
      .conn
      .call(move |conn| {
        let orphaned_facts: i64 = conn.query_row(
          "SELECT COUNT(DISTINCT f.id_merma)
           FROM fact_merma f
           LEFT JOIN dim_tiempo   t ON t.id_tiempo   = f.id_tiempo
           LEFT JOIN dim_producto p ON p.id_producto = f.id_producto
           LEFT JOIN dim_tienda   s ON s.id_tienda   = f.id_tienda
           LEFT JOIN dim_motivo   m ON m.id_motivo   = f.id_motivo
           WHERE t.id_tiempo IS NULL OR p.id_producto IS NULL
              OR s.id_tienda IS NULL OR m.id_motivo   IS NULL",
          [],
          |row| row.get(0),
        )?;

        let mut duplicate_natural_keys: i64 = 0;
        for sql in &duplicate_sql {
          duplicate_natural_keys += conn.query_row(sql, [], |row| row.get::<_, i64>(0))?;
        }

        Ok(IntegrityReport {
          orphaned_facts:         orphaned_facts.max(0) as u64,
          duplicate_natural_keys: duplicate_natural_keys.max(0) as u64,
        })
      })
      .await?;
    Ok(report)
  }

  /// Close the underlying connection, surfacing any error from SQLite.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Dimensions ────────────────────────────────────────────────────────────

  async fn dimension_rows(&self, table: &'static DimensionTable) -> Result<Vec<StoredRow>> {
    let sql = select_dimension_sql(table);

    let raws = self
      .conn
      .call(move |conn| Ok(read_dimension(conn, &sql, table)?))
      .await?;

    raws.into_iter().map(|raw| raw.into_stored(table)).collect()
  }

  async fn insert_dimension_rows<T, E, F>(
    &self,
    table: &'static DimensionTable,
    rows: Vec<Vec<Value>>,
    check: F,
  ) -> Result<Result<(usize, T), E>>
  where
    F: FnOnce(Vec<StoredRow>) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
  {
    let insert_sql = insert_dimension_sql(table);
    let select_sql = select_dimension_sql(table);
    let encoded = rows
      .into_iter()
      .map(|row| encode_row(table, row))
      .collect::<Result<Vec<_>>>()?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(&insert_sql)?;
          for row in &encoded {
            inserted += stmt.execute(rusqlite::params_from_iter(row.iter()))?;
          }
        }

        // Returning without `commit` drops `tx`, which rolls the batch back.
        let stored = match read_dimension(&tx, &select_sql, table)?
          .into_iter()
          .map(|raw| raw.into_stored(table))
          .collect::<Result<Vec<_>>>()
        {
          Ok(stored) => stored,
          Err(e) => return Ok(Err(e)),
        };
        let checked = match check(stored) {
          Ok(value) => {
            tx.commit()?;
            Ok((inserted, value))
          }
          Err(refused) => Err(refused),
        };
        Ok(Ok(checked))
      })
      .await??;

    match &outcome {
      Ok((inserted, _)) => {
        tracing::debug!(table = table.name, inserted = *inserted, "dimension rows committed")
      }
      Err(_) => tracing::debug!(table = table.name, "read-back refused; dimension rows rolled back"),
    }
    Ok(outcome)
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn fact_fingerprints(&self) -> Result<HashSet<String>> {
    let fingerprints = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT huella_origen FROM fact_merma")?;
        let set = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(set)
      })
      .await?;
    Ok(fingerprints)
  }

  async fn append_facts(&self, facts: Vec<FactRow>) -> Result<usize> {
    if facts.is_empty() {
      return Ok(0);
    }

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO fact_merma (
               id_tiempo, id_producto, id_tienda, id_motivo,
               cantidad_merma, monto_merma, precio_producto, huella_origen
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for fact in &facts {
            inserted += stmt.execute(rusqlite::params![
              fact.time.0,
              fact.product.0,
              fact.store.0,
              fact.reason.0,
              encode_decimal(fact.quantity),
              encode_decimal(fact.amount),
              fact.unit_price.value(),
              fact.fingerprint,
            ])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    tracing::debug!(inserted, "fact rows committed");
    Ok(inserted)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn table_counts(&self) -> Result<TableCounts> {
    let counts = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM dim_tiempo),
             (SELECT COUNT(*) FROM dim_producto),
             (SELECT COUNT(*) FROM dim_tienda),
             (SELECT COUNT(*) FROM dim_motivo),
             (SELECT COUNT(*) FROM fact_merma)",
          [],
          |row| {
            let count = |idx: usize| row.get::<_, i64>(idx).map(|n| n.max(0) as u64);
            Ok(TableCounts {
              time:    count(0)?,
              product: count(1)?,
              store:   count(2)?,
              reason:  count(3)?,
              facts:   count(4)?,
            })
          },
        )?)
      })
      .await?;
    Ok(counts)
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Read every row of `table` with `sql` from [`select_dimension_sql`].
fn read_dimension(
  conn: &rusqlite::Connection,
  sql: &str,
  table: &'static DimensionTable,
) -> rusqlite::Result<Vec<RawDimensionRow>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map([], |row| {
      let cells = table
        .natural_key
        .iter()
        .enumerate()
        .map(|(i, column)| read_cell(row, i + 1, column.kind))
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(RawDimensionRow { id: row.get(0)?, cells })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
