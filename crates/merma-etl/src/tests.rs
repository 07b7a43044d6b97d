//! End-to-end pipeline tests against an in-memory SQLite warehouse.

use std::collections::HashSet;

use merma_core::{
  dimension::{
    DimensionKind, DimensionTable, PRODUCT_TABLE, STORE_TABLE, StoreDimension, StoredRow,
    SurrogateKey, Value,
  },
  fact::FactRow,
  report::{DropReason, Rejection, TableCounts},
  stage::PipelineStage,
  warehouse::Warehouse,
};
use merma_extract::{Extract, ExtractFormat, ExtractOptions, parse};
use merma_store_sqlite::{ProvisionMode, SqliteWarehouse};

use crate::{Error, Pipeline, PipelineConfig, StageError, resolve::resolve};

// ─── Fixtures ────────────────────────────────────────────────────────────────

const HEADER: &str = "fecha,codigo_producto,descripcion,categoria,abastecimiento,linea,\
                      seccion,negocio,tienda,comuna,region,zonal,motivo,ubicacion_motivo,\
                      merma_unidad_p,merma_monto_p";

/// One extract line with the fields tests vary.
fn line(
  date: &str,
  code: &str,
  category: &str,
  store: &str,
  reason: &str,
  qty: &str,
  amount: &str,
) -> String {
  format!(
    "{date},{code},Producto {code},{category},CD,Frescos,Sala,Super,{store},Ñuñoa,RM,Oriente,\
     {reason},Bodega,{qty},{amount}"
  )
}

fn extract(lines: &[String]) -> Extract {
  let mut csv = String::from(HEADER);
  for l in lines {
    csv.push('\n');
    csv.push_str(l);
  }
  csv.push('\n');
  parse(csv.as_bytes(), "fixture.csv", &ExtractFormat::default()).expect("fixture parses")
}

/// Ten lines, two of them without a date.
fn ten_lines() -> Vec<String> {
  vec![
    line("2024-03-01", "P1", "Lácteos", "Centro", "Vencimiento", "2", "1000"),
    line("2024-03-01", "P2", "Panadería", "Centro", "Vencimiento", "1", "350"),
    line("2024-03-02", "P1", "Lácteos", "Norte", "Robo", "3", "1500"),
    line("", "P3", "Aseo", "Norte", "Robo", "1", "990"),
    line("2024-03-02", "P1", "Lácteos", "Norte", "Robo", "0", "1500"),
    line("2024-03-03", "P3", "Aseo", "Sur", "Daño", "4", "3960"),
    line("", "P2", "Panadería", "Sur", "Daño", "2", "700"),
    line("2024-03-03", "P2", "Panadería", "Centro", "Vencimiento", "", "700"),
    line("2024-03-04", "P1", "Lácteos", "Sur", "Robo", "5", "2500"),
    line("2024-03-04", "P1", "Lácteos", "Sur", "Robo", "5", "2500"),
  ]
}

async fn warehouse() -> SqliteWarehouse {
  let w = SqliteWarehouse::open_in_memory().await.expect("in-memory warehouse");
  w.provision(ProvisionMode::IfMissing).await.expect("provision");
  w
}

fn config() -> PipelineConfig {
  PipelineConfig {
    extract: ExtractOptions { path: "fixture.csv".into(), format: ExtractFormat::default() },
  }
}

// ─── Fault injection ─────────────────────────────────────────────────────────

/// Wraps a real warehouse and misbehaves on one table.
#[derive(Clone)]
struct Faulty {
  inner:             SqliteWarehouse,
  /// Inserts into this table fail as if the connection dropped.
  fail_insert:       Option<&'static str>,
  /// Reads of this table omit rows containing this text value.
  hide:              Option<(&'static str, &'static str)>,
  /// Reads of this table return the first row twice, under a new id.
  duplicate_on_read: Option<&'static str>,
  /// The read-back after inserting into this table loses its key values.
  garble_read_back:  Option<&'static str>,
  /// Fact appends fail as if the connection dropped.
  fail_append:       bool,
}

impl Faulty {
  fn new(inner: SqliteWarehouse) -> Self {
    Self {
      inner,
      fail_insert: None,
      hide: None,
      duplicate_on_read: None,
      garble_read_back: None,
      fail_append: false,
    }
  }

  fn tamper(&self, table: &DimensionTable, rows: &mut Vec<StoredRow>) {
    if let Some((name, text)) = self.hide {
      if name == table.name {
        let hidden = Value::Text(text.to_string());
        rows.retain(|r| !r.natural_key.contains(&hidden));
      }
    }
    if self.duplicate_on_read == Some(table.name) {
      if let Some(first) = rows.first().cloned() {
        rows.push(StoredRow { id: SurrogateKey(first.id.0 + 1_000), ..first });
      }
    }
  }
}

impl Warehouse for Faulty {
  type Error = merma_store_sqlite::Error;

  async fn dimension_rows(
    &self,
    table: &'static DimensionTable,
  ) -> merma_store_sqlite::Result<Vec<StoredRow>> {
    let mut rows = self.inner.dimension_rows(table).await?;
    self.tamper(table, &mut rows);
    Ok(rows)
  }

  async fn insert_dimension_rows<T, E, F>(
    &self,
    table: &'static DimensionTable,
    rows: Vec<Vec<Value>>,
    check: F,
  ) -> merma_store_sqlite::Result<Result<(usize, T), E>>
  where
    F: FnOnce(Vec<StoredRow>) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
  {
    if self.fail_insert == Some(table.name) {
      return Err(tokio_rusqlite::Error::ConnectionClosed.into());
    }
    let faults = self.clone();
    self
      .inner
      .insert_dimension_rows(table, rows, move |mut stored| {
        faults.tamper(table, &mut stored);
        if faults.garble_read_back == Some(table.name) {
          for row in &mut stored {
            row.natural_key.truncate(1);
          }
        }
        check(stored)
      })
      .await
  }

  async fn fact_fingerprints(&self) -> merma_store_sqlite::Result<HashSet<String>> {
    self.inner.fact_fingerprints().await
  }

  async fn append_facts(&self, facts: Vec<FactRow>) -> merma_store_sqlite::Result<usize> {
    if self.fail_append {
      return Err(tokio_rusqlite::Error::ConnectionClosed.into());
    }
    self.inner.append_facts(facts).await
  }

  async fn table_counts(&self) -> merma_store_sqlite::Result<TableCounts> {
    self.inner.table_counts().await
  }
}

// ─── Full runs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn rows_without_date_are_dropped_before_loading() {
  let w = warehouse().await;
  let mut pipeline = Pipeline::new(w.clone(), config());
  let report = pipeline.run_extract(extract(&ten_lines())).await.unwrap();

  assert_eq!(report.rows_read, 10);
  assert_eq!(report.rows_accepted(), 8);
  assert_eq!(report.rows_dropped.len(), 2);
  assert!(report.rows_dropped.iter().all(|d| d.reason == DropReason::MissingDate));
  assert_eq!(report.rows_dropped.iter().map(|d| d.line).collect::<Vec<_>>(), [5, 8]);

  assert_eq!(report.facts_inserted, 8);
  assert_eq!(w.table_counts().await.unwrap().facts, 8);
}

#[tokio::test]
async fn full_run_loads_star_schema() {
  let w = warehouse().await;
  let mut pipeline = Pipeline::new(w.clone(), config());
  let report = pipeline.run_extract(extract(&ten_lines())).await.unwrap();

  assert_eq!(pipeline.stage(), PipelineStage::FactLoaded);
  assert_eq!(report.final_stage, PipelineStage::FactLoaded);
  assert_eq!(report.run_id, pipeline.run_id());

  assert_eq!(w.table_counts().await.unwrap(), TableCounts {
    time:    4,
    product: 3,
    store:   3,
    // (reason, location, date) fans out per day.
    reason:  5,
    facts:   8,
  });

  let time = report.dimension(DimensionKind::Time).unwrap();
  assert_eq!((time.candidates, time.existing_before, time.inserted, time.total_after), (4, 0, 4, 4));

  assert!(report.rejections.is_empty());
  // Quantity "0" and an empty quantity.
  assert_eq!(report.undefined_unit_prices, 2);
  assert!(w.integrity().await.unwrap().is_clean());
}

#[tokio::test]
async fn rerunning_the_same_extract_changes_nothing() {
  let w = warehouse().await;
  Pipeline::new(w.clone(), config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();
  let before = w.table_counts().await.unwrap();

  let report = Pipeline::new(w.clone(), config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();

  assert_eq!(w.table_counts().await.unwrap(), before);
  assert!(report.dimensions.iter().all(|d| d.inserted == 0));
  assert_eq!(report.facts_inserted, 0);
  assert_eq!(report.facts_already_loaded, 8);
}

#[tokio::test]
async fn overlapping_extract_inserts_only_new_keys() {
  let w = warehouse().await;
  Pipeline::new(w.clone(), config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();

  let next = vec![
    // Known store and product on a known day: nothing new but the fact.
    line("2024-03-01", "P1", "Lácteos", "Centro", "Vencimiento", "1", "500"),
    // New store, new day.
    line("2024-03-05", "P1", "Lácteos", "Oeste", "Robo", "1", "500"),
  ];
  let report = Pipeline::new(w.clone(), config())
    .run_extract(extract(&next))
    .await
    .unwrap();

  let inserted = |kind| report.dimension(kind).unwrap().inserted;
  assert_eq!(inserted(DimensionKind::Time), 1);
  assert_eq!(inserted(DimensionKind::Product), 0);
  assert_eq!(inserted(DimensionKind::Store), 1);
  assert_eq!(inserted(DimensionKind::Reason), 1);
  assert_eq!(report.facts_inserted, 2);

  let counts = w.table_counts().await.unwrap();
  assert_eq!((counts.time, counts.store, counts.facts), (5, 4, 10));
  assert!(w.integrity().await.unwrap().is_clean());
}

#[tokio::test]
async fn same_code_with_different_category_is_two_products() {
  let w = warehouse().await;
  let lines = vec![
    line("2024-03-01", "P1", "Lácteos", "Centro", "Robo", "1", "100"),
    line("2024-03-01", "P1", "Quesos", "Centro", "Robo", "1", "100"),
  ];
  Pipeline::new(w.clone(), config())
    .run_extract(extract(&lines))
    .await
    .unwrap();
  assert_eq!(w.table_counts().await.unwrap().product, 2);
}

#[tokio::test]
async fn pipeline_runs_once() {
  let w = warehouse().await;
  let mut pipeline = Pipeline::new(w, config());
  pipeline.run_extract(extract(&ten_lines())).await.unwrap();

  let err = pipeline.run_extract(extract(&ten_lines())).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyRun(PipelineStage::FactLoaded)));
}

#[tokio::test]
async fn run_reads_configured_extract() {
  let mut config = config();
  config.extract.path = std::env::temp_dir().join("merma-etl-missing-extract.csv");

  let mut pipeline = Pipeline::new(warehouse().await, config);
  let err = pipeline.run().await.unwrap_err();
  assert!(matches!(err, Error::Extract(merma_extract::Error::Io { .. })));
  assert_eq!(pipeline.stage(), PipelineStage::Bootstrapped);
}

// ─── Resolver ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolver_inserts_exactly_the_set_difference() {
  let w = warehouse().await;
  let seed = vec![
    line("2024-03-01", "P1", "X", "Centro", "Robo", "1", "1"),
    line("2024-03-01", "P1", "X", "Norte", "Robo", "1", "1"),
  ];
  resolve::<StoreDimension, _>(&w, &extract(&seed).rows).await.unwrap();
  let before: Vec<StoredRow> = w.dimension_rows(&STORE_TABLE).await.unwrap();

  let rows = extract(&[
    line("2024-03-01", "P1", "X", "Norte", "Robo", "1", "1"),
    line("2024-03-01", "P1", "X", "Sur", "Robo", "1", "1"),
    line("2024-03-01", "P1", "X", "Sur", "Robo", "1", "1"),
    line("2024-03-01", "P1", "X", "Centro", "Robo", "1", "1"),
  ])
  .rows;
  let resolution = resolve::<StoreDimension, _>(&w, &rows).await.unwrap();

  assert_eq!(resolution.report.candidates, 3);
  assert_eq!(resolution.report.existing_before, 2);
  assert_eq!(resolution.report.inserted, 1);
  assert_eq!(resolution.report.total_after, 3);

  // Existing surrogate keys are untouched.
  let after = w.dimension_rows(&STORE_TABLE).await.unwrap();
  assert_eq!(&after[..2], &before[..]);

  let ids: Vec<SurrogateKey> = resolution.keys.into_iter().map(Option::unwrap).collect();
  assert_eq!(ids[0], before[1].id);
  assert_eq!(ids[1], ids[2]);
  assert_eq!(ids[1], after[2].id);
  assert_eq!(ids[3], before[0].id);
}

// ─── Failure semantics ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_stage_keeps_earlier_stages_committed() {
  let inner = warehouse().await;
  let faulty = Faulty { fail_insert: Some(PRODUCT_TABLE.name), ..Faulty::new(inner.clone()) };

  let mut pipeline = Pipeline::new(faulty, config());
  let err = pipeline.run_extract(extract(&ten_lines())).await.unwrap_err();

  let Error::Stage { attempted, source, report } = err else {
    panic!("expected a stage error");
  };
  assert_eq!(attempted, PipelineStage::ProductLoaded);
  assert!(matches!(source, StageError::Storage(_)));
  assert_eq!(pipeline.stage(), PipelineStage::TimeLoaded);

  // The partial report keeps what the committed stages counted.
  assert_eq!(report.final_stage, PipelineStage::TimeLoaded);
  assert_eq!(report.rows_dropped.len(), 2);
  assert_eq!(report.dimensions.len(), 1);
  assert_eq!(report.dimension(DimensionKind::Time).unwrap().inserted, 4);

  let counts = inner.table_counts().await.unwrap();
  assert_eq!(counts.time, 4);
  assert_eq!((counts.product, counts.store, counts.reason, counts.facts), (0, 0, 0, 0));

  // A clean rerun completes the load without duplicating time rows.
  let report = Pipeline::new(inner.clone(), config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();
  assert_eq!(report.dimension(DimensionKind::Time).unwrap().inserted, 0);
  assert_eq!(inner.table_counts().await.unwrap().facts, 8);
}

#[tokio::test]
async fn unresolved_rows_are_rejected_not_inserted() {
  let inner = warehouse().await;
  let faulty = Faulty { hide: Some((STORE_TABLE.name, "Sur")), ..Faulty::new(inner.clone()) };

  let report = Pipeline::new(faulty, config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();

  // Lines 7, 10 and 11 are at store "Sur".
  assert_eq!(report.rejections, vec![
    Rejection { line: 7, missing: vec![DimensionKind::Store] },
    Rejection { line: 10, missing: vec![DimensionKind::Store] },
    Rejection { line: 11, missing: vec![DimensionKind::Store] },
  ]);
  assert_eq!(report.facts_inserted, 5);
  assert_eq!(report.final_stage, PipelineStage::FactLoaded);
  assert!(inner.integrity().await.unwrap().is_clean());
}

#[tokio::test]
async fn ambiguous_stored_key_aborts_the_stage() {
  let inner = warehouse().await;
  let faulty =
    Faulty { duplicate_on_read: Some(STORE_TABLE.name), ..Faulty::new(inner.clone()) };

  let mut pipeline = Pipeline::new(faulty, config());
  let err = pipeline.run_extract(extract(&ten_lines())).await.unwrap_err();

  assert!(matches!(
    err,
    Error::Stage {
      attempted: PipelineStage::StoreLoaded,
      source: StageError::AmbiguousNaturalKey { table: "dim_tienda", .. },
      ..
    }
  ));
  assert_eq!(pipeline.stage(), PipelineStage::ProductLoaded);

  // The stores inserted before the duplicate was seen are rolled back.
  let counts = inner.table_counts().await.unwrap();
  assert_eq!((counts.time, counts.product), (4, 3));
  assert_eq!((counts.store, counts.reason, counts.facts), (0, 0, 0));
}

#[tokio::test]
async fn undecodable_read_back_rolls_back_the_insert() {
  let inner = warehouse().await;
  let faulty =
    Faulty { garble_read_back: Some(PRODUCT_TABLE.name), ..Faulty::new(inner.clone()) };

  let mut pipeline = Pipeline::new(faulty, config());
  let err = pipeline.run_extract(extract(&ten_lines())).await.unwrap_err();

  assert!(matches!(
    err,
    Error::Stage {
      attempted: PipelineStage::ProductLoaded,
      source: StageError::Decode { table: "dim_producto", .. },
      ..
    }
  ));
  assert_eq!(pipeline.stage(), PipelineStage::TimeLoaded);
  let counts = inner.table_counts().await.unwrap();
  assert_eq!((counts.time, counts.product), (4, 0));

  // Nothing half-loaded is left behind, so a clean rerun inserts every product.
  let report = Pipeline::new(inner.clone(), config())
    .run_extract(extract(&ten_lines()))
    .await
    .unwrap();
  let product = report.dimension(DimensionKind::Product).unwrap();
  assert_eq!((product.existing_before, product.inserted), (0, 3));
  assert_eq!(inner.table_counts().await.unwrap().facts, 8);
}

#[tokio::test]
async fn failed_fact_stage_reports_resolved_dimensions() {
  let inner = warehouse().await;
  let faulty = Faulty { fail_append: true, ..Faulty::new(inner.clone()) };

  let mut pipeline = Pipeline::new(faulty, config());
  let err = pipeline.run_extract(extract(&ten_lines())).await.unwrap_err();
  let Error::Stage { attempted, report, .. } = err else {
    panic!("expected a stage error");
  };
  assert_eq!(attempted, PipelineStage::FactLoaded);
  assert_eq!(pipeline.stage(), PipelineStage::ReasonLoaded);
  assert_eq!(report.final_stage, PipelineStage::ReasonLoaded);
  assert_eq!(report.dimensions.len(), 4);
  assert_eq!(report.undefined_unit_prices, 2);
  assert_eq!(report.facts_inserted, 0);
  assert_eq!(inner.table_counts().await.unwrap().facts, 0);
}
