//! The Pipeline Orchestrator.

use merma_core::{
  dimension::{
    Dimension, ProductDimension, ReasonDimension, StoreDimension, SurrogateKey,
    TimeDimension,
  },
  extract::ExtractRow,
  fact::FactRow,
  report::RunReport,
  stage::PipelineStage,
  warehouse::Warehouse,
};
use merma_extract::{Extract, ExtractOptions};
use serde::Deserialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
  Error, Result, StageError,
  assemble::{ResolvedKeys, assemble},
  resolve::resolve,
};

/// Everything a run needs besides the warehouse.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
  pub extract: ExtractOptions,
}

/// One ETL run over one warehouse.
///
/// Stages advance strictly in order and each commits independently. When a
/// stage fails, none of its writes are kept, [`Pipeline::stage`] still
/// reports the last committed one, and a later run over the same extract
/// picks up where this one stopped: already-loaded keys and facts are
/// skipped.
pub struct Pipeline<W> {
  warehouse: W,
  config:    PipelineConfig,
  run_id:    Uuid,
  stage:     PipelineStage,
}

impl<W: Warehouse> Pipeline<W> {
  pub fn new(warehouse: W, config: PipelineConfig) -> Self {
    Self { warehouse, config, run_id: Uuid::new_v4(), stage: PipelineStage::Bootstrapped }
  }

  /// The last stage this run committed.
  pub fn stage(&self) -> PipelineStage { self.stage }

  pub fn run_id(&self) -> Uuid { self.run_id }

  pub fn into_warehouse(self) -> W { self.warehouse }

  /// Read the configured extract and load it.
  pub async fn run(&mut self) -> Result<RunReport> {
    let extract = merma_extract::read(&self.config.extract).await?;
    self.run_extract(extract).await
  }

  /// Load an extract that is already parsed.
  pub async fn run_extract(&mut self, extract: Extract) -> Result<RunReport> {
    if self.stage != PipelineStage::Bootstrapped {
      return Err(Error::AlreadyRun(self.stage));
    }

    let span = tracing::info_span!("etl_run", run_id = %self.run_id, source = %extract.source);
    self.load(extract).instrument(span).await
  }

  async fn load(&mut self, extract: Extract) -> Result<RunReport> {
    let mut report = RunReport::new(self.run_id, extract.source);
    report.rows_read = extract.rows_read;
    report.rows_dropped = extract.dropped;
    report.malformed_measures = extract.malformed_measures;
    let rows = extract.rows;

    tracing::info!(
      rows_read = report.rows_read,
      rows_dropped = report.rows_dropped.len(),
      "extract accepted"
    );

    let keys = ResolvedKeys {
      time:    self.load_dimension::<TimeDimension>(&rows, &mut report).await?,
      product: self.load_dimension::<ProductDimension>(&rows, &mut report).await?,
      store:   self.load_dimension::<StoreDimension>(&rows, &mut report).await?,
      reason:  self.load_dimension::<ReasonDimension>(&rows, &mut report).await?,
    };

    let assembly = assemble(&rows, &keys);
    report.rejections = assembly.rejections;
    report.undefined_unit_prices = assembly.undefined_unit_prices;

    let (inserted, already_loaded) = match self.append_new_facts(assembly.facts).await {
      Ok(counts) => counts,
      Err(source) => return Err(stage_failed(PipelineStage::FactLoaded, source, report)),
    };
    report.facts_inserted = inserted;
    report.facts_already_loaded = already_loaded;
    self.advance(PipelineStage::FactLoaded)?;
    report.final_stage = self.stage;

    tracing::info!(
      facts_inserted = report.facts_inserted,
      facts_already_loaded = report.facts_already_loaded,
      rejected = report.rejections.len(),
      undefined_unit_prices = report.undefined_unit_prices,
      "run complete"
    );
    Ok(report)
  }

  async fn load_dimension<D: Dimension>(
    &mut self,
    rows: &[ExtractRow],
    report: &mut RunReport,
  ) -> Result<Vec<Option<SurrogateKey>>> {
    let target = PipelineStage::after(D::TABLE.kind);
    let resolution = match resolve::<D, W>(&self.warehouse, rows).await {
      Ok(resolution) => resolution,
      Err(source) => return Err(stage_failed(target, source, report.clone())),
    };
    self.advance(target)?;
    report.dimensions.push(resolution.report);
    report.final_stage = self.stage;
    Ok(resolution.keys)
  }

  /// Append the facts not loaded by an earlier run. Returns
  /// `(inserted, already_loaded)`.
  async fn append_new_facts(
    &self,
    facts: Vec<FactRow>,
  ) -> Result<(usize, usize), StageError> {
    let loaded = self
      .warehouse
      .fact_fingerprints()
      .await
      .map_err(StageError::storage)?;
    let (already, fresh): (Vec<_>, Vec<_>) =
      facts.into_iter().partition(|f| loaded.contains(&f.fingerprint));

    let inserted = self
      .warehouse
      .append_facts(fresh)
      .await
      .map_err(StageError::storage)?;
    Ok((inserted, already.len()))
  }

  fn advance(&mut self, to: PipelineStage) -> Result<()> {
    if self.stage.next() != Some(to) {
      return Err(Error::Transition { from: self.stage, to });
    }
    tracing::debug!(from = %self.stage, to = %to, "stage committed");
    self.stage = to;
    Ok(())
  }
}

fn stage_failed(attempted: PipelineStage, source: StageError, report: RunReport) -> Error {
  tracing::error!(stage = %attempted, error = %source, "stage failed");
  Error::Stage { attempted, source, report: Box::new(report) }
}
