use merma_core::{dimension::SurrogateKey, report::RunReport, stage::PipelineStage};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("extract error: {0}")]
  Extract(#[from] merma_extract::Error),

  /// A stage failed. Every stage before `attempted` is committed and
  /// nothing of `attempted` is. `report` holds what the run had counted so
  /// far; its `final_stage` is the last committed stage.
  #[error("failed to reach {attempted}: {source}")]
  Stage {
    attempted: PipelineStage,
    #[source]
    source:    StageError,
    report:    Box<RunReport>,
  },

  #[error("pipeline is already at {0}; create a new pipeline for another run")]
  AlreadyRun(PipelineStage),

  #[error("illegal stage transition {from} -> {to}")]
  Transition { from: PipelineStage, to: PipelineStage },
}

/// Why a single stage could not commit.
#[derive(Debug, Error)]
pub enum StageError {
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{table}: stored row does not decode: {source}")]
  Decode {
    table:  &'static str,
    #[source]
    source: merma_core::Error,
  },

  #[error("{table}: natural key {key} is stored under both {first:?} and {second:?}")]
  AmbiguousNaturalKey {
    table:  &'static str,
    key:    String,
    first:  SurrogateKey,
    second: SurrogateKey,
  },
}

impl StageError {
  pub(crate) fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }
}
