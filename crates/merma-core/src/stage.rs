//! Pipeline stages.
//!
//! A run moves strictly forward through these states. Each transition is
//! backed by exactly one committed write (a dimension table or the fact
//! table), so the stage a failed run stopped at tells the caller which
//! tables were updated.

use serde::{Deserialize, Serialize};

use crate::dimension::DimensionKind;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
  /// Schema exists; nothing written by this run yet.
  Bootstrapped,
  TimeLoaded,
  ProductLoaded,
  StoreLoaded,
  ReasonLoaded,
  /// Terminal.
  FactLoaded,
}

impl PipelineStage {
  /// The only legal successor, or `None` once terminal.
  pub fn next(self) -> Option<Self> {
    match self {
      Self::Bootstrapped => Some(Self::TimeLoaded),
      Self::TimeLoaded => Some(Self::ProductLoaded),
      Self::ProductLoaded => Some(Self::StoreLoaded),
      Self::StoreLoaded => Some(Self::ReasonLoaded),
      Self::ReasonLoaded => Some(Self::FactLoaded),
      Self::FactLoaded => None,
    }
  }

  pub fn is_terminal(self) -> bool { self == Self::FactLoaded }

  /// The stage reached once `kind`'s dimension load commits.
  pub fn after(kind: DimensionKind) -> Self {
    match kind {
      DimensionKind::Time => Self::TimeLoaded,
      DimensionKind::Product => Self::ProductLoaded,
      DimensionKind::Store => Self::StoreLoaded,
      DimensionKind::Reason => Self::ReasonLoaded,
    }
  }
}
