//! What a run did, row by row where it matters.
//!
//! Row-level problems never abort a run; they are counted here so the caller
//! can see every line that did not become a fact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{dimension::DimensionKind, stage::PipelineStage};

/// Why an extract line was excluded before dimension resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
  MissingDate,
  InvalidDate(String),
  MalformedRecord(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
  pub line:   u64,
  pub reason: DropReason,
}

/// Outcome of one dimension resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionReport {
  pub dimension:       DimensionKind,
  /// Distinct natural keys in the working rows.
  pub candidates:      usize,
  /// Rows in the table before this run touched it.
  pub existing_before: usize,
  pub inserted:        usize,
  pub total_after:     usize,
}

/// A working row that reached fact assembly without all four surrogate keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
  pub line:    u64,
  pub missing: Vec<DimensionKind>,
}

/// Row counts of the five warehouse tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
  pub time:    u64,
  pub product: u64,
  pub store:   u64,
  pub reason:  u64,
  pub facts:   u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id:                Uuid,
  /// Human-readable name of the extract (usually its path).
  pub source:                String,
  /// Data lines seen, including dropped ones.
  pub rows_read:             usize,
  pub rows_dropped:          Vec<DroppedRow>,
  pub malformed_measures:    usize,
  pub dimensions:            Vec<DimensionReport>,
  pub facts_inserted:        usize,
  pub facts_already_loaded:  usize,
  pub undefined_unit_prices: usize,
  pub rejections:            Vec<Rejection>,
  pub final_stage:           PipelineStage,
}

impl RunReport {
  pub fn new(run_id: Uuid, source: impl Into<String>) -> Self {
    Self {
      run_id,
      source: source.into(),
      rows_read: 0,
      rows_dropped: Vec::new(),
      malformed_measures: 0,
      dimensions: Vec::new(),
      facts_inserted: 0,
      facts_already_loaded: 0,
      undefined_unit_prices: 0,
      rejections: Vec::new(),
      final_stage: PipelineStage::Bootstrapped,
    }
  }

  /// Rows that flowed into dimension resolution.
  pub fn rows_accepted(&self) -> usize {
    self.rows_read.saturating_sub(self.rows_dropped.len())
  }

  pub fn dimension(&self, kind: DimensionKind) -> Option<&DimensionReport> {
    self.dimensions.iter().find(|d| d.dimension == kind)
  }
}

/// Consistency checks over a loaded warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
  /// Fact rows with at least one foreign key that matches no dimension row.
  pub orphaned_facts:         u64,
  /// Natural keys stored more than once, summed over the four dimensions.
  pub duplicate_natural_keys: u64,
}

impl IntegrityReport {
  pub fn is_clean(&self) -> bool { self.orphaned_facts == 0 && self.duplicate_natural_keys == 0 }
}
