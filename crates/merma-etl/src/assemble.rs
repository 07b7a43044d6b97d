//! The Fact Assembler.
//!
//! Joins each working row to its four surrogate keys and derives the unit
//! price. A row missing any key is rejected, never inserted with a null
//! foreign key.

use std::collections::HashMap;

use merma_core::{
  dimension::{DimensionKind, SurrogateKey},
  extract::ExtractRow,
  fact::{FactRow, content_fields, fingerprint},
  measure::UnitPrice,
  report::Rejection,
};

/// Per-row surrogate keys for each dimension, aligned with the working rows.
#[derive(Debug, Clone, Default)]
pub struct ResolvedKeys {
  pub time:    Vec<Option<SurrogateKey>>,
  pub product: Vec<Option<SurrogateKey>>,
  pub store:   Vec<Option<SurrogateKey>>,
  pub reason:  Vec<Option<SurrogateKey>>,
}

impl ResolvedKeys {
  fn at(&self, idx: usize) -> [(DimensionKind, Option<SurrogateKey>); 4] {
    let get = |keys: &[Option<SurrogateKey>]| keys.get(idx).copied().flatten();
    [
      (DimensionKind::Time, get(&self.time)),
      (DimensionKind::Product, get(&self.product)),
      (DimensionKind::Store, get(&self.store)),
      (DimensionKind::Reason, get(&self.reason)),
    ]
  }
}

#[derive(Debug, Clone, Default)]
pub struct Assembly {
  pub facts:                 Vec<FactRow>,
  pub rejections:            Vec<Rejection>,
  /// Facts whose unit price is undefined (zero or missing quantity).
  pub undefined_unit_prices: usize,
}

/// Build one fact per fully-resolved row of `rows`.
pub fn assemble(rows: &[ExtractRow], keys: &ResolvedKeys) -> Assembly {
  let fingerprints = fingerprints(rows);
  let mut assembly = Assembly::default();

  for (idx, (row, fingerprint)) in rows.iter().zip(fingerprints).enumerate() {
    let resolved = keys.at(idx);
    let missing: Vec<DimensionKind> = resolved
      .iter()
      .filter(|(_, key)| key.is_none())
      .map(|(kind, _)| *kind)
      .collect();

    let [time, product, store, reason] = resolved.map(|(_, key)| key);
    let (Some(time), Some(product), Some(store), Some(reason)) = (time, product, store, reason)
    else {
      tracing::warn!(line = row.line, ?missing, "row rejected: unresolved dimensions");
      assembly.rejections.push(Rejection { line: row.line, missing });
      continue;
    };

    let unit_price = UnitPrice::derive(row.quantity, row.amount);
    if !unit_price.is_defined() {
      assembly.undefined_unit_prices += 1;
    }

    assembly.facts.push(FactRow {
      time,
      product,
      store,
      reason,
      quantity: row.quantity,
      amount: row.amount,
      unit_price,
      fingerprint,
    });
  }

  assembly
}

/// Fingerprint every row. Identical rows get consecutive occurrence
/// indexes, so each keeps its own fact.
fn fingerprints(rows: &[ExtractRow]) -> Vec<String> {
  let mut occurrences: HashMap<[String; 16], u32> = HashMap::new();
  rows
    .iter()
    .map(|row| {
      let seen = occurrences.entry(content_fields(row)).or_insert(0);
      let occurrence = *seen;
      *seen += 1;
      fingerprint(row, occurrence)
    })
    .collect()
}
