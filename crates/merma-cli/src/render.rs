//! Plain-text rendering of run reports and warehouse summaries.

use std::fmt::Write as _;

use merma_core::report::{DropReason, IntegrityReport, RunReport, TableCounts};
use merma_etl::profile::ExtractProfile;

/// How many dropped or rejected lines to list before summarising the rest.
const MAX_LISTED: usize = 20;

pub fn run_report(report: &RunReport) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "run {} ({})", report.run_id, report.source);
  let _ = writeln!(
    out,
    "  rows: {} read, {} accepted, {} dropped, {} malformed measures",
    report.rows_read,
    report.rows_accepted(),
    report.rows_dropped.len(),
    report.malformed_measures
  );

  for d in &report.dimensions {
    let _ = writeln!(
      out,
      "  {:<8} {:>6} candidates {:>6} existing {:>6} inserted {:>6} total",
      d.dimension.to_string(),
      d.candidates,
      d.existing_before,
      d.inserted,
      d.total_after
    );
  }

  let _ = writeln!(
    out,
    "  facts: {} inserted, {} already loaded, {} rejected, {} without unit price",
    report.facts_inserted,
    report.facts_already_loaded,
    report.rejections.len(),
    report.undefined_unit_prices
  );
  let _ = writeln!(out, "  stage: {}", report.final_stage);

  list(&mut out, "dropped", report.rows_dropped.iter().map(|d| (d.line, drop_reason(&d.reason))));
  list(
    &mut out,
    "rejected",
    report.rejections.iter().map(|r| {
      let missing: Vec<String> = r.missing.iter().map(ToString::to_string).collect();
      (r.line, format!("unresolved {}", missing.join(", ")))
    }),
  );
  out
}

pub fn profile(p: &ExtractProfile) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "extract {}", p.source);
  let _ = writeln!(
    out,
    "  rows: {} read, {} accepted, {} dropped, {} malformed measures",
    p.rows_read,
    p.rows_accepted,
    p.rows_dropped.len(),
    p.malformed_measures
  );
  for (kind, n) in &p.distinct_keys {
    let _ = writeln!(out, "  {:<8} {n:>6} distinct keys", kind.to_string());
  }
  list(&mut out, "dropped", p.rows_dropped.iter().map(|d| (d.line, drop_reason(&d.reason))));
  out
}

pub fn stats(counts: &TableCounts, integrity: &IntegrityReport) -> String {
  let mut out = String::new();
  for (table, n) in [
    ("dim_tiempo", counts.time),
    ("dim_producto", counts.product),
    ("dim_tienda", counts.store),
    ("dim_motivo", counts.reason),
    ("fact_merma", counts.facts),
  ] {
    let _ = writeln!(out, "{table:<14} {n:>8}");
  }
  if integrity.is_clean() {
    let _ = writeln!(out, "integrity: ok");
  } else {
    let _ = writeln!(
      out,
      "integrity: {} orphaned facts, {} duplicated natural keys",
      integrity.orphaned_facts, integrity.duplicate_natural_keys
    );
  }
  out
}

fn drop_reason(reason: &DropReason) -> String {
  match reason {
    DropReason::MissingDate => "missing date".to_string(),
    DropReason::InvalidDate(raw) => format!("invalid date {raw:?}"),
    DropReason::MalformedRecord(detail) => format!("malformed record: {detail}"),
  }
}

fn list(out: &mut String, label: &str, items: impl ExactSizeIterator<Item = (u64, String)>) {
  let total = items.len();
  for (line, detail) in items.take(MAX_LISTED) {
    let _ = writeln!(out, "  {label} line {line}: {detail}");
  }
  if total > MAX_LISTED {
    let _ = writeln!(out, "  … {} more {label}", total - MAX_LISTED);
  }
}
