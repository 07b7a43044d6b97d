//! Dry-run summary of an extract: what a run would resolve, without
//! touching a warehouse.

use merma_core::{
  dimension::{
    ALL_TABLES, DimensionKind, ProductDimension, ReasonDimension, StoreDimension,
    TimeDimension,
  },
  report::DroppedRow,
};
use merma_extract::Extract;
use serde::Serialize;

use crate::resolve::distinct_keys;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractProfile {
  pub source:             String,
  pub rows_read:          usize,
  pub rows_accepted:      usize,
  pub rows_dropped:       Vec<DroppedRow>,
  pub malformed_measures: usize,
  /// Distinct natural keys per dimension, in load order.
  pub distinct_keys:      Vec<(DimensionKind, usize)>,
}

pub fn profile(extract: &Extract) -> ExtractProfile {
  let rows = &extract.rows;
  let count = |kind: DimensionKind| -> usize {
    match kind {
      DimensionKind::Time => distinct_keys::<TimeDimension>(rows).len(),
      DimensionKind::Product => distinct_keys::<ProductDimension>(rows).len(),
      DimensionKind::Store => distinct_keys::<StoreDimension>(rows).len(),
      DimensionKind::Reason => distinct_keys::<ReasonDimension>(rows).len(),
    }
  };

  ExtractProfile {
    source:             extract.source.clone(),
    rows_read:          extract.rows_read,
    rows_accepted:      rows.len(),
    rows_dropped:       extract.dropped.clone(),
    malformed_measures: extract.malformed_measures,
    distinct_keys:      ALL_TABLES.iter().map(|t| (t.kind, count(t.kind))).collect(),
  }
}

#[cfg(test)]
mod tests {
  use merma_extract::{ExtractFormat, parse};

  use super::*;

  #[test]
  fn profile_counts_distinct_keys_per_dimension() {
    let csv = "\
fecha,codigo_producto,descripcion,categoria,abastecimiento,linea,seccion,negocio,tienda,comuna,region,zonal,motivo,ubicacion_motivo,merma_unidad_p,merma_monto_p
2024-01-01,P1,Leche,Lácteos,CD,Frescos,Refri,Super,Centro,Stgo,RM,Norte,Robo,Sala,1,100
2024-01-01,P2,Pan,Panadería,Local,Frescos,Pan,Super,Centro,Stgo,RM,Norte,Robo,Sala,2,300
2024-01-02,P1,Leche,Lácteos,CD,Frescos,Refri,Super,Norte,Stgo,RM,Norte,Robo,Sala,1,100
,P1,Leche,Lácteos,CD,Frescos,Refri,Super,Centro,Stgo,RM,Norte,Robo,Sala,1,100
";
    let extract = parse(csv.as_bytes(), "inline", &ExtractFormat::default()).unwrap();
    let p = profile(&extract);

    assert_eq!((p.rows_read, p.rows_accepted, p.rows_dropped.len()), (4, 3, 1));
    assert_eq!(p.distinct_keys, vec![
      (DimensionKind::Time, 2),
      (DimensionKind::Product, 2),
      (DimensionKind::Store, 2),
      (DimensionKind::Reason, 2),
    ]);
  }
}
