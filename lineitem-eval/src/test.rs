use std::{fs, path::Path, time::Duration};

use arrow::{
  array::{AsArray, RecordBatch},
  datatypes::{Float32Type, Int32Type, TimestampSecondType},
};
use chrono::NaiveDate;
use lineitem_arrow::{
  compress::{compress_directory, default_output_dir},
  load::{load_columns, LoadOptions},
  split::split_row_file,
};
use lineitem_core::{
  encoding::{date_seconds, trim_padding},
  CodecKind, Error, TableSchema,
};
use rstest::rstest;

use crate::{
  query::{scan, Q6Query},
  report::Stage,
  util::{gen_lineitem_rows, gen_lineitem_table},
};

const THREE_ROWS: &str = "\
1|100|10|1|10|1234.5|0.06|0.02|N|O|1994-03-01|1994-02-01|1994-03-10|NONE|AIR|first|
1|101|11|2|5|2000.25|0.04|0.01|R|F|1994-06-01|1994-05-01|1994-06-02|COLLECT COD|RAIL|second|
2|102|12|1|10|3000|0.06|0.00|A|F|1995-02-01|1995-01-01|1995-02-03|NONE|SHIP|third|
";

/// Split `rows` into `<dir>/columns`, compress it with `codec` and load it back as a table.
fn pipeline(
  dir: &Path,
  rows: &str,
  codec: CodecKind,
  concurrency: usize,
) -> (RecordBatch, Duration) {
  let input = dir.join("lineitem.tbl");
  fs::write(&input, rows).unwrap();
  let columns = dir.join("columns");
  split_row_file(&input, &columns, &TableSchema::lineitem()).unwrap();

  let compressed = default_output_dir(&columns, codec);
  compress_directory(&columns, codec, &compressed).unwrap();
  let loaded = load_columns(
    &compressed,
    &TableSchema::lineitem(),
    codec,
    &LoadOptions::with_concurrency(concurrency),
  )
  .unwrap();
  (
    loaded.table(&TableSchema::lineitem()).unwrap(),
    loaded.decompression,
  )
}

#[rstest]
#[case(CodecKind::Lz4)]
#[case(CodecKind::Snappy)]
#[case(CodecKind::Zlib)]
#[case(CodecKind::Zstd)]
#[case(CodecKind::Deflate)]
fn test_three_row_scenario(#[case] codec: CodecKind) {
  let dir = tempfile::tempdir().unwrap();
  let (table, decompression) = pipeline(dir.path(), THREE_ROWS, codec, 1);
  assert_eq!(table.num_rows(), 3);

  let outcome = Q6Query::default().execute(&table, decompression).unwrap();
  assert_eq!(outcome.selected, 1);
  let expected = f64::from(1234.5f32) * f64::from(0.06f32);
  assert!((outcome.revenue - expected).abs() < 1e-9);
}

#[test]
fn test_identity_load_reads_splitter_output() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("lineitem.tbl");
  fs::write(&input, THREE_ROWS).unwrap();
  let columns = dir.path().join("columns");
  split_row_file(&input, &columns, &TableSchema::lineitem()).unwrap();

  let loaded = load_columns(
    &columns,
    &TableSchema::lineitem(),
    CodecKind::Identity,
    &LoadOptions::default(),
  )
  .unwrap();
  assert_eq!(loaded.columns.len(), 16);

  let table = loaded.table(&TableSchema::lineitem()).unwrap();
  let quantity = table
    .column_by_name("l_quantity")
    .unwrap()
    .as_primitive::<Int32Type>();
  assert_eq!(quantity.values().to_vec(), vec![10, 5, 10]);
  let ship = table
    .column_by_name("l_shipdate")
    .unwrap()
    .as_primitive::<TimestampSecondType>();
  assert_eq!(
    ship.value(0),
    date_seconds(NaiveDate::from_ymd_opt(1994, 3, 1).unwrap())
  );
  let mode = table
    .column_by_name("l_shipmode")
    .unwrap()
    .as_fixed_size_binary();
  assert_eq!(mode.value_length(), 10);
  assert_eq!(trim_padding(mode.value(2)), b"SHIP");
}

#[rstest]
#[case(100)]
#[case(1000)]
#[case(10000)]
fn test_scan_matches_reference(#[case] size: usize) {
  let table = gen_lineitem_table(size, size as u64).unwrap();
  let query = Q6Query::default();
  let mask = scan(&table, &query.filter()).unwrap();

  let ship = table
    .column_by_name(Q6Query::SHIP_DATE)
    .unwrap()
    .as_primitive::<TimestampSecondType>();
  let discount = table
    .column_by_name(Q6Query::DISCOUNT)
    .unwrap()
    .as_primitive::<Float32Type>();
  let quantity = table
    .column_by_name(Q6Query::QUANTITY)
    .unwrap()
    .as_primitive::<Int32Type>();
  let price = table
    .column_by_name(Q6Query::EXTENDED_PRICE)
    .unwrap()
    .as_primitive::<Float32Type>();

  let start = date_seconds(query.ship_date_start);
  let end = date_seconds(query.ship_date_end);
  let mut expected_revenue = 0.0f64;
  for row in 0..size {
    let selected = ship.value(row) >= start
      && ship.value(row) < end
      && discount.value(row) >= query.discount_lo
      && discount.value(row) <= query.discount_hi
      && quantity.value(row) < query.quantity_below;
    assert_eq!(mask.value(row), selected, "row {row}");
    if selected {
      expected_revenue += f64::from(price.value(row)) * f64::from(discount.value(row));
    }
  }

  let outcome = query.execute(&table, Duration::ZERO).unwrap();
  assert_eq!(outcome.selected, mask.true_count());
  assert!((outcome.revenue - expected_revenue).abs() <= 1e-6 * expected_revenue.max(1.0));
}

#[test]
fn test_concurrent_pipeline_matches_sequential() {
  let rows = gen_lineitem_rows(3000, 11);
  let sequential = tempfile::tempdir().unwrap();
  let concurrent = tempfile::tempdir().unwrap();
  let (seq_table, _) = pipeline(sequential.path(), &rows, CodecKind::Zstd, 1);
  let (par_table, _) = pipeline(concurrent.path(), &rows, CodecKind::Zstd, 4);
  assert_eq!(seq_table, par_table);

  let query = Q6Query::default();
  let seq = query.execute(&seq_table, Duration::ZERO).unwrap();
  let par = query.execute(&par_table, Duration::ZERO).unwrap();
  assert_eq!(seq.revenue, par.revenue);
}

#[test]
fn test_missing_aggregation_column() {
  let dir = tempfile::tempdir().unwrap();
  let input = dir.path().join("lineitem.tbl");
  fs::write(&input, THREE_ROWS).unwrap();
  let columns = dir.path().join("columns");
  split_row_file(&input, &columns, &TableSchema::lineitem()).unwrap();
  fs::remove_file(columns.join("l_extendedprice.bin")).unwrap();

  let compressed = default_output_dir(&columns, CodecKind::Lz4);
  compress_directory(&columns, CodecKind::Lz4, &compressed).unwrap();
  let loaded = load_columns(
    &compressed,
    &TableSchema::lineitem(),
    CodecKind::Lz4,
    &LoadOptions::default(),
  )
  .unwrap();
  let table = loaded.table(&TableSchema::lineitem()).unwrap();

  let err = Q6Query::default()
    .execute(&table, loaded.decompression)
    .unwrap_err();
  assert!(matches!(
    err.downcast_ref::<Error>(),
    Some(Error::MissingColumn { column }) if column == "l_extendedprice"
  ));
}

#[test]
fn test_timing_covers_every_stage() {
  let table = gen_lineitem_table(500, 3).unwrap();
  let outcome = Q6Query::default()
    .execute(&table, Duration::from_millis(20))
    .unwrap();

  let stages: Vec<Stage> = outcome.timing.stages().iter().map(|(s, _)| *s).collect();
  assert_eq!(stages, Stage::ALL.to_vec());
  let sum: Duration = Stage::ALL
    .iter()
    .map(|stage| outcome.timing.get(*stage).unwrap())
    .sum();
  assert_eq!(outcome.timing.total(), sum);
  assert!(outcome.timing.total() >= Duration::from_millis(20));
}
