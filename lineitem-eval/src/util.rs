use std::{collections::BTreeMap, fmt::Write, time::Duration};

use anyhow::Result;
use arrow::array::RecordBatch;
use chrono::{Days, NaiveDate};
use lineitem_arrow::{
  load::{decode_column, LoadedColumns},
  split::split_rows,
};
use lineitem_core::{encoding::DATE_FORMAT, TableSchema};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

const RETURN_FLAGS: [&str; 3] = ["R", "A", "N"];
const LINE_STATUS: [&str; 2] = ["O", "F"];
const SHIP_INSTRUCT: [&str; 4] = [
  "DELIVER IN PERSON",
  "COLLECT COD",
  "NONE",
  "TAKE BACK RETURN",
];
const SHIP_MODES: [&str; 7] = ["REG AIR", "AIR", "RAIL", "SHIP", "TRUCK", "MAIL", "FOB"];
const WORDS: [&str; 8] = [
  "furiously", "slyly", "final", "deposits", "carefully", "ironic", "packages", "regular",
];

/// `count` pipe-delimited lineitem rows in dbgen's `.tbl` layout, reproducible from `seed`.
///
/// Ship dates span 1992 through 1998 so roughly a seventh of the rows fall in any one year, and
/// discounts are drawn from 0.00..=0.10 in steps of 0.01.
pub fn gen_lineitem_rows(count: usize, seed: u64) -> String {
  let mut rng = SmallRng::seed_from_u64(seed);
  let epoch = NaiveDate::from_ymd_opt(1992, 1, 1).unwrap_or_default();

  let mut rows = String::with_capacity(count * 128);
  for idx in 0..count {
    let quantity: u32 = rng.gen_range(1..=50);
    let z: f64 = StandardNormal.sample(&mut rng);
    let extended_price = (38_000.0 + 23_000.0 * z).max(900.0);
    let discount = rng.gen_range(0..=10) as f64 / 100.0;
    let tax = rng.gen_range(0..=8) as f64 / 100.0;
    let ship = epoch + Days::new(rng.gen_range(0..2557));
    let commit = ship + Days::new(rng.gen_range(0..90));
    let receipt = ship + Days::new(rng.gen_range(1..=30));
    let comment: Vec<&str> = (0..rng.gen_range(2..6))
      .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
      .collect();

    let _ = writeln!(
      rows,
      "{}|{}|{}|{}|{}|{:.2}|{:.2}|{:.2}|{}|{}|{}|{}|{}|{}|{}|{}|",
      idx / 4 + 1,
      rng.gen_range(1..200_000),
      rng.gen_range(1..10_000),
      idx % 4 + 1,
      quantity,
      extended_price,
      discount,
      tax,
      RETURN_FLAGS[rng.gen_range(0..RETURN_FLAGS.len())],
      LINE_STATUS[rng.gen_range(0..LINE_STATUS.len())],
      ship.format(DATE_FORMAT),
      commit.format(DATE_FORMAT),
      receipt.format(DATE_FORMAT),
      SHIP_INSTRUCT[rng.gen_range(0..SHIP_INSTRUCT.len())],
      SHIP_MODES[rng.gen_range(0..SHIP_MODES.len())],
      comment.join(" "),
    );
  }
  rows
}

/// Build an in-memory lineitem table from generated rows, bypassing the filesystem.
pub fn gen_lineitem_table(count: usize, seed: u64) -> Result<RecordBatch> {
  let schema = TableSchema::lineitem();
  let buffers = split_rows(gen_lineitem_rows(count, seed).as_bytes(), &schema)?;

  let mut columns = BTreeMap::new();
  for def in schema.columns() {
    let raw = buffers.column(&def.name).unwrap_or_default().to_vec();
    columns.insert(def.name.clone(), decode_column(def, raw)?);
  }
  LoadedColumns {
    columns,
    decompression: Duration::ZERO,
  }
  .table(&schema)
}
