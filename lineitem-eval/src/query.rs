//! A Q6-style query over a loaded table, executed as three timed stages:
//! 1. scan: evaluate a conjunction of comparison predicates into a selection mask
//! 2. select: materialize the two projected columns for the selected rows
//! 3. sum: add up the element-wise products of the projected columns
//!
//! TPC-H Q6 is the default instance:
//!
//! ```sql
//! SELECT sum(l_extendedprice * l_discount) AS revenue
//! FROM lineitem
//! WHERE l_shipdate >= date '1994-01-01'
//!   AND l_shipdate < date '1995-01-01'
//!   AND l_discount BETWEEN 0.05 AND 0.07
//!   AND l_quantity < 24;
//! ```

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use arrow::{
  array::{
    Array, ArrayRef, AsArray, BooleanArray, FixedSizeBinaryArray, Float32Array, Int32Array,
    RecordBatch, Scalar, TimestampSecondArray,
  },
  compute::{and, filter, kernels::cmp},
  datatypes::{DataType, Float32Type, TimeUnit},
};
use chrono::NaiveDate;
use lineitem_core::{encoding::date_seconds, Error};
use tracing::debug;

use crate::report::{Stage, TimingRecord};

/// A constant a column is compared against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
  Int32(i32),
  Float32(f32),
  /// Seconds since the Unix epoch.
  Timestamp(i64),
  Char(u8),
}

impl Literal {
  pub fn date(date: NaiveDate) -> Self {
    Literal::Timestamp(date_seconds(date))
  }

  /// Arrow type a column must have to be compared with this literal.
  pub fn data_type(self) -> DataType {
    match self {
      Literal::Int32(_) => DataType::Int32,
      Literal::Float32(_) => DataType::Float32,
      Literal::Timestamp(_) => DataType::Timestamp(TimeUnit::Second, None),
      Literal::Char(_) => DataType::FixedSizeBinary(1),
    }
  }

  fn scalar(self) -> Scalar<ArrayRef> {
    let array: ArrayRef = match self {
      Literal::Int32(v) => Arc::new(Int32Array::from(vec![v])),
      Literal::Float32(v) => Arc::new(Float32Array::from(vec![v])),
      Literal::Timestamp(v) => Arc::new(TimestampSecondArray::from(vec![v])),
      Literal::Char(v) => Arc::new(FixedSizeBinaryArray::from(vec![[v].as_slice()])),
    };
    Scalar::new(array)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Lt,
  LtEq,
  Gt,
  GtEq,
  Eq,
}

/// `column <op> literal`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
  pub column: String,
  pub op: CompareOp,
  pub literal: Literal,
}

impl Predicate {
  pub fn new(column: impl Into<String>, op: CompareOp, literal: Literal) -> Self {
    Self {
      column: column.into(),
      op,
      literal,
    }
  }

  pub fn evaluate(&self, table: &RecordBatch) -> Result<BooleanArray> {
    let values = column(table, &self.column)?;
    let expected = self.literal.data_type();
    if values.data_type() != &expected {
      return Err(
        Error::ColumnType {
          column: self.column.clone(),
          expected: expected.to_string(),
        }
        .into(),
      );
    }

    let scalar = self.literal.scalar();
    let mask = match self.op {
      CompareOp::Lt => cmp::lt(values, &scalar),
      CompareOp::LtEq => cmp::lt_eq(values, &scalar),
      CompareOp::Gt => cmp::gt(values, &scalar),
      CompareOp::GtEq => cmp::gt_eq(values, &scalar),
      CompareOp::Eq => cmp::eq(values, &scalar),
    }
    .with_context(|| format!("evaluating predicate on {}", self.column))?;
    Ok(mask)
  }
}

/// A conjunction of predicates. The empty filter selects every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
  pub predicates: Vec<Predicate>,
}

impl FilterSpec {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn and(mut self, predicate: Predicate) -> Self {
    self.predicates.push(predicate);
    self
  }

  /// `lo <= column < hi`
  pub fn half_open(self, column: &str, lo: Literal, hi: Literal) -> Self {
    self
      .and(Predicate::new(column, CompareOp::GtEq, lo))
      .and(Predicate::new(column, CompareOp::Lt, hi))
  }

  /// `lo <= column <= hi`
  pub fn between(self, column: &str, lo: Literal, hi: Literal) -> Self {
    self
      .and(Predicate::new(column, CompareOp::GtEq, lo))
      .and(Predicate::new(column, CompareOp::LtEq, hi))
  }
}

/// Parameters of the Q6 revenue query.
#[derive(Debug, Clone, PartialEq)]
pub struct Q6Query {
  pub ship_date_start: NaiveDate,
  /// Exclusive.
  pub ship_date_end: NaiveDate,
  /// Inclusive bounds, compared in single precision like the stored column.
  pub discount_lo: f32,
  pub discount_hi: f32,
  /// Exclusive.
  pub quantity_below: i32,
}

impl Default for Q6Query {
  fn default() -> Self {
    Self {
      ship_date_start: NaiveDate::from_ymd_opt(1994, 1, 1).unwrap_or_default(),
      ship_date_end: NaiveDate::from_ymd_opt(1995, 1, 1).unwrap_or_default(),
      discount_lo: 0.05,
      discount_hi: 0.07,
      quantity_below: 24,
    }
  }
}

impl Q6Query {
  pub const SHIP_DATE: &'static str = "l_shipdate";
  pub const DISCOUNT: &'static str = "l_discount";
  pub const QUANTITY: &'static str = "l_quantity";
  pub const EXTENDED_PRICE: &'static str = "l_extendedprice";

  pub fn filter(&self) -> FilterSpec {
    FilterSpec::new()
      .half_open(
        Self::SHIP_DATE,
        Literal::date(self.ship_date_start),
        Literal::date(self.ship_date_end),
      )
      .between(
        Self::DISCOUNT,
        Literal::Float32(self.discount_lo),
        Literal::Float32(self.discount_hi),
      )
      .and(Predicate::new(
        Self::QUANTITY,
        CompareOp::Lt,
        Literal::Int32(self.quantity_below),
      ))
  }

  pub fn required_columns(&self) -> [&'static str; 4] {
    [
      Self::SHIP_DATE,
      Self::DISCOUNT,
      Self::QUANTITY,
      Self::EXTENDED_PRICE,
    ]
  }

  pub fn execute(&self, table: &RecordBatch, decompression: Duration) -> Result<QueryOutcome> {
    for name in self.required_columns() {
      column(table, name)?;
    }
    execute(
      table,
      &self.filter(),
      Self::EXTENDED_PRICE,
      Self::DISCOUNT,
      decompression,
    )
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
  /// Sum of products over the selected rows.
  pub revenue: f64,
  pub selected: usize,
  pub timing: TimingRecord,
}

/// Look up a column, failing with [`Error::MissingColumn`] when the table lacks it.
pub fn column<'a>(table: &'a RecordBatch, name: &str) -> lineitem_core::Result<&'a ArrayRef> {
  table
    .column_by_name(name)
    .ok_or_else(|| Error::missing_column(name))
}

/// Evaluate `filter` over `table` into a selection mask with one entry per row.
pub fn scan(table: &RecordBatch, filter: &FilterSpec) -> Result<BooleanArray> {
  let mut mask: Option<BooleanArray> = None;
  for predicate in &filter.predicates {
    let matched = predicate.evaluate(table)?;
    mask = Some(match mask {
      None => matched,
      Some(acc) => and(&acc, &matched).context("combining predicates")?,
    });
  }
  Ok(mask.unwrap_or_else(|| BooleanArray::from(vec![true; table.num_rows()])))
}

/// Materialize `multiplicand` and `multiplier` restricted to the rows set in `mask`.
pub fn select(
  table: &RecordBatch,
  mask: &BooleanArray,
  multiplicand: &str,
  multiplier: &str,
) -> Result<(Float32Array, Float32Array)> {
  let lhs = filter(float_column(table, multiplicand)?, mask)
    .with_context(|| format!("selecting {multiplicand}"))?;
  let rhs = filter(float_column(table, multiplier)?, mask)
    .with_context(|| format!("selecting {multiplier}"))?;
  Ok((
    lhs.as_primitive::<Float32Type>().clone(),
    rhs.as_primitive::<Float32Type>().clone(),
  ))
}

/// Sum of `lhs[i] * rhs[i]`, accumulated in double precision.
pub fn sum_products(lhs: &Float32Array, rhs: &Float32Array) -> f64 {
  lhs
    .values()
    .iter()
    .zip(rhs.values().iter())
    .map(|(&a, &b)| f64::from(a) * f64::from(b))
    .sum()
}

/// Run scan, select and sum in order, recording each stage after `decompression`.
pub fn execute(
  table: &RecordBatch,
  filter: &FilterSpec,
  multiplicand: &str,
  multiplier: &str,
  decompression: Duration,
) -> Result<QueryOutcome> {
  let mut timing = TimingRecord::new();
  timing.record(Stage::Decompression, decompression);

  let mask = timing.time(Stage::Scan, || scan(table, filter))?;
  let (lhs, rhs) = timing.time(Stage::Select, || {
    select(table, &mask, multiplicand, multiplier)
  })?;
  let revenue = timing.time(Stage::Sum, || sum_products(&lhs, &rhs));

  let selected = mask.true_count();
  debug!(rows = table.num_rows(), selected, revenue, "query executed");
  Ok(QueryOutcome {
    revenue,
    selected,
    timing,
  })
}

fn float_column<'a>(table: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
  let values = column(table, name)?;
  values.as_primitive_opt::<Float32Type>().ok_or_else(|| {
    Error::ColumnType {
      column: name.to_string(),
      expected: DataType::Float32.to_string(),
    }
    .into()
  })
}
