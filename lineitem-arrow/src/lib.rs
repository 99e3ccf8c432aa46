//! This crate connects the lineitem column files with Apache Arrow. It has responsibilities for:
//! 1. Splitting a pipe-delimited row file into one raw `.bin` file per column ([`split`])
//! 2. Compressing a directory of column files with a chosen codec ([`compress`])
//! 3. Loading compressed column files back into typed Arrow arrays, sequentially or on a
//!    fixed-size worker pool ([`load`])
//! 4. Providing the `split_lineitem` and `compress_lineitem` binaries for the offline steps

pub mod compress;
pub mod load;
pub mod split;

use arrow::datatypes::{DataType, TimeUnit};
use lineitem_core::LogicalType;

/// Arrow type a column of `logical_type` is materialized as.
pub fn arrow_type(logical_type: LogicalType) -> DataType {
  match logical_type {
    LogicalType::Int32 => DataType::Int32,
    LogicalType::Float32 => DataType::Float32,
    LogicalType::Timestamp32 => DataType::Timestamp(TimeUnit::Second, None),
    LogicalType::FixedString(width) => DataType::FixedSizeBinary(width as i32),
  }
}

/// Install the stderr log subscriber shared by the binaries. Standard output is left to the
/// reports.
pub fn init_tracing() {
  use tracing_subscriber::EnvFilter;

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}
