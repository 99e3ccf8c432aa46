use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lineitem_arrow::{init_tracing, split::split_row_file};
use lineitem_core::TableSchema;

/// Splits a pipe-delimited lineitem file into one raw binary file per column.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// The `lineitem.tbl` file to split
  input: PathBuf,
  /// Directory the `<column>.bin` files are written to, created when absent
  output: PathBuf,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let schema = TableSchema::lineitem();
  let summary = split_row_file(&args.input, &args.output, &schema)
    .with_context(|| format!("splitting {}", args.input.display()))?;

  for file in &summary.files {
    println!("Column written to {}", file.display());
  }
  println!("{} rows split into {} columns", summary.rows, summary.files.len());

  Ok(())
}
