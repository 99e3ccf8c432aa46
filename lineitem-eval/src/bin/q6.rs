use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use lineitem_arrow::{init_tracing, load::LoadOptions};
use lineitem_core::CodecKind;
use lineitem_eval::driver::{run, RunConfig};

/// Compresses a directory of lineitem column files, loads it back and runs TPC-H Q6 over it.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// Directory holding the splitter's `<column>.bin` files
  input: PathBuf,
  /// One of identity, lz4, snappy, zlib, zstd, deflate
  #[clap(default_value_t = CodecKind::Zlib)]
  codec: CodecKind,
  /// Columns decoded at once
  #[clap(long, default_value_t = 1)]
  threads: usize,
  /// Treat the input as already compressed with the codec and skip the compression step
  #[clap(long)]
  precompressed: bool,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let mut config = RunConfig::new(args.input, args.codec);
  config.load = LoadOptions::with_concurrency(args.threads);
  config.precompressed = args.precompressed;
  println!("{}", run(&config)?);

  Ok(())
}
