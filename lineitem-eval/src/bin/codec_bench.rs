use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use lineitem_arrow::init_tracing;
use lineitem_core::CodecKind;
use lineitem_eval::micro::{run_codec_benchmark, DEFAULT_CHUNK_SIZE};

/// Compresses and decompresses one file in fixed-size chunks with each codec and reports size
/// and throughput.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// File to benchmark, typically one column file
  file: PathBuf,
  /// Codec to run; repeat for several. Defaults to every real codec
  #[clap(long)]
  codec: Vec<CodecKind>,
  #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE)]
  chunk_size: usize,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();
  let data = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

  let codecs = if args.codec.is_empty() {
    CodecKind::ALL
      .into_iter()
      .filter(|codec| *codec != CodecKind::Identity)
      .collect()
  } else {
    args.codec
  };

  for codec in codecs {
    let result = run_codec_benchmark(&data, codec, args.chunk_size)?;
    println!("{result}\n");
  }

  Ok(())
}
