use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use lineitem_arrow::{
  compress::{compress_directory, default_output_dir},
  init_tracing,
};
use lineitem_core::CodecKind;

/// Compresses every column file of a directory with one codec.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// Directory holding the splitter's `<column>.bin` files
  input: PathBuf,
  /// One of identity, lz4, snappy, zlib, zstd, deflate
  #[clap(default_value_t = CodecKind::Zlib)]
  codec: CodecKind,
  #[clap(long, short, help = "Output directory [default: <input>/<codec>_compressed_line_item]")]
  output: Option<PathBuf>,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let output = args
    .output
    .unwrap_or_else(|| default_output_dir(&args.input, args.codec));
  let summary = compress_directory(&args.input, args.codec, &output)?;

  println!(
    "Compressed {} files with {}: {} -> {} bytes (ratio {:.3})",
    summary.files,
    args.codec,
    summary.input_bytes,
    summary.output_bytes,
    summary.ratio()
  );

  Ok(())
}
