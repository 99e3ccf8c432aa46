//! Chunked codec micro-benchmark: compress a buffer chunk by chunk, decompress it again and
//! report sizes and throughput.

use std::{
  fmt,
  time::{Duration, Instant},
};

use anyhow::{bail, ensure, Result};
use lineitem_core::{CodecError, CodecKind, Error};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct CodecBenchResult {
  pub codec: CodecKind,
  pub chunks: usize,
  pub input_bytes: usize,
  pub compressed_bytes: usize,
  pub compress: Duration,
  pub decompress: Duration,
}

impl CodecBenchResult {
  /// Compressed over input size.
  pub fn ratio(&self) -> f64 {
    if self.input_bytes == 0 {
      return 0.0;
    }
    self.compressed_bytes as f64 / self.input_bytes as f64
  }

  pub fn compress_bandwidth(&self) -> f64 {
    bandwidth(self.input_bytes, self.compress)
  }

  pub fn decompress_bandwidth(&self) -> f64 {
    bandwidth(self.input_bytes, self.decompress)
  }
}

/// Megabytes of uncompressed data per second; 0 for an unmeasurably short run.
fn bandwidth(bytes: usize, elapsed: Duration) -> f64 {
  let secs = elapsed.as_secs_f64();
  if secs == 0.0 {
    return 0.0;
  }
  bytes as f64 / 1e6 / secs
}

impl fmt::Display for CodecBenchResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Codec: {}", self.codec.name().to_uppercase())?;
    writeln!(f, "Chunks: {}", self.chunks)?;
    writeln!(f, "Input size: {} bytes", self.input_bytes)?;
    writeln!(f, "Output size: {} bytes", self.compressed_bytes)?;
    writeln!(f, "Ratio: {:.4}", self.ratio())?;
    writeln!(
      f,
      "Compression bandwidth: {:.2} MB/s",
      self.compress_bandwidth()
    )?;
    write!(
      f,
      "Decompression bandwidth: {:.2} MB/s",
      self.decompress_bandwidth()
    )
  }
}

/// Compress `data` in `chunk_size` pieces with `codec`, then decompress every piece and check it
/// matches the input.
pub fn run_codec_benchmark(
  data: &[u8],
  codec: CodecKind,
  chunk_size: usize,
) -> Result<CodecBenchResult> {
  ensure!(chunk_size > 0, "chunk size must be positive");
  let codec_impl = codec.codec();
  let to_error = |source: CodecError| Error::Codec {
    column: codec.name().to_string(),
    source,
  };

  let start = Instant::now();
  let mut compressed = Vec::with_capacity(data.len().div_ceil(chunk_size));
  for chunk in data.chunks(chunk_size) {
    compressed.push(codec_impl.compress(chunk).map_err(to_error)?);
  }
  let compress = start.elapsed();

  let start = Instant::now();
  let mut restored = Vec::with_capacity(compressed.len());
  for chunk in &compressed {
    restored.push(codec_impl.decompress(chunk).map_err(to_error)?);
  }
  let decompress = start.elapsed();

  for (idx, (original, output)) in data.chunks(chunk_size).zip(&restored).enumerate() {
    if original != output.as_slice() {
      bail!("{codec} chunk {idx} did not survive a round trip");
    }
  }

  let result = CodecBenchResult {
    codec,
    chunks: compressed.len(),
    input_bytes: data.len(),
    compressed_bytes: compressed.iter().map(Vec::len).sum(),
    compress,
    decompress,
  };
  debug!(codec = %codec, chunks = result.chunks, ratio = result.ratio(), "codec benchmarked");
  Ok(result)
}
