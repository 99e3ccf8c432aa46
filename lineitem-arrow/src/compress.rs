//! Offline compression of a directory of column files.

use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use lineitem_core::{schema::compressed_file_name, CodecKind, Error};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressSummary {
  pub files: usize,
  pub input_bytes: u64,
  pub output_bytes: u64,
}

impl CompressSummary {
  /// Uncompressed over compressed size; 0 when nothing was written.
  pub fn ratio(&self) -> f64 {
    if self.output_bytes == 0 {
      return 0.0;
    }
    self.input_bytes as f64 / self.output_bytes as f64
  }
}

/// Where the compressed copy of `input_dir` goes unless told otherwise:
/// `<input_dir>/<codec>_compressed_line_item`.
pub fn default_output_dir(input_dir: impl AsRef<Path>, codec: CodecKind) -> PathBuf {
  input_dir
    .as_ref()
    .join(format!("{}_compressed_line_item", codec.name()))
}

/// Compress every regular file directly under `input_dir` into
/// `output_dir/<file_name>.<suffix>`. Sub-directories, including a previous output directory,
/// are not descended into.
pub fn compress_directory(
  input_dir: impl AsRef<Path>,
  codec: CodecKind,
  output_dir: impl AsRef<Path>,
) -> Result<CompressSummary> {
  let input_dir = input_dir.as_ref();
  let output_dir = output_dir.as_ref();
  fs::create_dir_all(output_dir).map_err(Error::io(output_dir))?;

  let mut inputs = Vec::new();
  for entry in fs::read_dir(input_dir).map_err(Error::io(input_dir))? {
    let path = entry.map_err(Error::io(input_dir))?.path();
    if path.is_file() {
      inputs.push(path);
    }
  }
  inputs.sort();

  let encoder = codec.codec();
  let mut summary = CompressSummary::default();
  for path in inputs {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
      continue;
    };
    let data = fs::read(&path).map_err(Error::io(&path))?;
    let compressed = encoder
      .compress(&data)
      .map_err(|source| Error::Codec {
        column: file_name.to_string(),
        source,
      })
      .with_context(|| format!("compressing {}", path.display()))?;

    let target = output_dir.join(compressed_file_name(file_name, codec));
    fs::write(&target, &compressed).map_err(Error::io(&target))?;
    debug!(
      input = %path.display(),
      output = %target.display(),
      before = data.len(),
      after = compressed.len(),
      "file compressed"
    );

    summary.files += 1;
    summary.input_bytes += data.len() as u64;
    summary.output_bytes += compressed.len() as u64;
  }

  info!(
    codec = %codec,
    files = summary.files,
    ratio = summary.ratio(),
    output = %output_dir.display(),
    "directory compressed"
  );
  Ok(summary)
}
