//! One end-to-end run of the q6 driver: optional offline compression, load, query and report.

use std::path::PathBuf;

use anyhow::Result;
use lineitem_arrow::{
  compress::{compress_directory, default_output_dir},
  load::{load_columns, LoadOptions},
};
use lineitem_core::{CodecKind, TableSchema};
use tracing::info;

use crate::{
  query::Q6Query,
  report::{codec_banner, decompression_summary},
};

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
  /// Directory holding the splitter's `<column>.bin` files, or compressed files when
  /// `precompressed` is set.
  pub input: PathBuf,
  pub codec: CodecKind,
  pub load: LoadOptions,
  pub precompressed: bool,
  pub query: Q6Query,
}

impl RunConfig {
  pub fn new(input: impl Into<PathBuf>, codec: CodecKind) -> Self {
    Self {
      input: input.into(),
      codec,
      load: LoadOptions::default(),
      precompressed: false,
      query: Q6Query::default(),
    }
  }
}

/// Run the whole pipeline and return the stdout report. The report is only assembled once every
/// stage has succeeded, so a failed run yields no timing lines at all.
pub fn run(config: &RunConfig) -> Result<String> {
  let schema = TableSchema::lineitem();
  let data_dir = if config.precompressed {
    config.input.clone()
  } else {
    let output = default_output_dir(&config.input, config.codec);
    compress_directory(&config.input, config.codec, &output)?;
    output
  };

  let loaded = load_columns(&data_dir, &schema, config.codec, &config.load)?;
  let table = loaded.table(&schema)?;
  let outcome = config.query.execute(&table, loaded.decompression)?;
  info!(
    rows = table.num_rows(),
    selected = outcome.selected,
    revenue = outcome.revenue,
    "q6 finished"
  );

  Ok(format!(
    "{}\n{}\n{}",
    codec_banner(config.codec),
    decompression_summary(config.codec, config.load.concurrency, loaded.decompression),
    outcome.timing
  ))
}
