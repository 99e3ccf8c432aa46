use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the pipeline can surface. None of them is recoverable within a run: the
/// driver reports the error and exits.
#[derive(Error, Debug)]
pub enum Error {
  /// A row of the input file does not have as many fields as the schema.
  #[error("line {line}: expected {expected} fields, found {found}")]
  SchemaMismatch {
    line: usize,
    expected: usize,
    found: usize,
  },

  /// A field could not be coerced into its column's logical type.
  #[error("line {line}: cannot parse {value:?} as column {column}: {reason}")]
  Parse {
    line: usize,
    column: String,
    value: String,
    reason: String,
  },

  #[error("column {column}: {source}")]
  Codec {
    column: String,
    #[source]
    source: CodecError,
  },

  /// A decoded buffer is not a whole number of elements.
  #[error("column {column}: {len} bytes is not a multiple of the {width}-byte element width")]
  Layout {
    column: String,
    len: usize,
    width: usize,
  },

  #[error("column {column} has {found} rows, expected {expected}")]
  RowCountMismatch {
    column: String,
    expected: usize,
    found: usize,
  },

  /// A column needed by the query was never loaded, usually because its file is absent.
  #[error("required column {column} was not loaded")]
  MissingColumn { column: String },

  #[error("column {column} is not of type {expected}")]
  ColumnType { column: String, expected: String },

  #[error("{}: {}", .path.display(), .source)]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  /// Adapter for `map_err` that attaches the offending path to an I/O error.
  pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.as_ref().to_path_buf();
    move |source| Error::Io { path, source }
  }

  pub fn missing_column(column: impl Into<String>) -> Error {
    Error::MissingColumn {
      column: column.into(),
    }
  }
}
