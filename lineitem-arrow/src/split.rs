//! Split a pipe-delimited row file (`lineitem.tbl`) into one raw file per column.
//!
//! Each field is coerced through the column's [`LogicalType`](lineitem_core::LogicalType):
//! integers and floats are narrowed to 32 bits, dates become epoch seconds and text is stored
//! fixed-width. The output of one column is the concatenation of its encoded values, with no
//! header, so a column file is only meaningful together with the schema that wrote it.

use std::{
  fs::{self, File},
  io::{BufRead, BufReader},
  path::{Path, PathBuf},
};

use lineitem_core::{encoding::encode_field, schema::raw_file_name, Error, Result, TableSchema};
use tracing::{debug, info};

pub const FIELD_DELIMITER: char = '|';

/// Column-major buffers accumulated from rows of text.
#[derive(Debug, Clone)]
pub struct ColumnBuffers {
  schema: TableSchema,
  buffers: Vec<Vec<u8>>,
  rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
  pub rows: usize,
  pub files: Vec<PathBuf>,
  pub bytes: u64,
}

impl ColumnBuffers {
  pub fn new(schema: TableSchema) -> Self {
    let buffers = vec![Vec::new(); schema.len()];
    Self {
      schema,
      buffers,
      rows: 0,
    }
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn schema(&self) -> &TableSchema {
    &self.schema
  }

  /// Raw bytes accumulated so far for `column`.
  pub fn column(&self, column: &str) -> Option<&[u8]> {
    self
      .schema
      .position(column)
      .map(|idx| self.buffers[idx].as_slice())
  }

  /// Append one row. `line_no` is 1-based and only used for error messages.
  ///
  /// A failing row leaves the buffers exactly as they were before the call.
  pub fn push_row(&mut self, line_no: usize, line: &str) -> Result<()> {
    let mut fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    // dbgen terminates every row with the delimiter
    if fields.len() == self.schema.len() + 1 && fields.last() == Some(&"") {
      fields.pop();
    }
    if fields.len() != self.schema.len() {
      return Err(Error::SchemaMismatch {
        line: line_no,
        expected: self.schema.len(),
        found: fields.len(),
      });
    }

    let marks: Vec<usize> = self.buffers.iter().map(Vec::len).collect();
    let mut failure = None;
    for ((def, buffer), raw) in self
      .schema
      .columns()
      .iter()
      .zip(self.buffers.iter_mut())
      .zip(fields)
    {
      if let Err(reason) = encode_field(def.logical_type, raw, buffer) {
        failure = Some((def.name.clone(), raw, reason));
        break;
      }
    }

    match failure {
      None => {
        self.rows += 1;
        Ok(())
      }
      Some((column, raw, reason)) => {
        for (buffer, mark) in self.buffers.iter_mut().zip(marks) {
          buffer.truncate(mark);
        }
        Err(Error::Parse {
          line: line_no,
          column,
          value: raw.to_string(),
          reason,
        })
      }
    }
  }

  /// Write every column as `<column>.bin` into `output_dir`, creating it when absent.
  pub fn write_to(&self, output_dir: impl AsRef<Path>) -> Result<SplitSummary> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(Error::io(output_dir))?;

    let mut files = Vec::with_capacity(self.buffers.len());
    let mut bytes = 0;
    for (def, buffer) in self.schema.columns().iter().zip(&self.buffers) {
      let path = output_dir.join(raw_file_name(&def.name));
      fs::write(&path, buffer).map_err(Error::io(&path))?;
      debug!(column = %def.name, path = %path.display(), bytes = buffer.len(), "column written");
      bytes += buffer.len() as u64;
      files.push(path);
    }

    Ok(SplitSummary {
      rows: self.rows,
      files,
      bytes,
    })
  }
}

/// Read every row of `reader` into column buffers. Blank lines are ignored.
pub fn split_rows<R: BufRead>(mut reader: R, schema: &TableSchema) -> Result<ColumnBuffers> {
  let mut columns = ColumnBuffers::new(schema.clone());
  let mut raw = Vec::new();
  let mut line_no = 0;
  loop {
    raw.clear();
    let read = reader
      .read_until(b'\n', &mut raw)
      .map_err(|source| Error::Io {
        path: PathBuf::from("<input>"),
        source,
      })?;
    if read == 0 {
      break;
    }
    line_no += 1;

    let line = std::str::from_utf8(&raw).map_err(|e| Error::Parse {
      line: line_no,
      column: "<row>".to_string(),
      value: String::from_utf8_lossy(&raw).trim_end().to_string(),
      reason: e.to_string(),
    })?;
    let line = line.trim_end_matches('\n').trim_end_matches('\r');
    if line.is_empty() {
      continue;
    }
    columns.push_row(line_no, line)?;
  }
  Ok(columns)
}

/// Split the row file at `input` into per-column files under `output_dir`.
pub fn split_row_file(
  input: impl AsRef<Path>,
  output_dir: impl AsRef<Path>,
  schema: &TableSchema,
) -> Result<SplitSummary> {
  let input = input.as_ref();
  let file = File::open(input).map_err(Error::io(input))?;
  let columns = split_rows(BufReader::new(file), schema).map_err(|err| match err {
    Error::Io { source, .. } => Error::Io {
      path: input.to_path_buf(),
      source,
    },
    other => other,
  })?;
  let summary = columns.write_to(output_dir.as_ref())?;
  info!(
    input = %input.display(),
    rows = summary.rows,
    columns = summary.files.len(),
    bytes = summary.bytes,
    "split row file"
  );
  Ok(summary)
}
