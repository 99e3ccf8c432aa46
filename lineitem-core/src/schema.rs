use std::fmt;

use crate::codec::CodecKind;

/// Extension of the uncompressed per-column files written by the splitter.
pub const RAW_SUFFIX: &str = "bin";

/// The semantic type a column's raw bytes are reinterpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
  Int32,
  Float32,
  /// Text padded or truncated to exactly this many bytes.
  FixedString(usize),
  /// Seconds since the Unix epoch, stored as a 32-bit integer.
  Timestamp32,
}

impl LogicalType {
  /// Encoded size of one value in bytes.
  pub fn width(self) -> usize {
    match self {
      LogicalType::Int32 | LogicalType::Float32 | LogicalType::Timestamp32 => 4,
      LogicalType::FixedString(width) => width,
    }
  }
}

impl fmt::Display for LogicalType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LogicalType::Int32 => f.write_str("int32"),
      LogicalType::Float32 => f.write_str("float32"),
      LogicalType::FixedString(width) => write!(f, "char({width})"),
      LogicalType::Timestamp32 => f.write_str("timestamp32"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
  pub name: String,
  pub logical_type: LogicalType,
}

/// Column layout of the TPC-H `lineitem` table in `.tbl` field order.
pub const LINEITEM_COLUMNS: [(&str, LogicalType); 16] = [
  ("l_orderkey", LogicalType::Int32),
  ("l_partkey", LogicalType::Int32),
  ("l_suppkey", LogicalType::Int32),
  ("l_linenumber", LogicalType::Int32),
  ("l_quantity", LogicalType::Int32),
  ("l_extendedprice", LogicalType::Float32),
  ("l_discount", LogicalType::Float32),
  ("l_tax", LogicalType::Float32),
  ("l_returnflag", LogicalType::FixedString(1)),
  ("l_linestatus", LogicalType::FixedString(1)),
  ("l_shipdate", LogicalType::Timestamp32),
  ("l_commitdate", LogicalType::Timestamp32),
  ("l_receiptdate", LogicalType::Timestamp32),
  ("l_shipinstruct", LogicalType::FixedString(25)),
  ("l_shipmode", LogicalType::FixedString(10)),
  ("l_comment", LogicalType::FixedString(44)),
];

/// An immutable, ordered mapping from column name to logical type. Field `i` of an input row
/// belongs to `columns()[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
  name: String,
  columns: Vec<ColumnDef>,
}

impl TableSchema {
  pub fn new<'a>(
    name: impl Into<String>,
    columns: impl IntoIterator<Item = (&'a str, LogicalType)>,
  ) -> Self {
    let columns = columns
      .into_iter()
      .map(|(name, logical_type)| ColumnDef {
        name: name.to_string(),
        logical_type,
      })
      .collect();
    Self {
      name: name.into(),
      columns,
    }
  }

  pub fn lineitem() -> Self {
    Self::new("lineitem", LINEITEM_COLUMNS)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn columns(&self) -> &[ColumnDef] {
    &self.columns
  }

  pub fn len(&self) -> usize {
    self.columns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.columns.is_empty()
  }

  pub fn column(&self, name: &str) -> Option<&ColumnDef> {
    self.columns.iter().find(|def| def.name == name)
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.columns.iter().position(|def| def.name == name)
  }

  /// Map a file name in a column directory back to its column.
  ///
  /// Accepts `<column>.bin.<suffix>` as written by compressing the splitter output, and the
  /// shorter `<column>.<suffix>`. Returns `None` for other codecs' files and for names that
  /// are not columns of this table.
  pub fn resolve_file(&self, file_name: &str, codec: CodecKind) -> Option<&ColumnDef> {
    let stem = file_name.strip_suffix(codec.suffix())?.strip_suffix('.')?;
    let stem = stem
      .strip_suffix(RAW_SUFFIX)
      .and_then(|s| s.strip_suffix('.'))
      .unwrap_or(stem);
    self.column(stem)
  }
}

/// File name of the uncompressed splitter output for `column`.
pub fn raw_file_name(column: &str) -> String {
  format!("{column}.{RAW_SUFFIX}")
}

/// File name of `file_name` once compressed with `codec`.
pub fn compressed_file_name(file_name: &str, codec: CodecKind) -> String {
  format!("{file_name}.{}", codec.suffix())
}
