//! Load a directory of compressed column files into typed Arrow arrays.
//!
//! Only the time spent inside [`Codec::decompress`] is reported: reading the file and
//! reinterpreting the decoded bytes are excluded. With a worker pool the reported time is the
//! sum of the per-column decode times, so runs with different concurrency stay comparable.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use arrow::{
  array::{
    Array, ArrayRef, FixedSizeBinaryArray, Float32Array, Int32Array, RecordBatch,
    RecordBatchOptions, TimestampSecondArray,
  },
  buffer::Buffer,
  datatypes::{Field, Schema},
};
use lineitem_core::{
  encoding::{decode_values, fixed_string_rows},
  Codec, CodecKind, ColumnDef, Error, LogicalType, TableSchema,
};
use rayon::{prelude::*, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::arrow_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
  /// Number of columns decoded at once. `1` decodes sequentially on the calling thread.
  pub concurrency: usize,
}

impl Default for LoadOptions {
  fn default() -> Self {
    Self { concurrency: 1 }
  }
}

impl LoadOptions {
  pub fn with_concurrency(concurrency: usize) -> Self {
    Self {
      concurrency: concurrency.max(1),
    }
  }
}

/// A compressed file in the input directory and the column it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFile {
  pub def: ColumnDef,
  pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoadedColumns {
  pub columns: BTreeMap<String, ArrayRef>,
  /// Sum of the time spent decompressing each column.
  pub decompression: Duration,
}

impl LoadedColumns {
  pub fn get(&self, column: &str) -> Option<&ArrayRef> {
    self.columns.get(column)
  }

  pub fn require(&self, column: &str) -> lineitem_core::Result<&ArrayRef> {
    self
      .columns
      .get(column)
      .ok_or_else(|| Error::missing_column(column))
  }

  /// Assemble the loaded columns, in schema order, into one row-aligned table.
  pub fn table(&self, schema: &TableSchema) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(self.columns.len());
    let mut arrays = Vec::with_capacity(self.columns.len());
    let mut row_count = None;

    for def in schema.columns() {
      let Some(array) = self.columns.get(&def.name) else {
        continue;
      };
      match row_count {
        None => row_count = Some(array.len()),
        Some(expected) if expected != array.len() => {
          return Err(
            Error::RowCountMismatch {
              column: def.name.clone(),
              expected,
              found: array.len(),
            }
            .into(),
          );
        }
        Some(_) => {}
      }
      fields.push(Field::new(&def.name, arrow_type(def.logical_type), false));
      arrays.push(Arc::clone(array));
    }

    let options = RecordBatchOptions::default().with_row_count(Some(row_count.unwrap_or(0)));
    let table = RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
      .context("assembling table")?;
    Ok(table)
  }
}

/// List the files in `dir` that hold a column of `schema` compressed with `codec`, in schema
/// order. Anything else in the directory is ignored.
pub fn discover_column_files(
  dir: impl AsRef<Path>,
  schema: &TableSchema,
  codec: CodecKind,
) -> Result<Vec<ColumnFile>> {
  let dir = dir.as_ref();
  let mut found: Vec<(usize, ColumnFile)> = Vec::new();

  for entry in fs::read_dir(dir).map_err(Error::io(dir))? {
    let path = entry.map_err(Error::io(dir))?.path();
    if !path.is_file() {
      continue;
    }
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
      continue;
    };
    let Some(def) = schema.resolve_file(file_name, codec) else {
      debug!(file = %file_name, "skipping file outside the schema");
      continue;
    };
    let position = schema.position(&def.name).unwrap_or(usize::MAX);
    found.push((
      position,
      ColumnFile {
        def: def.clone(),
        path,
      },
    ));
  }

  found.sort_by(|(p1, f1), (p2, f2)| p1.cmp(p2).then_with(|| f1.path.cmp(&f2.path)));
  let mut files: Vec<ColumnFile> = Vec::with_capacity(found.len());
  for (_, file) in found {
    if files.last().is_some_and(|last| last.def.name == file.def.name) {
      warn!(column = %file.def.name, path = %file.path.display(), "duplicate column file ignored");
      continue;
    }
    files.push(file);
  }
  Ok(files)
}

/// Decompress and decode every column of `schema` found in `dir`.
pub fn load_columns(
  dir: impl AsRef<Path>,
  schema: &TableSchema,
  codec: CodecKind,
  options: &LoadOptions,
) -> Result<LoadedColumns> {
  let dir = dir.as_ref();
  let files = discover_column_files(dir, schema, codec)?;
  let decoder = codec.codec();
  let decoder = decoder.as_ref();

  let decoded: Vec<(String, ArrayRef, Duration)> = if options.concurrency <= 1 {
    files
      .iter()
      .map(|file| load_column(file, decoder))
      .collect::<Result<_>>()?
  } else {
    let pool = ThreadPoolBuilder::new()
      .num_threads(options.concurrency)
      .build()
      .context("building decode worker pool")?;
    pool.install(|| {
      files
        .par_iter()
        .map(|file| load_column(file, decoder))
        .collect::<Result<_>>()
    })?
  };

  let mut columns = BTreeMap::new();
  let mut decompression = Duration::ZERO;
  for (name, array, elapsed) in decoded {
    decompression += elapsed;
    columns.insert(name, array);
  }

  info!(
    dir = %dir.display(),
    codec = %codec,
    columns = columns.len(),
    concurrency = options.concurrency,
    decompression_secs = decompression.as_secs_f64(),
    "columns loaded"
  );
  Ok(LoadedColumns {
    columns,
    decompression,
  })
}

fn load_column(file: &ColumnFile, codec: &dyn Codec) -> Result<(String, ArrayRef, Duration)> {
  let compressed = fs::read(&file.path).map_err(Error::io(&file.path))?;

  let start = Instant::now();
  let raw = codec
    .decompress(&compressed)
    .map_err(|source| Error::Codec {
      column: file.def.name.clone(),
      source,
    })
    .with_context(|| format!("decompressing {}", file.path.display()))?;
  let elapsed = start.elapsed();

  let array = decode_column(&file.def, raw)?;
  debug!(
    column = %file.def.name,
    rows = array.len(),
    compressed = compressed.len(),
    elapsed_secs = elapsed.as_secs_f64(),
    "column decoded"
  );
  Ok((file.def.name.clone(), array, elapsed))
}

/// Reinterpret a decompressed column buffer according to the column's logical type.
pub fn decode_column(def: &ColumnDef, raw: Vec<u8>) -> Result<ArrayRef> {
  let array: ArrayRef = match def.logical_type {
    LogicalType::Int32 => Arc::new(Int32Array::from(decode_values::<i32>(&def.name, &raw)?)),
    LogicalType::Float32 => Arc::new(Float32Array::from(decode_values::<f32>(&def.name, &raw)?)),
    LogicalType::Timestamp32 => {
      let seconds: Vec<i64> = decode_values::<i32>(&def.name, &raw)?
        .into_iter()
        .map(i64::from)
        .collect();
      Arc::new(TimestampSecondArray::from(seconds))
    }
    LogicalType::FixedString(width) => {
      fixed_string_rows(&def.name, &raw, width)?;
      let values = FixedSizeBinaryArray::try_new(width as i32, Buffer::from_vec(raw), None)
        .with_context(|| format!("decoding column {}", def.name))?;
      Arc::new(values)
    }
  };
  Ok(array)
}

#[cfg(test)]
mod tests {
  use arrow::{array::AsArray, datatypes::Float32Type};
  use lineitem_core::schema::{compressed_file_name, raw_file_name};
  use rstest::rstest;

  use super::*;
  use crate::{compress::compress_directory, split::split_rows};

  const ROWS: &str = "\
1|155190|7706|1|17|21168.23|0.04|0.02|N|O|1996-03-13|1996-02-12|1996-03-22|DELIVER IN PERSON|TRUCK|egular courts above the|
1|67310|7311|2|36|45983.16|0.09|0.06|N|O|1996-04-12|1996-02-28|1996-04-20|TAKE BACK RETURN|MAIL|ly final dependencies: slyly bold |
1|63700|3701|3|8|13309.60|0.10|0.02|N|O|1996-01-29|1996-03-05|1996-01-31|TAKE BACK RETURN|REG AIR|riously. regular, express dep|
";

  /// Split `ROWS` into `<tmp>/raw` and compress it with `codec` into `<tmp>/<codec>`.
  fn prepare(codec: CodecKind) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    split_rows(ROWS.as_bytes(), &TableSchema::lineitem())
      .unwrap()
      .write_to(&raw)
      .unwrap();
    let compressed = dir.path().join(codec.name());
    compress_directory(&raw, codec, &compressed).unwrap();
    (dir, compressed)
  }

  #[rstest]
  #[case(CodecKind::Lz4)]
  #[case(CodecKind::Snappy)]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Zstd)]
  #[case(CodecKind::Deflate)]
  fn test_load_every_codec(#[case] codec: CodecKind) {
    let (_dir, compressed) = prepare(codec);
    let schema = TableSchema::lineitem();
    let loaded = load_columns(&compressed, &schema, codec, &LoadOptions::default()).unwrap();

    assert_eq!(loaded.columns.len(), 16);
    let discount = loaded.get("l_discount").unwrap().as_primitive::<Float32Type>();
    assert_eq!(discount.values().to_vec(), vec![0.04f32, 0.09, 0.10]);

    let table = loaded.table(&schema).unwrap();
    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.num_columns(), 16);
    assert_eq!(table.schema().field(0).name(), "l_orderkey");
  }

  #[test]
  fn test_concurrent_load_matches_sequential() {
    let (_dir, compressed) = prepare(CodecKind::Zlib);
    let schema = TableSchema::lineitem();
    let sequential =
      load_columns(&compressed, &schema, CodecKind::Zlib, &LoadOptions::default()).unwrap();
    let pooled = load_columns(
      &compressed,
      &schema,
      CodecKind::Zlib,
      &LoadOptions::with_concurrency(4),
    )
    .unwrap();

    assert_eq!(
      sequential.columns.keys().collect::<Vec<_>>(),
      pooled.columns.keys().collect::<Vec<_>>()
    );
    for (name, array) in &sequential.columns {
      assert_eq!(array.as_ref(), pooled.columns[name].as_ref(), "column {name}");
    }
  }

  #[test]
  fn test_unknown_and_foreign_files_are_skipped() {
    let (_dir, compressed) = prepare(CodecKind::Snappy);
    fs::write(compressed.join("notes.txt.snappy"), b"not a column").unwrap();
    fs::write(compressed.join("l_tax.bin.lz4"), b"other codec").unwrap();
    let comment = compressed_file_name(&raw_file_name("l_comment"), CodecKind::Snappy);
    fs::remove_file(compressed.join(comment)).unwrap();

    let loaded = load_columns(
      &compressed,
      &TableSchema::lineitem(),
      CodecKind::Snappy,
      &LoadOptions::default(),
    )
    .unwrap();
    assert_eq!(loaded.columns.len(), 15);
    assert!(loaded.get("l_comment").is_none());
    assert!(matches!(
      loaded.require("l_comment"),
      Err(Error::MissingColumn { .. })
    ));
  }

  #[test]
  fn test_first_duplicate_column_file_wins() {
    let (_dir, compressed) = prepare(CodecKind::Zlib);
    let mut other = Vec::new();
    for value in [0.5f32, 0.5, 0.5] {
      other.extend_from_slice(&value.to_le_bytes());
    }
    let blob = CodecKind::Zlib.codec().compress(&other).unwrap();
    fs::write(compressed.join("l_tax.zlib"), blob).unwrap();

    let schema = TableSchema::lineitem();
    let files = discover_column_files(&compressed, &schema, CodecKind::Zlib).unwrap();
    assert_eq!(files.len(), 16);
    let tax = files.iter().find(|file| file.def.name == "l_tax").unwrap();
    assert!(tax.path.ends_with("l_tax.bin.zlib"));

    let loaded =
      load_columns(&compressed, &schema, CodecKind::Zlib, &LoadOptions::default()).unwrap();
    let tax = loaded.get("l_tax").unwrap().as_primitive::<Float32Type>();
    assert_eq!(tax.values().to_vec(), vec![0.02f32, 0.06, 0.02]);
  }

  #[test]
  fn test_corrupt_column_names_the_column() {
    let (_dir, compressed) = prepare(CodecKind::Zstd);
    let path = compressed.join("l_quantity.bin.zstd");
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() / 2]).unwrap();

    let err = load_columns(
      &compressed,
      &TableSchema::lineitem(),
      CodecKind::Zstd,
      &LoadOptions::default(),
    )
    .unwrap_err();
    match err.downcast_ref::<Error>() {
      Some(Error::Codec { column, .. }) => assert_eq!(column, "l_quantity"),
      other => panic!("unexpected error {other:?}"),
    }
  }

  #[test]
  fn test_misaligned_column_is_rejected() {
    let def = ColumnDef {
      name: "l_partkey".to_string(),
      logical_type: LogicalType::Int32,
    };
    let err = decode_column(&def, vec![0u8; 6]).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<Error>(),
      Some(Error::Layout { len: 6, width: 4, .. })
    ));
  }

  #[test]
  fn test_row_count_mismatch() {
    let mut columns = BTreeMap::new();
    columns.insert(
      "l_quantity".to_string(),
      Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef,
    );
    columns.insert(
      "l_discount".to_string(),
      Arc::new(Float32Array::from(vec![0.05f32])) as ArrayRef,
    );
    let loaded = LoadedColumns {
      columns,
      decompression: Duration::ZERO,
    };
    let err = loaded.table(&TableSchema::lineitem()).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<Error>(),
      Some(Error::RowCountMismatch { .. })
    ));
  }

  #[test]
  fn test_missing_directory() {
    let err = load_columns(
      "/nonexistent/lineitem",
      &TableSchema::lineitem(),
      CodecKind::Lz4,
      &LoadOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Io { .. })));
  }
}
