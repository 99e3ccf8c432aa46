//! This crate provides the building blocks shared by the lineitem benchmark tools:
//! - the static table schema and the logical types a raw column file is reinterpreted as
//! - the fixed-width little-endian encoding of each logical type
//! - the [`Codec`] capability and its LZ4, Snappy, ZLIB, ZSTD and DEFLATE variants
//! - the error taxonomy every stage of the pipeline reports through

pub mod codec;
pub mod encoding;
pub mod error;
pub mod schema;
pub mod traits;

pub use codec::{Codec, CodecError, CodecKind};
pub use error::{Error, Result};
pub use schema::{ColumnDef, LogicalType, TableSchema};
