//! Byte-stream codecs used to compress column files.
//!
//! Each codec is a unit struct implementing [`Codec`]; [`CodecKind`] is the closed set of
//! names a codec can be selected by on the command line and the file suffix it writes.

use std::{fmt, io::Write, str::FromStr};

use flate2::{
  write::{DeflateEncoder, ZlibEncoder},
  Compression, Decompress, FlushDecompress, Status,
};
use snap::raw::{Decoder, Encoder};
use thiserror::Error;

pub const ZSTD_LEVEL: i32 = 3;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const INFLATE_CHUNK: usize = 64 * 1024;
const LZ4_PREFIX_LEN: usize = 4;
// One input byte of an LZ4 block expands to at most 255 output bytes.
const LZ4_MAX_RATIO: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
  /// The payload is in this codec's format but truncated or damaged.
  #[error("{codec}: corrupt input: {reason}")]
  Corrupt { codec: &'static str, reason: String },

  /// The payload was not produced by this codec at all.
  #[error("{codec}: unsupported format: {reason}")]
  Unsupported { codec: &'static str, reason: String },

  #[error("{codec}: compression failed: {reason}")]
  Encode { codec: &'static str, reason: String },
}

impl CodecError {
  fn corrupt(codec: CodecKind, reason: impl fmt::Display) -> Self {
    CodecError::Corrupt {
      codec: codec.name(),
      reason: reason.to_string(),
    }
  }

  fn unsupported(codec: CodecKind, reason: impl fmt::Display) -> Self {
    CodecError::Unsupported {
      codec: codec.name(),
      reason: reason.to_string(),
    }
  }

  fn encode(codec: CodecKind, reason: impl fmt::Display) -> Self {
    CodecError::Encode {
      codec: codec.name(),
      reason: reason.to_string(),
    }
  }
}

/// A reversible byte-stream transformation. `decompress(compress(x)) == x` for every `x`,
/// including the empty buffer, and a damaged payload is always an error, never a short read.
pub trait Codec: Send + Sync {
  fn kind(&self) -> CodecKind;
  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecKind {
  /// Pass-through, reads the splitter's `.bin` files as they are.
  Identity,
  Lz4,
  Snappy,
  #[default]
  Zlib,
  Zstd,
  /// Raw DEFLATE without a zlib wrapper.
  Deflate,
}

impl CodecKind {
  pub const ALL: [CodecKind; 6] = [
    CodecKind::Identity,
    CodecKind::Lz4,
    CodecKind::Snappy,
    CodecKind::Zlib,
    CodecKind::Zstd,
    CodecKind::Deflate,
  ];

  pub fn name(self) -> &'static str {
    match self {
      CodecKind::Identity => "identity",
      CodecKind::Lz4 => "lz4",
      CodecKind::Snappy => "snappy",
      CodecKind::Zlib => "zlib",
      CodecKind::Zstd => "zstd",
      CodecKind::Deflate => "deflate",
    }
  }

  /// Extension appended to a column file compressed with this codec.
  pub fn suffix(self) -> &'static str {
    match self {
      CodecKind::Identity => "bin",
      other => other.name(),
    }
  }

  pub fn codec(self) -> Box<dyn Codec> {
    match self {
      CodecKind::Identity => Box::new(IdentityCodec),
      CodecKind::Lz4 => Box::new(Lz4Codec),
      CodecKind::Snappy => Box::new(SnappyCodec),
      CodecKind::Zlib => Box::new(ZlibCodec),
      CodecKind::Zstd => Box::new(ZstdCodec::new(ZSTD_LEVEL)),
      CodecKind::Deflate => Box::new(DeflateCodec),
    }
  }
}

impl fmt::Display for CodecKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for CodecKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lowered = s.to_ascii_lowercase();
    CodecKind::ALL
      .into_iter()
      .find(|kind| kind.name() == lowered)
      .ok_or_else(|| {
        let names: Vec<&str> = CodecKind::ALL.iter().map(|kind| kind.name()).collect();
        format!("unknown codec {s:?}, expected one of {}", names.join(", "))
      })
  }
}

pub struct IdentityCodec;

impl Codec for IdentityCodec {
  fn kind(&self) -> CodecKind {
    CodecKind::Identity
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(data.to_vec())
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(data.to_vec())
  }
}

/// LZ4 block format with the uncompressed length prepended as a 4-byte little-endian prefix.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
  fn kind(&self) -> CodecKind {
    CodecKind::Lz4
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(lz4_flex::compress_prepend_size(data))
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let Some((prefix, block)) = data.split_first_chunk::<LZ4_PREFIX_LEN>() else {
      return Err(CodecError::corrupt(self.kind(), "missing size prefix"));
    };
    let declared = u32::from_le_bytes(*prefix) as usize;
    if declared > block.len().saturating_mul(LZ4_MAX_RATIO) {
      return Err(CodecError::corrupt(
        self.kind(),
        format!("{declared} bytes declared for a {}-byte block", block.len()),
      ));
    }
    let out =
      lz4_flex::decompress(block, declared).map_err(|e| CodecError::corrupt(self.kind(), e))?;
    if out.len() != declared {
      return Err(CodecError::corrupt(
        self.kind(),
        format!("decoded {} of {declared} declared bytes", out.len()),
      ));
    }
    Ok(out)
  }
}

pub struct SnappyCodec;

impl Codec for SnappyCodec {
  fn kind(&self) -> CodecKind {
    CodecKind::Snappy
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = Encoder::new();
    encoder
      .compress_vec(data)
      .map_err(|e| CodecError::encode(self.kind(), e))
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = Decoder::new();
    decoder
      .decompress_vec(data)
      .map_err(|e| CodecError::corrupt(self.kind(), e))
  }
}

pub struct ZlibCodec;

impl Codec for ZlibCodec {
  fn kind(&self) -> CodecKind {
    CodecKind::Zlib
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
      .write_all(data)
      .and_then(|_| encoder.finish())
      .map_err(|e| CodecError::encode(self.kind(), e))
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < 2 {
      return Err(CodecError::corrupt(self.kind(), "missing stream header"));
    }
    if !has_zlib_header(data) {
      return Err(CodecError::unsupported(
        self.kind(),
        format!("invalid stream header {:02x}{:02x}", data[0], data[1]),
      ));
    }
    inflate(self.kind(), data, true)
  }
}

pub struct DeflateCodec;

impl Codec for DeflateCodec {
  fn kind(&self) -> CodecKind {
    CodecKind::Deflate
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
      .write_all(data)
      .and_then(|_| encoder.finish())
      .map_err(|e| CodecError::encode(self.kind(), e))
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    inflate(self.kind(), data, false)
  }
}

pub struct ZstdCodec {
  level: i32,
}

impl ZstdCodec {
  pub fn new(level: i32) -> Self {
    Self { level }
  }
}

impl Codec for ZstdCodec {
  fn kind(&self) -> CodecKind {
    CodecKind::Zstd
  }

  fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    zstd::stream::encode_all(data, self.level).map_err(|e| CodecError::encode(self.kind(), e))
  }

  fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < ZSTD_MAGIC.len() {
      return Err(CodecError::corrupt(self.kind(), "missing frame header"));
    }
    if data[..ZSTD_MAGIC.len()] != ZSTD_MAGIC {
      return Err(CodecError::unsupported(self.kind(), "missing zstd frame magic"));
    }
    zstd::stream::decode_all(data).map_err(|e| CodecError::corrupt(self.kind(), e))
  }
}

// RFC 1950: deflate method in the low nibble of CMF, and CMF/FLG as a big-endian u16 is a
// multiple of 31.
fn has_zlib_header(data: &[u8]) -> bool {
  let cmf = u16::from(data[0]);
  let flg = u16::from(data[1]);
  cmf & 0x0f == 8 && ((cmf << 8) | flg) % 31 == 0
}

/// Inflate the whole of `data`, failing unless the final block is reached exactly at its end.
fn inflate(codec: CodecKind, data: &[u8], zlib_header: bool) -> Result<Vec<u8>, CodecError> {
  let mut inflater = Decompress::new(zlib_header);
  let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(INFLATE_CHUNK));
  loop {
    if out.len() == out.capacity() {
      out.reserve(out.capacity());
    }
    let consumed = inflater.total_in() as usize;
    let produced = inflater.total_out();
    let status = inflater
      .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
      .map_err(|e| CodecError::corrupt(codec, e))?;
    if status == Status::StreamEnd {
      let trailing = data.len() - inflater.total_in() as usize;
      if trailing > 0 {
        return Err(CodecError::corrupt(
          codec,
          format!("{trailing} trailing bytes after the final block"),
        ));
      }
      return Ok(out);
    }
    let stalled = inflater.total_in() as usize == consumed && inflater.total_out() == produced;
    if stalled && out.len() < out.capacity() {
      return Err(CodecError::corrupt(
        codec,
        "stream ends before the final block",
      ));
    }
  }
}

#[cfg(test)]
mod tests {
  use rand::{rngs::SmallRng, RngCore, SeedableRng};
  use rstest::rstest;

  use super::*;

  fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
  }

  fn payloads() -> Vec<Vec<u8>> {
    vec![
      vec![],
      vec![0x42],
      random_bytes(1 << 20),
      b"l_shipdate|l_discount|l_quantity|".repeat(10_000),
    ]
  }

  #[rstest]
  #[case(CodecKind::Identity)]
  #[case(CodecKind::Lz4)]
  #[case(CodecKind::Snappy)]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Zstd)]
  #[case(CodecKind::Deflate)]
  fn test_round_trip(#[case] kind: CodecKind) {
    let codec = kind.codec();
    assert_eq!(codec.kind(), kind);
    for payload in payloads() {
      let compressed = codec.compress(&payload).unwrap();
      let restored = codec.decompress(&compressed).unwrap();
      assert_eq!(payload, restored, "{kind} failed for {} bytes", payload.len());
    }
  }

  #[rstest]
  #[case(CodecKind::Lz4)]
  #[case(CodecKind::Snappy)]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Zstd)]
  #[case(CodecKind::Deflate)]
  fn test_truncated_payload_is_rejected(#[case] kind: CodecKind) {
    let codec = kind.codec();
    let payload = b"0.04|0.02|N|O|1996-03-13|".repeat(4096);
    let compressed = codec.compress(&payload).unwrap();
    let truncated = &compressed[..compressed.len() / 2];
    assert!(matches!(
      codec.decompress(truncated),
      Err(CodecError::Corrupt { .. })
    ));
  }

  #[rstest]
  #[case(CodecKind::Lz4)]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Deflate)]
  fn test_every_prefix_is_rejected(#[case] kind: CodecKind) {
    let codec = kind.codec();
    let payload = b"0.04|0.02|N|O|1996-03-13|".repeat(4096);
    let compressed = codec.compress(&payload).unwrap();
    for cut in 0..compressed.len() {
      match codec.decompress(&compressed[..cut]) {
        Err(CodecError::Corrupt { .. }) => {}
        other => panic!("{kind} accepted a {cut}-byte prefix: {other:?}"),
      }
    }
  }

  #[test]
  fn test_lz4_implausible_size_prefix() {
    let codec = CodecKind::Lz4.codec();
    let mut data = vec![0xff, 0xff, 0xff, 0xff];
    data.extend_from_slice(&lz4_flex::compress(b"x"));
    assert!(matches!(
      codec.decompress(&data),
      Err(CodecError::Corrupt { codec: "lz4", .. })
    ));

    // a plausible prefix that overstates the block's output
    let mut data = 64u32.to_le_bytes().to_vec();
    data.extend_from_slice(&lz4_flex::compress(b"revenue"));
    assert!(matches!(
      codec.decompress(&data),
      Err(CodecError::Corrupt { codec: "lz4", .. })
    ));
  }

  #[rstest]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Deflate)]
  fn test_trailing_bytes_are_rejected(#[case] kind: CodecKind) {
    let codec = kind.codec();
    let mut data = codec.compress(b"revenue = extendedprice * discount").unwrap();
    data.extend_from_slice(b"GARBAGE");
    assert!(matches!(
      codec.decompress(&data),
      Err(CodecError::Corrupt { .. })
    ));
  }

  #[rstest]
  #[case(CodecKind::Lz4)]
  #[case(CodecKind::Snappy)]
  #[case(CodecKind::Zlib)]
  #[case(CodecKind::Zstd)]
  #[case(CodecKind::Deflate)]
  fn test_empty_payload_is_rejected(#[case] kind: CodecKind) {
    assert!(kind.codec().decompress(&[]).is_err());
  }

  #[test]
  fn test_foreign_format_is_unsupported() {
    let zlib = CodecKind::Zlib.codec();
    let zstd = CodecKind::Zstd.codec();
    let from_zstd = zstd.compress(b"revenue").unwrap();
    let from_zlib = zlib.compress(b"revenue").unwrap();

    assert!(matches!(
      zlib.decompress(&from_zstd),
      Err(CodecError::Unsupported { codec: "zlib", .. })
    ));
    assert!(matches!(
      zstd.decompress(&from_zlib),
      Err(CodecError::Unsupported { codec: "zstd", .. })
    ));
  }

  #[test]
  fn test_parse_codec_name() {
    assert_eq!("LZ4".parse::<CodecKind>().unwrap(), CodecKind::Lz4);
    assert_eq!("snappy".parse::<CodecKind>().unwrap(), CodecKind::Snappy);
    assert!("brotli".parse::<CodecKind>().is_err());
    assert_eq!(CodecKind::default(), CodecKind::Zlib);
    assert_eq!(CodecKind::Identity.suffix(), "bin");
    assert_eq!(CodecKind::Zstd.suffix(), "zstd");
  }
}
