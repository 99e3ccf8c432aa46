/// The [`FixedWidth`] trait is a minimal trait describing a primitive element type that a raw
/// column file can be reinterpreted as. Every element occupies exactly [`FixedWidth::WIDTH`]
/// bytes and is stored little-endian.
pub trait FixedWidth: sealed::Sealed + Copy + PartialEq + PartialOrd {
  /// Encoded size of one element in bytes.
  const WIDTH: usize;

  /// Decode one element. `bytes` is always exactly `WIDTH` long.
  fn read_le(bytes: &[u8]) -> Self;

  /// Append the little-endian encoding of `self` to `out`.
  fn write_le(self, out: &mut Vec<u8>);
}

impl FixedWidth for i32 {
  const WIDTH: usize = 4;

  fn read_le(bytes: &[u8]) -> Self {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    i32::from_le_bytes(buf)
  }

  fn write_le(self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_le_bytes());
  }
}

impl FixedWidth for f32 {
  const WIDTH: usize = 4;

  fn read_le(bytes: &[u8]) -> Self {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    f32::from_le_bytes(buf)
  }

  fn write_le(self, out: &mut Vec<u8>) {
    out.extend_from_slice(&self.to_le_bytes());
  }
}

mod sealed {
  pub trait Sealed {}

  impl Sealed for i32 {}
  impl Sealed for f32 {}
}
