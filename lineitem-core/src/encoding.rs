//! Conversion between text fields, raw column bytes and typed values.

use chrono::NaiveDate;

use crate::{
  error::{Error, Result},
  schema::LogicalType,
  traits::FixedWidth,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const SECONDS_PER_DAY: i64 = 86_400;

/// Byte used to pad fixed-width text shorter than its column.
pub const PAD_BYTE: u8 = 0;

/// Coerce one text field into the raw encoding of `logical_type`, appending it to `out`.
/// The error is a human readable reason; callers attach the line and column.
pub fn encode_field(
  logical_type: LogicalType,
  raw: &str,
  out: &mut Vec<u8>,
) -> std::result::Result<(), String> {
  match logical_type {
    LogicalType::Int32 => {
      let wide: i64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
      let narrow = i32::try_from(wide).map_err(|_| format!("{wide} does not fit in 32 bits"))?;
      narrow.write_le(out);
    }
    LogicalType::Float32 => {
      let wide: f64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
      (wide as f32).write_le(out);
    }
    LogicalType::Timestamp32 => {
      let seconds = parse_date_seconds(raw.trim())?;
      let narrow =
        i32::try_from(seconds).map_err(|_| format!("{raw} is outside the 32-bit epoch range"))?;
      narrow.write_le(out);
    }
    LogicalType::FixedString(width) => {
      let text = truncate_at_char_boundary(raw, width);
      out.extend_from_slice(text.as_bytes());
      out.resize(out.len() + (width - text.len()), PAD_BYTE);
    }
  }
  Ok(())
}

/// Seconds since the Unix epoch at midnight UTC of a `YYYY-MM-DD` date.
pub fn parse_date_seconds(raw: &str) -> std::result::Result<i64, String> {
  let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| format!("{e}"))?;
  Ok(date_seconds(date))
}

pub fn date_seconds(date: NaiveDate) -> i64 {
  let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
  date.signed_duration_since(epoch).num_days() * SECONDS_PER_DAY
}

/// Reinterpret a decoded column buffer as a vector of `T`.
pub fn decode_values<T: FixedWidth>(column: &str, bytes: &[u8]) -> Result<Vec<T>> {
  if bytes.len() % T::WIDTH != 0 {
    return Err(Error::Layout {
      column: column.to_string(),
      len: bytes.len(),
      width: T::WIDTH,
    });
  }
  Ok(bytes.chunks_exact(T::WIDTH).map(T::read_le).collect())
}

/// Check that a fixed-width text buffer holds whole values and return the row count.
pub fn fixed_string_rows(column: &str, bytes: &[u8], width: usize) -> Result<usize> {
  if width == 0 || bytes.len() % width != 0 {
    return Err(Error::Layout {
      column: column.to_string(),
      len: bytes.len(),
      width,
    });
  }
  Ok(bytes.len() / width)
}

/// Strip trailing padding from one fixed-width text value.
pub fn trim_padding(value: &[u8]) -> &[u8] {
  let end = value
    .iter()
    .rposition(|&b| b != PAD_BYTE)
    .map_or(0, |last| last + 1);
  &value[..end]
}

fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
  if text.len() <= max_len {
    return text;
  }
  let mut end = max_len;
  while !text.is_char_boundary(end) {
    end -= 1;
  }
  &text[..end]
}
