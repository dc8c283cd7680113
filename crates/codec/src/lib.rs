//! # Codec - Fixed-Width Record Encoding
//!
//! Converts a [`Row`] to and from the fixed-width binary record stored in a
//! table's data file.
//!
//! ## Record Format
//!
//! ```text
//! [segment col 0][segment col 1] ... [segment col N-1]
//! ```
//!
//! Each segment is exactly the column type's width. Values are truncated to
//! that width and right-padded with `0x00`; decoding strips the trailing
//! zero bytes again. Records are stored back-to-back with no header,
//! delimiter, or length prefix, so record `n` starts at `n * record_width`.
//!
//! | Type          | Segment contents                                  |
//! |---------------|---------------------------------------------------|
//! | `int`         | `i64` little-endian                               |
//! | `str32/str64` | UTF-8 bytes, cut on a character boundary          |
//! | `blob`        | blob token (ASCII hex); all zeros means no blob   |
//!
//! The codec never sees blob payloads: callers swap payloads for tokens
//! before [`encode`] and tokens for payloads after [`decode`].

mod reader;
mod value;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use schema::{Column, Schema, Type};
use std::io;
use thiserror::Error;

pub use reader::RecordReader;
pub use value::{row, Row, Value};

/// Errors that can occur while encoding or decoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream ended part-way through a record.
    #[error("truncated record at offset {offset}: got {got} of {expected} bytes")]
    TruncatedRecord {
        offset: u64,
        got: usize,
        expected: usize,
    },

    /// Text supplied for an `int` column that is not a decimal integer.
    #[error("column {column:?}: {value:?} is not an integer")]
    InvalidInt { column: String, value: String },

    #[error("column {column:?} of type {ty} cannot hold a {found} value")]
    TypeMismatch {
        column: String,
        ty: Type,
        found: &'static str,
    },

    /// A raw payload reached a blob segment without being stored first.
    #[error("column {column:?}: blob payload must be replaced by a token before encoding")]
    UnresolvedBlob { column: String },

    #[error("column {column:?}: blob token {token:?} exceeds {width} bytes")]
    TokenTooLong {
        column: String,
        token: String,
        width: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Encodes `row` into a freshly allocated record.
pub fn encode(schema: &Schema, row: &Row) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(schema.record_width());
    encode_into(schema, row, &mut out)?;
    Ok(out)
}

/// Appends the encoding of `row` to `out`.
///
/// Columns absent from `row` (or `Null`) encode as all-zero segments. Keys in
/// `row` that are not schema columns are ignored here; the engine rejects
/// them before encoding.
pub fn encode_into(schema: &Schema, row: &Row, out: &mut Vec<u8>) -> Result<(), CodecError> {
    for col in schema.columns() {
        let start = out.len();
        if let Some(value) = row.get(&col.name) {
            write_segment(col, value, out)?;
        }
        // Pad (or, for over-long writes, cut) to exactly the column width.
        out.resize(start + col.width(), 0);
    }
    Ok(())
}

/// Encodes the segment of a single column, padded to its width.
///
/// Lets a caller patch one column of an existing record and leave the other
/// segments byte-for-byte as stored.
pub fn encode_segment(col: &Column, value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(col.width());
    write_segment(col, value, &mut out)?;
    out.resize(col.width(), 0);
    Ok(out)
}

fn write_segment(col: &Column, value: &Value, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let width = col.width();
    match (col.ty, value) {
        (_, Value::Null) => {}

        (Type::Int, Value::Int(n)) => out.write_i64::<LittleEndian>(*n)?,
        (Type::Int, Value::Text(s)) => {
            let n: i64 = s.trim().parse().map_err(|_| CodecError::InvalidInt {
                column: col.name.clone(),
                value: s.clone(),
            })?;
            out.write_i64::<LittleEndian>(n)?;
        }

        (Type::Str32 | Type::Str64, Value::Text(s)) => {
            out.extend_from_slice(truncate_utf8(s, width).as_bytes());
        }
        (Type::Str32 | Type::Str64, Value::Int(n)) => {
            out.extend_from_slice(truncate_utf8(&n.to_string(), width).as_bytes());
        }

        (Type::Blob, Value::Text(token)) => {
            if token.len() > width {
                return Err(CodecError::TokenTooLong {
                    column: col.name.clone(),
                    token: token.clone(),
                    width,
                });
            }
            out.extend_from_slice(token.as_bytes());
        }
        (Type::Blob, Value::Blob(_)) => {
            return Err(CodecError::UnresolvedBlob {
                column: col.name.clone(),
            })
        }

        (ty, other) => {
            return Err(CodecError::TypeMismatch {
                column: col.name.clone(),
                ty,
                found: other.kind(),
            })
        }
    }
    Ok(())
}

/// Decodes one full record. `record` must be at least `schema.record_width()`
/// bytes; a shorter slice yields [`CodecError::TruncatedRecord`].
pub fn decode(schema: &Schema, record: &[u8]) -> Result<Row, CodecError> {
    let expected = schema.record_width();
    if record.len() < expected {
        return Err(CodecError::TruncatedRecord {
            offset: 0,
            got: record.len(),
            expected,
        });
    }

    let mut row = Row::new();
    let mut pos = 0;
    for col in schema.columns() {
        let segment = &record[pos..pos + col.width()];
        pos += col.width();
        row.insert(col.name.clone(), decode_segment(col.ty, segment)?);
    }
    Ok(row)
}

/// Decodes a single column segment.
pub fn decode_segment(ty: Type, segment: &[u8]) -> Result<Value, CodecError> {
    let data = strip_trailing_zeros(segment);
    let value = match ty {
        Type::Int => {
            let mut padded = [0u8; 8];
            padded[..data.len()].copy_from_slice(data);
            Value::Int((&padded[..]).read_i64::<LittleEndian>()?)
        }
        Type::Str32 | Type::Str64 => Value::Text(String::from_utf8_lossy(data).into_owned()),
        Type::Blob if data.is_empty() => Value::Null,
        Type::Blob => Value::Text(String::from_utf8_lossy(data).into_owned()),
    };
    Ok(value)
}

/// Returns `segment` without its trailing `0x00` padding.
#[must_use]
pub fn strip_trailing_zeros(segment: &[u8]) -> &[u8] {
    let end = segment
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    &segment[..end]
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
