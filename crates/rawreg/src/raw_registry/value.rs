//! Type-aware decoding of registry value data.

use crate::entry::ValueData;
use regf::{utf16le_to_string, ValueType};

/// Raw payloads of non-text, non-integer values are embedded only below this
/// length.
pub const MAX_EMBEDDED_REG_VALUE: usize = 4096;

/// Decode a value's raw bytes according to its declared type.
///
/// Returns `None` when the payload is omitted (large opaque data).
pub fn decode_value(value_type: ValueType, data: &[u8]) -> Option<ValueData> {
    match value_type {
        ValueType::Sz | ValueType::ExpandSz | ValueType::MultiSz => {
            Some(ValueData::Text(decode_text(data)))
        }
        ValueType::Dword => Some(ValueData::Integer(le_uint(data, 4))),
        ValueType::Qword => Some(ValueData::Integer(le_uint(data, 8))),
        ValueType::DwordBigEndian => Some(ValueData::Integer(be_uint(data, 4))),
        _ if data.len() < MAX_EMBEDDED_REG_VALUE => Some(ValueData::Bytes(data.to_vec())),
        _ => None,
    }
}

/// Decode text and strip trailing NUL padding.
///
/// Stored strings are UTF-16LE, where ASCII-range text always carries zero
/// bytes. Data with no NUL left after trimming the padding that is valid
/// UTF-8 is taken as narrow text.
fn decode_text(data: &[u8]) -> String {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let trimmed = &data[..end];

    if !trimmed.contains(&0) {
        if let Ok(text) = std::str::from_utf8(trimmed) {
            return text.to_string();
        }
    }

    utf16le_to_string(data).trim_end_matches('\0').to_string()
}

/// Little-endian unsigned integer of at most `width` bytes, zero-extended.
fn le_uint(data: &[u8], width: usize) -> u64 {
    data.iter()
        .take(width)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
}

/// Big-endian unsigned integer of at most `width` bytes, zero-extended.
fn be_uint(data: &[u8], width: usize) -> u64 {
    data.iter()
        .take(width)
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
