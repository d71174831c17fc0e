//! Key, value and value-type definitions.

use chrono::{DateTime, Utc};
use std::fmt;

/// Difference between the FILETIME epoch (1601-01-01) and the Unix epoch,
/// in 100ns intervals.
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;

/// A parsed registry key node (NK cell).
#[derive(Debug, Clone)]
pub struct KeyNode {
    /// Cell offset (relative to hive data).
    pub cell_offset: u32,
    /// Key name.
    pub name: String,
    /// NK flags.
    pub flags: u16,
    /// Last write time as a raw FILETIME.
    pub last_written: u64,
    /// Number of subkeys.
    pub subkey_count: u32,
    /// Subkey list cell offset.
    pub subkey_list_offset: u32,
    /// Number of values.
    pub value_count: u32,
    /// Value list cell offset.
    pub value_list_offset: u32,
    /// Class name, when present and readable.
    pub class_name: Option<String>,
}

impl KeyNode {
    /// Last write time in nanoseconds since the Unix epoch.
    pub fn last_write_nanos(&self) -> i64 {
        filetime_to_unix_nanos(self.last_written)
    }

    /// Last write time as a UTC timestamp.
    pub fn last_write_time(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.last_written)
    }
}

/// A parsed registry value (VK cell plus its data).
#[derive(Debug, Clone)]
pub struct KeyValue {
    /// Value name (empty string = "(Default)" value).
    pub name: String,
    /// Declared value type.
    pub value_type: ValueType,
    /// Data size as declared in the VK cell (resident bit stripped).
    pub data_size: u32,
    /// Raw value data bytes.
    pub data: Vec<u8>,
}

/// Registry value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    None,
    Sz,
    ExpandSz,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiSz,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
    Unknown(u32),
}

impl ValueType {
    /// The `REG_*` name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::None => "REG_NONE",
            ValueType::Sz => "REG_SZ",
            ValueType::ExpandSz => "REG_EXPAND_SZ",
            ValueType::Binary => "REG_BINARY",
            ValueType::Dword => "REG_DWORD",
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN",
            ValueType::Link => "REG_LINK",
            ValueType::MultiSz => "REG_MULTI_SZ",
            ValueType::ResourceList => "REG_RESOURCE_LIST",
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR",
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST",
            ValueType::Qword => "REG_QWORD",
            ValueType::Unknown(_) => "REG_UNKNOWN",
        }
    }

    /// The numeric type code stored in the VK cell.
    pub fn code(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::Sz => 1,
            ValueType::ExpandSz => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiSz => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(code) => *code,
        }
    }
}

impl From<u32> for ValueType {
    fn from(code: u32) -> Self {
        match code {
            0 => ValueType::None,
            1 => ValueType::Sz,
            2 => ValueType::ExpandSz,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiSz,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            other => ValueType::Unknown(other),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert a FILETIME (100ns ticks since 1601) to nanoseconds since the Unix
/// epoch, saturating at the `i64` range.
pub fn filetime_to_unix_nanos(filetime: u64) -> i64 {
    let nanos = (filetime as i128 - FILETIME_UNIX_EPOCH) * 100;
    nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Convert a FILETIME to a UTC timestamp. `None` if out of chrono's range.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let nanos = filetime_to_unix_nanos(filetime);
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, subsec)
}

/// Decode UTF-16LE bytes, keeping embedded NULs. A trailing odd byte is
/// ignored.
pub fn utf16le_to_string(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode a UTF-16LE name, stopping at the first NUL.
pub(crate) fn read_utf16le_string(data: &[u8]) -> String {
    let chars: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&c| c != 0)
        .collect();
    String::from_utf16_lossy(&chars)
}

/// Decode an ASCII-compressed name. Compressed names are Latin-1.
pub(crate) fn read_latin1_string(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16le_decode() {
        // "SAM" in UTF-16LE
        let data = [b'S', 0, b'A', 0, b'M', 0, 0, 0];
        assert_eq!(read_utf16le_string(&data), "SAM");
    }

    #[test]
    fn test_utf16le_decode_no_null() {
        let data = [b'H', 0, b'i', 0];
        assert_eq!(read_utf16le_string(&data), "Hi");
    }

    #[test]
    fn test_utf16le_keeps_embedded_nulls() {
        let data = [b'a', 0, 0, 0, b'b', 0, 0, 0];
        assert_eq!(utf16le_to_string(&data), "a\0b\0");
    }

    #[test]
    fn test_latin1_name() {
        assert_eq!(read_latin1_string(&[b'C', 0xE9]), "C\u{e9}");
    }

    #[test]
    fn test_value_type_names() {
        assert_eq!(ValueType::from(1).name(), "REG_SZ");
        assert_eq!(ValueType::from(5), ValueType::DwordBigEndian);
        assert_eq!(ValueType::from(11).to_string(), "REG_QWORD");
        assert_eq!(ValueType::from(0x99), ValueType::Unknown(0x99));
        assert_eq!(ValueType::Unknown(0x99).code(), 0x99);
    }

    #[test]
    fn test_filetime_conversion() {
        // 2009-07-25 23:01:36.6875 UTC
        let filetime = 128_930_364_966_875_000u64;
        let nanos = filetime_to_unix_nanos(filetime);
        assert_eq!(nanos, 1_248_562_896_687_500_000);
        let dt = filetime_to_datetime(filetime).unwrap();
        assert_eq!(dt.timestamp(), 1_248_562_896);
        assert_eq!(dt.timestamp_subsec_nanos(), 687_500_000);
    }

    #[test]
    fn test_filetime_saturates() {
        // 1601 is further from 1970 than i64 nanoseconds reach.
        assert_eq!(filetime_to_unix_nanos(0), i64::MIN);
        assert_eq!(filetime_to_unix_nanos(u64::MAX), i64::MAX);
    }
}
