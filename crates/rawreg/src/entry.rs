//! Generic directory entries produced by accessors.
//!
//! Registry keys list as directories and values as leaves. A value has no
//! timestamp of its own: all three of its times come from the parent key's
//! last write time.

use crate::error::{AccessorError, AccessorResult};
use base64::Engine;
use regf::KeyNode;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Directory bit reported in [`Entry::mode`].
pub const MODE_DIR: u32 = 0o040000;

/// A timestamp as `{sec, nsec}`.
///
/// `nsec` carries the full timestamp in nanoseconds since the Unix epoch,
/// not just the sub-second remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeVal {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeVal {
    pub fn from_unix_nanos(nanos: i64) -> Self {
        TimeVal {
            sec: nanos.div_euclid(1_000_000_000),
            nsec: nanos,
        }
    }
}

/// Decoded value payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueData {
    Text(String),
    Integer(u64),
    Bytes(Vec<u8>),
}

impl Serialize for ValueData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValueData::Text(s) => serializer.serialize_str(s),
            ValueData::Integer(n) => serializer.serialize_u64(*n),
            ValueData::Bytes(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

/// Fields shared by every entry.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub name: String,
    pub full_path: String,
    pub mtime: TimeVal,
    pub ctime: TimeVal,
    pub atime: TimeVal,
}

impl EntryHeader {
    fn from_key_times(name: String, full_path: String, key: &KeyNode) -> Self {
        let time = TimeVal::from_unix_nanos(key.last_write_nanos());
        EntryHeader {
            name,
            full_path,
            mtime: time,
            ctime: time,
            atime: time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub header: EntryHeader,
}

#[derive(Debug, Clone)]
pub struct ValueEntry {
    pub header: EntryHeader,
    /// `REG_*` type name.
    pub value_type: String,
    /// Length of the raw value bytes.
    pub data_len: usize,
    /// Size declared by the value cell.
    pub size: u64,
    pub data: Option<ValueData>,
    /// The key this value belongs to.
    pub parent: Arc<KeyNode>,
}

/// A directory entry: a registry key or a registry value.
#[derive(Debug, Clone)]
pub enum Entry {
    Key(KeyEntry),
    Value(ValueEntry),
}

impl Entry {
    /// Entry for a subkey.
    pub fn key(node: &KeyNode, full_path: String) -> Self {
        Entry::Key(KeyEntry {
            header: EntryHeader::from_key_times(node.name.clone(), full_path, node),
        })
    }

    /// Entry for a value of `parent`.
    pub fn value(value: &regf::KeyValue, parent: Arc<KeyNode>, full_path: String) -> Self {
        Entry::Value(ValueEntry {
            header: EntryHeader::from_key_times(value.name.clone(), full_path, &parent),
            value_type: value.value_type.name().to_string(),
            data_len: value.data.len(),
            size: u64::from(value.data_size),
            data: crate::raw_registry::value::decode_value(value.value_type, &value.data),
            parent,
        })
    }

    pub fn header(&self) -> &EntryHeader {
        match self {
            Entry::Key(k) => &k.header,
            Entry::Value(v) => &v.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn full_path(&self) -> &str {
        &self.header().full_path
    }

    pub fn mtime(&self) -> TimeVal {
        self.header().mtime
    }

    pub fn ctime(&self) -> TimeVal {
        self.header().ctime
    }

    pub fn atime(&self) -> TimeVal {
        self.header().atime
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Key(_))
    }

    pub fn size(&self) -> u64 {
        match self {
            Entry::Key(_) => 0,
            Entry::Value(v) => v.size,
        }
    }

    pub fn mode(&self) -> u32 {
        match self {
            Entry::Key(_) => 0o755 | MODE_DIR,
            Entry::Value(_) => 0o755,
        }
    }

    pub fn is_link(&self) -> bool {
        false
    }

    /// Registry entries are never links.
    pub fn get_link(&self) -> AccessorResult<String> {
        Err(AccessorError::not_implemented("get_link", "raw_reg"))
    }

    /// The `Data` object of the serialized form.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Entry::Key(_) => serde_json::json!({ "type": "Key" }),
            Entry::Value(v) => serde_json::to_value(ValueDataRecord::from(v))
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Serialize)]
struct KeyDataRecord {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ValueDataRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a ValueData>,
}

impl<'a> From<&'a ValueEntry> for ValueDataRecord<'a> {
    fn from(v: &'a ValueEntry) -> Self {
        ValueDataRecord {
            kind: &v.value_type,
            data_len: v.data_len,
            data: v.data.as_ref(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeyRecord<'a> {
    full_path: &'a str,
    data: KeyDataRecord,
    mtime: TimeVal,
    ctime: TimeVal,
    atime: TimeVal,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ValueRecord<'a> {
    full_path: &'a str,
    #[serde(rename = "Type")]
    value_type: &'a str,
    data: ValueDataRecord<'a>,
    mtime: TimeVal,
    ctime: TimeVal,
    atime: TimeVal,
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let h = self.header();
        match self {
            Entry::Key(_) => KeyRecord {
                full_path: &h.full_path,
                data: KeyDataRecord { kind: "Key" },
                mtime: h.mtime,
                ctime: h.ctime,
                atime: h.atime,
            }
            .serialize(serializer),
            Entry::Value(v) => ValueRecord {
                full_path: &h.full_path,
                value_type: &v.value_type,
                data: ValueDataRecord::from(v),
                mtime: h.mtime,
                ctime: h.ctime,
                atime: h.atime,
            }
            .serialize(serializer),
        }
    }
}
