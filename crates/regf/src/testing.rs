//! Synthetic hive construction for tests.
//!
//! Builds a well-formed regf image in memory: a base block, one hbin and
//! nk/vk/lf/value-list/db cells laid out sequentially.

use crate::hive::{
    BIG_DATA_SEGMENT_SIZE, DB_SIGNATURE, HBASE_BLOCK_SIZE, KEY_COMP_NAME, KEY_HIVE_ENTRY,
    LF_SIGNATURE, NK_CLASS_NAME_LENGTH, NK_CLASS_NAME_OFFSET, NK_FLAGS, NK_NAME_LENGTH,
    NK_NAME_START, NK_SIGNATURE, NK_SUBKEY_COUNT, NK_SUBKEY_LIST, NK_TIMESTAMP, NK_VALUE_COUNT,
    NK_VALUE_LIST, VALUE_COMP_NAME, VK_DATA_LENGTH, VK_DATA_OFFSET, VK_FLAGS, VK_NAME_LENGTH,
    VK_NAME_START, VK_SIGNATURE, VK_TYPE,
};
use crate::types::ValueType;

/// Default key timestamp: 2020-01-01T00:00:00Z.
pub const DEFAULT_FILETIME: u64 = 132_223_104_000_000_000;

const HBIN_HEADER_SIZE: usize = 0x20;
const NO_CELL: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
struct KeySpec {
    name: String,
    last_written: u64,
    subkeys: Vec<KeySpec>,
    values: Vec<ValueSpec>,
}

#[derive(Debug, Clone)]
struct ValueSpec {
    name: String,
    value_type: ValueType,
    data: Vec<u8>,
}

impl KeySpec {
    fn new(name: &str) -> Self {
        KeySpec {
            name: name.to_string(),
            last_written: DEFAULT_FILETIME,
            subkeys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Find or create the key at `path` below this one.
    fn descend(&mut self, path: &[&str]) -> &mut KeySpec {
        let mut current = self;
        for component in path {
            let index = match current.subkeys.iter().position(|k| k.name == *component) {
                Some(i) => i,
                None => {
                    current.subkeys.push(KeySpec::new(component));
                    current.subkeys.len() - 1
                }
            };
            current = &mut current.subkeys[index];
        }
        current
    }
}

/// Builder for an in-memory registry hive.
///
/// ```rust,ignore
/// let bytes = HiveBuilder::new()
///     .key(&["Software", "Vendor"])
///     .value(&["Software"], "Version", ValueType::Sz, utf16("1.0.0"))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct HiveBuilder {
    root: KeySpec,
    file_name: String,
}

impl Default for HiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HiveBuilder {
    /// A hive whose root key is named `ROOT`.
    pub fn new() -> Self {
        HiveBuilder {
            root: KeySpec::new("ROOT"),
            file_name: "\\SOFTWARE".to_string(),
        }
    }

    /// Ensure the key at `path` exists.
    pub fn key(mut self, path: &[&str]) -> Self {
        self.root.descend(path);
        self
    }

    /// Add a value under the key at `path`, creating the key if needed.
    pub fn value(mut self, path: &[&str], name: &str, value_type: ValueType, data: Vec<u8>) -> Self {
        self.root.descend(path).values.push(ValueSpec {
            name: name.to_string(),
            value_type,
            data,
        });
        self
    }

    /// Set the last write FILETIME of the key at `path`.
    pub fn last_written(mut self, path: &[&str], filetime: u64) -> Self {
        self.root.descend(path).last_written = filetime;
        self
    }

    /// Serialize the hive.
    pub fn build(&self) -> Vec<u8> {
        let mut writer = CellWriter::new();
        let root_offset = writer.write_key(&self.root, true);
        writer.finish(root_offset, &self.file_name)
    }
}

/// Appends cells to the hive data area (which starts with the hbin header).
struct CellWriter {
    data: Vec<u8>,
}

impl CellWriter {
    fn new() -> Self {
        CellWriter {
            data: vec![0u8; HBIN_HEADER_SIZE],
        }
    }

    /// Write an allocated cell and return its offset relative to hive data.
    fn write_cell(&mut self, payload: &[u8]) -> u32 {
        let offset = self.data.len() as u32;
        let size = (4 + payload.len()).div_ceil(8) * 8;
        self.data.extend_from_slice(&(-(size as i32)).to_le_bytes());
        self.data.extend_from_slice(payload);
        self.data.resize(offset as usize + size, 0);
        offset
    }

    fn write_key(&mut self, key: &KeySpec, is_root: bool) -> u32 {
        let subkey_offsets: Vec<(u32, &str)> = key
            .subkeys
            .iter()
            .map(|k| (self.write_key(k, false), k.name.as_str()))
            .collect();
        let value_offsets: Vec<u32> = key.values.iter().map(|v| self.write_value(v)).collect();

        let subkey_list = if subkey_offsets.is_empty() {
            NO_CELL
        } else {
            let mut lf = Vec::with_capacity(4 + subkey_offsets.len() * 8);
            lf.extend_from_slice(&LF_SIGNATURE.to_le_bytes());
            lf.extend_from_slice(&(subkey_offsets.len() as u16).to_le_bytes());
            for (offset, name) in &subkey_offsets {
                lf.extend_from_slice(&offset.to_le_bytes());
                let mut hint = [0u8; 4];
                for (slot, b) in hint.iter_mut().zip(name.bytes()) {
                    *slot = b;
                }
                lf.extend_from_slice(&hint);
            }
            self.write_cell(&lf)
        };

        let value_list = if value_offsets.is_empty() {
            NO_CELL
        } else {
            let list: Vec<u8> = value_offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
            self.write_cell(&list)
        };

        let (name_bytes, compressed) = encode_name(&key.name);
        let mut nk = vec![0u8; NK_NAME_START + name_bytes.len()];
        put_u16(&mut nk, 0, NK_SIGNATURE);
        let mut flags = if compressed { KEY_COMP_NAME } else { 0 };
        if is_root {
            flags |= KEY_HIVE_ENTRY;
        }
        put_u16(&mut nk, NK_FLAGS, flags);
        nk[NK_TIMESTAMP..NK_TIMESTAMP + 8].copy_from_slice(&key.last_written.to_le_bytes());
        put_u32(&mut nk, NK_SUBKEY_COUNT, subkey_offsets.len() as u32);
        put_u32(&mut nk, NK_SUBKEY_LIST, subkey_list);
        put_u32(&mut nk, NK_VALUE_COUNT, value_offsets.len() as u32);
        put_u32(&mut nk, NK_VALUE_LIST, value_list);
        put_u32(&mut nk, NK_CLASS_NAME_OFFSET, NO_CELL);
        put_u16(&mut nk, NK_CLASS_NAME_LENGTH, 0);
        put_u16(&mut nk, NK_NAME_LENGTH, name_bytes.len() as u16);
        nk[NK_NAME_START..].copy_from_slice(&name_bytes);
        self.write_cell(&nk)
    }

    fn write_value(&mut self, value: &ValueSpec) -> u32 {
        let length = value.data.len();
        let (length_field, offset_field) = if length <= 4 {
            let mut inline = [0u8; 4];
            inline[..length].copy_from_slice(&value.data);
            (length as u32 | 0x8000_0000, u32::from_le_bytes(inline))
        } else if length > BIG_DATA_SEGMENT_SIZE {
            (length as u32, self.write_big_data(&value.data))
        } else {
            (length as u32, self.write_cell(&value.data))
        };

        let (name_bytes, compressed) = encode_name(&value.name);
        let mut vk = vec![0u8; VK_NAME_START + name_bytes.len()];
        put_u16(&mut vk, 0, VK_SIGNATURE);
        put_u16(&mut vk, VK_NAME_LENGTH, name_bytes.len() as u16);
        put_u32(&mut vk, VK_DATA_LENGTH, length_field);
        put_u32(&mut vk, VK_DATA_OFFSET, offset_field);
        put_u32(&mut vk, VK_TYPE, value.value_type.code());
        put_u16(&mut vk, VK_FLAGS, if compressed { VALUE_COMP_NAME } else { 0 });
        vk[VK_NAME_START..].copy_from_slice(&name_bytes);
        self.write_cell(&vk)
    }

    fn write_big_data(&mut self, data: &[u8]) -> u32 {
        let segments: Vec<u32> = data
            .chunks(BIG_DATA_SEGMENT_SIZE)
            .map(|chunk| self.write_cell(chunk))
            .collect();
        let list: Vec<u8> = segments.iter().flat_map(|o| o.to_le_bytes()).collect();
        let list_offset = self.write_cell(&list);

        let mut db = vec![0u8; 8];
        put_u16(&mut db, 0, DB_SIGNATURE);
        put_u16(&mut db, 2, segments.len() as u16);
        put_u32(&mut db, 4, list_offset);
        self.write_cell(&db)
    }

    fn finish(mut self, root_offset: u32, file_name: &str) -> Vec<u8> {
        let hive_length = self.data.len().div_ceil(4096) * 4096;
        self.data.resize(hive_length, 0);

        // hbin header: signature, offset of this bin, bin size.
        self.data[0..4].copy_from_slice(b"hbin");
        put_u32(&mut self.data, 4, 0);
        put_u32(&mut self.data, 8, hive_length as u32);

        let mut header = vec![0u8; HBASE_BLOCK_SIZE as usize];
        header[0..4].copy_from_slice(b"regf");
        put_u32(&mut header, 0x04, 1);
        put_u32(&mut header, 0x08, 1);
        header[0x0C..0x14].copy_from_slice(&DEFAULT_FILETIME.to_le_bytes());
        put_u32(&mut header, 0x14, 1);
        put_u32(&mut header, 0x18, 5);
        put_u32(&mut header, 0x20, 1);
        put_u32(&mut header, 0x24, root_offset);
        put_u32(&mut header, 0x28, hive_length as u32);
        for (i, unit) in file_name.encode_utf16().take(31).enumerate() {
            header[0x30 + i * 2..0x32 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }

        header.extend_from_slice(&self.data);
        header
    }
}

/// Names that fit in Latin-1 are stored compressed, others as UTF-16LE.
fn encode_name(name: &str) -> (Vec<u8>, bool) {
    if name.chars().all(|c| (c as u32) < 0x100) {
        (name.chars().map(|c| c as u8).collect(), true)
    } else {
        (name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(), false)
    }
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
