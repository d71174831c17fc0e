//! Hive parsing and key/value navigation.
//!
//! Registry on-disk format:
//! ```text
//! +0x0000  HBASE_BLOCK ("regf" signature, 4096 bytes)
//!   +0x0000  Signature: "regf" (4 bytes)
//!   +0x0004  Sequence1 (u32), +0x0008 Sequence2 (u32)
//!   +0x000C  LastWritten (FILETIME)
//!   +0x0014  Major (u32), +0x0018 Minor (u32)
//!   +0x0024  RootCellOffset (u32): offset of root NK cell within hive data
//!   +0x0028  HiveLength (u32): total hive data length
//!   +0x0030  FileName (UTF-16LE, 64 bytes)
//! +0x1000  HBIN #0 ("hbin" signature)
//!   Then cells: each cell is |size(i32)|data...|
//!     - Allocated cells have negative size (absolute value = cell size)
//!     - Free cells have positive size
//!   Cell types identified by 2-byte signature:
//!     "nk": key node (CM_KEY_NODE)
//!     "vk": key value (CM_KEY_VALUE)
//!     "lf"/"lh": fast-leaf subkey list
//!     "ri": index root (for large subkey counts)
//!     "li": leaf index
//!     "db": big data (values larger than 16344 bytes)
//! ```

use crate::error::{HiveError, HiveResult};
use crate::reader::{i32_at, u16_at, u32_at, u64_at, HiveSource};
use crate::types::{
    read_latin1_string, read_utf16le_string, KeyNode, KeyValue, ValueType,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

// ── Constants ────────────────────────────────────────────────────────

const REGF_SIGNATURE: &[u8; 4] = b"regf";
const HBIN_SIGNATURE: &[u8; 4] = b"hbin";
pub(crate) const NK_SIGNATURE: u16 = 0x6B6E; // "nk" little-endian
pub(crate) const VK_SIGNATURE: u16 = 0x6B76; // "vk" little-endian
pub(crate) const LF_SIGNATURE: u16 = 0x666C; // "lf" little-endian
pub(crate) const LH_SIGNATURE: u16 = 0x686C; // "lh" little-endian
pub(crate) const RI_SIGNATURE: u16 = 0x6972; // "ri" little-endian
pub(crate) const LI_SIGNATURE: u16 = 0x696C; // "li" little-endian
pub(crate) const DB_SIGNATURE: u16 = 0x6264; // "db" little-endian

/// HBASE_BLOCK is always 4096 bytes.
pub(crate) const HBASE_BLOCK_SIZE: u64 = 4096;

const REGF_SEQUENCE1: usize = 0x04;
const REGF_SEQUENCE2: usize = 0x08;
const REGF_LAST_WRITTEN: usize = 0x0C;
const REGF_MAJOR_VERSION: usize = 0x14;
const REGF_MINOR_VERSION: usize = 0x18;
const REGF_ROOT_CELL_OFFSET: usize = 0x24;
const REGF_HIVE_LENGTH: usize = 0x28;
const REGF_FILE_NAME: usize = 0x30;
const REGF_FILE_NAME_LENGTH: usize = 64;

// NK cell offsets (relative to the signature, after the 4-byte cell size)
pub(crate) const NK_FLAGS: usize = 2;
pub(crate) const NK_TIMESTAMP: usize = 4;
pub(crate) const NK_SUBKEY_COUNT: usize = 20;
pub(crate) const NK_SUBKEY_LIST: usize = 28;
pub(crate) const NK_VALUE_COUNT: usize = 36;
pub(crate) const NK_VALUE_LIST: usize = 40;
pub(crate) const NK_CLASS_NAME_OFFSET: usize = 48;
pub(crate) const NK_NAME_LENGTH: usize = 72;
pub(crate) const NK_CLASS_NAME_LENGTH: usize = 74;
pub(crate) const NK_NAME_START: usize = 76;

/// NK flag: KEY_HIVE_ENTRY (root key of the hive).
pub(crate) const KEY_HIVE_ENTRY: u16 = 0x0004;
/// NK flag: KEY_COMP_NAME (name is ASCII, not UTF-16).
pub(crate) const KEY_COMP_NAME: u16 = 0x0020;

// VK cell offsets (relative to the signature)
pub(crate) const VK_NAME_LENGTH: usize = 2;
pub(crate) const VK_DATA_LENGTH: usize = 4;
pub(crate) const VK_DATA_OFFSET: usize = 8;
pub(crate) const VK_TYPE: usize = 12;
pub(crate) const VK_FLAGS: usize = 16;
pub(crate) const VK_NAME_START: usize = 20;

/// VK flag: value name is ASCII (compressed).
pub(crate) const VALUE_COMP_NAME: u16 = 0x0001;

/// Bit 31 of the VK data length: data lives inline in the offset field.
const VK_DATA_RESIDENT: u32 = 0x8000_0000;

/// Largest payload a single data cell carries before big-data segmentation.
pub(crate) const BIG_DATA_SEGMENT_SIZE: usize = 16344;

const NO_CELL: u32 = 0xFFFF_FFFF;
const MAX_LIST_ENTRIES: usize = 0xFFFF;
const MAX_RI_DEPTH: usize = 4;
/// Value data larger than this is treated as corruption.
const MAX_VALUE_DATA: usize = 64 * 1024 * 1024;

/// Accumulator for one subkey enumeration.
struct SubkeyWalk<'a> {
    limit: usize,
    offsets: &'a mut Vec<u32>,
    /// Sub-lists already reached through an index root.
    visited: HashSet<u32>,
}

// ── Base block ───────────────────────────────────────────────────────

/// The parsed HBASE_BLOCK header.
#[derive(Debug, Clone)]
pub struct BaseBlock {
    pub sequence1: u32,
    pub sequence2: u32,
    /// Raw FILETIME of the last hive write.
    pub last_written: u64,
    pub major_version: u32,
    pub minor_version: u32,
    /// Root cell offset (relative to hive data, i.e., after HBASE_BLOCK).
    pub root_cell_offset: u32,
    /// Hive data length from the header.
    pub hive_length: u32,
    /// Embedded file name (e.g. `\??\C:\Windows\System32\config\SAM`).
    pub file_name: String,
}

impl BaseBlock {
    fn parse(header: &[u8]) -> HiveResult<Self> {
        if &header[0..4] != REGF_SIGNATURE {
            return Err(HiveError::BadSignature {
                offset: 0,
                expected: "regf",
            });
        }

        let sequence1 = u32_at(header, REGF_SEQUENCE1);
        let sequence2 = u32_at(header, REGF_SEQUENCE2);
        let root_cell_offset = u32_at(header, REGF_ROOT_CELL_OFFSET);
        let hive_length = u32_at(header, REGF_HIVE_LENGTH);

        // Dirty hives can have mismatched sequences, but both zero is garbage.
        if sequence1 == 0 && sequence2 == 0 {
            return Err(HiveError::InvalidHeader(
                "both sequence numbers are zero".into(),
            ));
        }
        if hive_length == 0 {
            return Err(HiveError::InvalidHeader("hive length is zero".into()));
        }
        if root_cell_offset >= hive_length {
            return Err(HiveError::InvalidHeader(format!(
                "root cell offset {:#x} outside hive length {:#x}",
                root_cell_offset, hive_length
            )));
        }

        let name_bytes = &header[REGF_FILE_NAME..REGF_FILE_NAME + REGF_FILE_NAME_LENGTH];

        Ok(BaseBlock {
            sequence1,
            sequence2,
            last_written: u64_at(header, REGF_LAST_WRITTEN),
            major_version: u32_at(header, REGF_MAJOR_VERSION),
            minor_version: u32_at(header, REGF_MINOR_VERSION),
            root_cell_offset,
            hive_length,
            file_name: read_utf16le_string(name_bytes),
        })
    }
}

// ── Hive ─────────────────────────────────────────────────────────────

/// A parsed registry hive.
///
/// Parsing only validates the header and the root key; cells are decoded on
/// demand. The hive is immutable once parsed and can be shared across threads.
pub struct Hive {
    source: Arc<dyn HiveSource>,
    header: BaseBlock,
    /// Hive data length, clamped to what the source actually holds.
    data_length: u32,
}

impl std::fmt::Debug for Hive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hive")
            .field("header", &self.header)
            .field("data_length", &self.data_length)
            .finish()
    }
}

impl Hive {
    /// Parse a hive from a random-access source.
    pub fn parse(source: Arc<dyn HiveSource>) -> HiveResult<Self> {
        let header = source
            .read(0, HBASE_BLOCK_SIZE as usize)
            .map_err(|e| HiveError::Read {
                offset: 0,
                msg: e.to_string(),
            })?;
        if header.len() < HBASE_BLOCK_SIZE as usize {
            return Err(HiveError::InvalidHeader("truncated base block".into()));
        }
        let header = BaseBlock::parse(&header)?;

        let available = source.size().saturating_sub(HBASE_BLOCK_SIZE);
        let data_length = u64::from(header.hive_length).min(available) as u32;

        let hive = Hive {
            source,
            header,
            data_length,
        };

        let hbin = hive.read_raw(HBASE_BLOCK_SIZE, 4)?;
        if hbin.as_slice() != HBIN_SIGNATURE {
            return Err(HiveError::BadSignature {
                offset: HBASE_BLOCK_SIZE,
                expected: "hbin",
            });
        }

        // Validate the root eagerly so a hive that cannot be traversed at all
        // fails at parse time rather than on first listing.
        let root = hive.root()?;
        debug!(
            "regf: parsed hive '{}' (length={:#x}, root='{}')",
            hive.header.file_name, hive.header.hive_length, root.name
        );
        Ok(hive)
    }

    /// The parsed base block.
    pub fn header(&self) -> &BaseBlock {
        &self.header
    }

    /// Read the root key node of this hive.
    pub fn root(&self) -> HiveResult<KeyNode> {
        self.read_key_node(self.header.root_cell_offset)
    }

    /// Navigate to a key by path components, matching names
    /// case-insensitively. Empty components are skipped.
    ///
    /// Returns `None` if any component is missing or any cell on the way is
    /// unreadable; callers get no indication of which component failed.
    pub fn open_key<S: AsRef<str>>(&self, components: &[S]) -> Option<KeyNode> {
        let mut current = match self.root() {
            Ok(root) => root,
            Err(e) => {
                debug!("regf: root key unreadable: {}", e);
                return None;
            }
        };

        for component in components {
            let component = component.as_ref();
            if component.is_empty() {
                continue;
            }
            let wanted = component.to_lowercase();
            let subkeys = match self.subkeys(&current) {
                Ok(s) => s,
                Err(e) => {
                    debug!("regf: subkeys of '{}' unreadable: {}", current.name, e);
                    return None;
                }
            };
            current = subkeys
                .into_iter()
                .find(|k| k.name.to_lowercase() == wanted)?;
        }

        Some(current)
    }

    /// Enumerate subkeys of a key node.
    pub fn subkeys(&self, key: &KeyNode) -> HiveResult<Vec<KeyNode>> {
        if key.subkey_count == 0 || key.subkey_list_offset == NO_CELL {
            return Ok(Vec::new());
        }

        let mut offsets = Vec::new();
        {
            let mut walk = SubkeyWalk {
                limit: key.subkey_count as usize,
                offsets: &mut offsets,
                visited: HashSet::new(),
            };
            self.read_subkey_list(key.subkey_list_offset, 0, &mut walk)?;
        }
        offsets
            .into_iter()
            .map(|off| self.read_key_node(off))
            .collect()
    }

    /// Enumerate values of a key node.
    pub fn values(&self, key: &KeyNode) -> HiveResult<Vec<KeyValue>> {
        if key.value_count == 0 || key.value_list_offset == NO_CELL {
            return Ok(Vec::new());
        }
        let count = key.value_count as usize;
        if count > MAX_LIST_ENTRIES {
            return Err(HiveError::malformed(
                key.cell_offset,
                format!("value count {} is unreasonably large", count),
            ));
        }

        // Value list is a cell containing an array of u32 cell offsets
        let list_data = self.read_cell_bytes(key.value_list_offset, 4 + count * 4)?;
        (0..count)
            .map(|i| self.read_value(u32_at(&list_data, 4 + i * 4)))
            .collect()
    }

    /// Get a named value from a key (case-insensitive).
    pub fn value(&self, key: &KeyNode, name: &str) -> HiveResult<Option<KeyValue>> {
        let wanted = name.to_lowercase();
        Ok(self
            .values(key)?
            .into_iter()
            .find(|v| v.name.to_lowercase() == wanted))
    }

    // ── Cell decoding ────────────────────────────────────────────────

    /// Read raw bytes at an absolute file offset.
    fn read_raw(&self, offset: u64, length: usize) -> HiveResult<Vec<u8>> {
        let bytes = self
            .source
            .read(offset, length)
            .map_err(|e| HiveError::Read {
                offset,
                msg: e.to_string(),
            })?;
        if bytes.len() < length {
            return Err(HiveError::Read {
                offset,
                msg: format!("short read: {} of {} bytes", bytes.len(), length),
            });
        }
        Ok(bytes)
    }

    /// Read raw bytes at a cell offset (relative to hive data base).
    fn read_cell_bytes(&self, cell_offset: u32, length: usize) -> HiveResult<Vec<u8>> {
        let end = u64::from(cell_offset) + length as u64;
        if end > u64::from(self.data_length) {
            return Err(HiveError::CellOutOfBounds {
                offset: cell_offset,
                length,
                hive_length: self.data_length,
            });
        }
        self.read_raw(HBASE_BLOCK_SIZE + u64::from(cell_offset), length)
    }

    /// Absolute size of the cell at `cell_offset` (allocated cells store it
    /// negated).
    fn cell_size(&self, cell_offset: u32) -> HiveResult<usize> {
        let bytes = self.read_cell_bytes(cell_offset, 4)?;
        Ok(i32_at(&bytes, 0).unsigned_abs() as usize)
    }

    /// Read a key node (NK record) at the given cell offset.
    fn read_key_node(&self, cell_offset: u32) -> HiveResult<KeyNode> {
        let cell = self.read_cell_bytes(cell_offset, 4 + NK_NAME_START)?;

        let sig = u16_at(&cell, 4);
        if sig != NK_SIGNATURE {
            return Err(HiveError::malformed(
                cell_offset,
                format!("expected NK signature, got {:#06x}", sig),
            ));
        }

        // All NK offsets are relative to the signature
        let nk = &cell[4..];

        let flags = u16_at(nk, NK_FLAGS);
        let class_name_offset = u32_at(nk, NK_CLASS_NAME_OFFSET);
        let class_name_length = u16_at(nk, NK_CLASS_NAME_LENGTH);
        let name_length = u16_at(nk, NK_NAME_LENGTH) as usize;

        let name = if name_length > 0 {
            let name_data = self.read_cell_bytes(cell_offset, 4 + NK_NAME_START + name_length)?;
            let name_bytes = &name_data[4 + NK_NAME_START..];
            if flags & KEY_COMP_NAME != 0 {
                read_latin1_string(name_bytes)
            } else {
                read_utf16le_string(name_bytes)
            }
        } else {
            String::new()
        };

        // The class name is informational; a bad class cell does not make the
        // key unreadable.
        let class_name = if class_name_length > 0 && class_name_offset != NO_CELL {
            self.read_class_name(class_name_offset, class_name_length).ok()
        } else {
            None
        };

        Ok(KeyNode {
            cell_offset,
            name,
            flags,
            last_written: u64_at(nk, NK_TIMESTAMP),
            subkey_count: u32_at(nk, NK_SUBKEY_COUNT),
            subkey_list_offset: u32_at(nk, NK_SUBKEY_LIST),
            value_count: u32_at(nk, NK_VALUE_COUNT),
            value_list_offset: u32_at(nk, NK_VALUE_LIST),
            class_name,
        })
    }

    /// Read a class name from a cell. Class names are stored as UTF-16LE.
    fn read_class_name(&self, cell_offset: u32, length: u16) -> HiveResult<String> {
        let cell = self.read_cell_bytes(cell_offset, 4 + length as usize)?;
        Ok(read_utf16le_string(&cell[4..]))
    }

    /// Read a subkey list (lf/lh/ri/li record), collecting child cell offsets.
    ///
    /// The total is capped at the key's subkey count and an index root may
    /// reference each sub-list only once, so a crafted fan-out cannot expand
    /// past what the hive itself holds.
    fn read_subkey_list(
        &self,
        cell_offset: u32,
        depth: usize,
        walk: &mut SubkeyWalk<'_>,
    ) -> HiveResult<()> {
        // Cell: i32 size | u16 sig | u16 count | entries...
        let header = self.read_cell_bytes(cell_offset, 4 + 4)?;
        let sig = u16_at(&header, 4);
        let count = u16_at(&header, 6) as usize;

        let entry_size = match sig {
            // u32 cell_offset + u32 hash
            LF_SIGNATURE | LH_SIGNATURE => 8,
            LI_SIGNATURE | RI_SIGNATURE => 4,
            _ => {
                return Err(HiveError::malformed(
                    cell_offset,
                    format!("unknown subkey list signature {:#06x}", sig),
                ))
            }
        };

        let data = self.read_cell_bytes(cell_offset, 8 + count * entry_size)?;
        let entries = (0..count).map(|i| u32_at(&data, 8 + i * entry_size));

        if sig != RI_SIGNATURE {
            if walk.offsets.len() + count > walk.limit {
                return Err(HiveError::malformed(
                    cell_offset,
                    format!("subkey lists exceed the key's subkey count {}", walk.limit),
                ));
            }
            walk.offsets.extend(entries);
            return Ok(());
        }

        // Index root: each entry points to another lf/lh/li list.
        if depth >= MAX_RI_DEPTH {
            return Err(HiveError::malformed(cell_offset, "index root nested too deeply"));
        }
        for sub_list_offset in entries {
            if !walk.visited.insert(sub_list_offset) {
                return Err(HiveError::malformed(
                    cell_offset,
                    format!("index root repeats sub-list {:#x}", sub_list_offset),
                ));
            }
            self.read_subkey_list(sub_list_offset, depth + 1, walk)?;
        }
        Ok(())
    }

    /// Read a single value (VK record).
    fn read_value(&self, cell_offset: u32) -> HiveResult<KeyValue> {
        let header = self.read_cell_bytes(cell_offset, 4 + VK_NAME_START)?;

        let sig = u16_at(&header, 4);
        if sig != VK_SIGNATURE {
            return Err(HiveError::malformed(
                cell_offset,
                format!("expected VK signature, got {:#06x}", sig),
            ));
        }

        let vk = &header[4..];

        let name_length = u16_at(vk, VK_NAME_LENGTH) as usize;
        let data_length_raw = u32_at(vk, VK_DATA_LENGTH);
        let data_offset = u32_at(vk, VK_DATA_OFFSET);
        let value_type = ValueType::from(u32_at(vk, VK_TYPE));
        let vk_flags = u16_at(vk, VK_FLAGS);

        let name = if name_length > 0 {
            let name_data = self.read_cell_bytes(cell_offset, 4 + VK_NAME_START + name_length)?;
            let name_bytes = &name_data[4 + VK_NAME_START..];
            if vk_flags & VALUE_COMP_NAME != 0 {
                read_latin1_string(name_bytes)
            } else {
                read_utf16le_string(name_bytes)
            }
        } else {
            String::new() // (Default) value
        };

        let data_is_resident = data_length_raw & VK_DATA_RESIDENT != 0;
        let data_size = data_length_raw & !VK_DATA_RESIDENT;
        let data_length = data_size as usize;

        let data = if data_length == 0 {
            Vec::new()
        } else if data_is_resident {
            let inline_len = std::cmp::min(data_length, 4);
            data_offset.to_le_bytes()[..inline_len].to_vec()
        } else {
            self.read_value_data(data_offset, data_length)?
        };

        Ok(KeyValue {
            name,
            value_type,
            data_size,
            data,
        })
    }

    /// Read value data from a data cell or a big-data (db) record.
    fn read_value_data(&self, cell_offset: u32, length: usize) -> HiveResult<Vec<u8>> {
        if length > MAX_VALUE_DATA {
            return Err(HiveError::malformed(
                cell_offset,
                format!("value data length {} is unreasonably large", length),
            ));
        }

        if length > BIG_DATA_SEGMENT_SIZE {
            let head = self.read_cell_bytes(cell_offset, 4 + 2)?;
            if u16_at(&head, 4) == DB_SIGNATURE {
                return self.read_big_data(cell_offset, length);
            }
        }

        let cell_size = self.cell_size(cell_offset)?;
        if cell_size < 4 + length {
            return Err(HiveError::malformed(
                cell_offset,
                format!("data cell of {} bytes cannot hold {} bytes", cell_size, length),
            ));
        }
        let cell = self.read_cell_bytes(cell_offset, 4 + length)?;
        Ok(cell[4..].to_vec())
    }

    /// Reassemble value data split across big-data segments.
    fn read_big_data(&self, cell_offset: u32, length: usize) -> HiveResult<Vec<u8>> {
        // Cell: i32 size | "db" | u16 segment count | u32 segment list offset
        let db = self.read_cell_bytes(cell_offset, 4 + 8)?;
        let segment_count = u16_at(&db, 6) as usize;
        let list_offset = u32_at(&db, 8);

        let list = self.read_cell_bytes(list_offset, 4 + segment_count * 4)?;
        let mut data = Vec::with_capacity(length);
        for i in 0..segment_count {
            if data.len() >= length {
                break;
            }
            let segment_offset = u32_at(&list, 4 + i * 4);
            let wanted = std::cmp::min(BIG_DATA_SEGMENT_SIZE, length - data.len());
            let segment = self.read_cell_bytes(segment_offset, 4 + wanted)?;
            data.extend_from_slice(&segment[4..]);
        }

        if data.len() < length {
            return Err(HiveError::malformed(
                cell_offset,
                format!("big data holds {} of {} bytes", data.len(), length),
            ));
        }
        Ok(data)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HiveBuilder;

    fn parse(bytes: Vec<u8>) -> Hive {
        Hive::parse(Arc::new(bytes)).unwrap()
    }

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_parse_minimal_hive() {
        let hive = parse(HiveBuilder::new().build());
        let root = hive.root().unwrap();
        assert_eq!(root.name, "ROOT");
        assert!(root.flags & KEY_HIVE_ENTRY != 0);
        assert_eq!(root.subkey_count, 0);
        assert_eq!(root.value_count, 0);
        assert_eq!(hive.header().file_name, "\\SOFTWARE");
    }

    #[test]
    fn test_open_key_empty_path_is_root() {
        let hive = parse(HiveBuilder::new().build());
        let empty: [&str; 0] = [];
        assert_eq!(hive.open_key(&empty).unwrap().name, "ROOT");
        assert_eq!(hive.open_key(&["", ""]).unwrap().name, "ROOT");
    }

    #[test]
    fn test_open_key_nested_case_insensitive() {
        let bytes = HiveBuilder::new()
            .key(&["Software", "Vendor", "Product"])
            .build();
        let hive = parse(bytes);
        let key = hive.open_key(&["SOFTWARE", "vendor", "Product"]).unwrap();
        assert_eq!(key.name, "Product");
    }

    #[test]
    fn test_open_key_missing_component() {
        let hive = parse(HiveBuilder::new().key(&["Software"]).build());
        assert!(hive.open_key(&["Software", "Missing"]).is_none());
        assert!(hive.open_key(&["Missing", "Software"]).is_none());
    }

    #[test]
    fn test_subkeys_and_timestamps() {
        let bytes = HiveBuilder::new()
            .key(&["Software", "A"])
            .key(&["Software", "B"])
            .last_written(&["Software", "B"], 128_930_364_966_875_000)
            .build();
        let hive = parse(bytes);
        let software = hive.open_key(&["Software"]).unwrap();
        let subkeys = hive.subkeys(&software).unwrap();
        let names: Vec<_> = subkeys.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(subkeys[1].last_written, 128_930_364_966_875_000);
        assert_eq!(subkeys[1].last_write_nanos(), 1_248_562_896_687_500_000);
    }

    #[test]
    fn test_unicode_key_name() {
        let hive = parse(HiveBuilder::new().key(&["Schlüssel\u{4e2d}"]).build());
        let key = hive.open_key(&["schlüssel\u{4e2d}"]).unwrap();
        assert_eq!(key.name, "Schlüssel\u{4e2d}");
    }

    #[test]
    fn test_values_inline_and_cell() {
        let bytes = HiveBuilder::new()
            .value(&["Software"], "Count", ValueType::Dword, 7u32.to_le_bytes().to_vec())
            .value(&["Software"], "Name", ValueType::Sz, utf16("hello\0"))
            .value(&["Software"], "", ValueType::Binary, vec![1, 2])
            .build();
        let hive = parse(bytes);
        let key = hive.open_key(&["Software"]).unwrap();
        let values = hive.values(&key).unwrap();
        assert_eq!(values.len(), 3);

        assert_eq!(values[0].name, "Count");
        assert_eq!(values[0].value_type, ValueType::Dword);
        assert_eq!(values[0].data, vec![7, 0, 0, 0]);
        assert_eq!(values[0].data_size, 4);

        assert_eq!(values[1].value_type, ValueType::Sz);
        assert_eq!(values[1].data, utf16("hello\0"));

        assert_eq!(values[2].name, "");
        assert_eq!(values[2].data, vec![1, 2]);

        let named = hive.value(&key, "NAME").unwrap().unwrap();
        assert_eq!(named.name, "Name");
        assert!(hive.value(&key, "nope").unwrap().is_none());
    }

    #[test]
    fn test_big_data_value() {
        let payload: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        let bytes = HiveBuilder::new()
            .value(&["Blob"], "Large", ValueType::Binary, payload.clone())
            .build();
        let hive = parse(bytes);
        let key = hive.open_key(&["Blob"]).unwrap();
        let values = hive.values(&key).unwrap();
        assert_eq!(values[0].data.len(), 40_000);
        assert_eq!(values[0].data, payload);
    }

    #[test]
    fn test_bad_regf_signature() {
        let mut bytes = HiveBuilder::new().build();
        bytes[0..4].copy_from_slice(b"junk");
        let err = Hive::parse(Arc::new(bytes)).unwrap_err();
        assert!(matches!(err, HiveError::BadSignature { expected: "regf", .. }));
    }

    #[test]
    fn test_bad_hbin_signature() {
        let mut bytes = HiveBuilder::new().build();
        bytes[4096..4100].copy_from_slice(b"xxxx");
        let err = Hive::parse(Arc::new(bytes)).unwrap_err();
        assert!(matches!(err, HiveError::BadSignature { expected: "hbin", .. }));
    }

    #[test]
    fn test_truncated_source() {
        let err = Hive::parse(Arc::new(vec![0u8; 100])).unwrap_err();
        assert!(matches!(err, HiveError::Read { .. }));
    }

    #[test]
    fn test_corrupt_root_cell() {
        let mut bytes = HiveBuilder::new().build();
        let root = u32::from_le_bytes(bytes[0x24..0x28].try_into().unwrap()) as usize;
        let sig = 4096 + root + 4;
        bytes[sig..sig + 2].copy_from_slice(b"zz");
        let err = Hive::parse(Arc::new(bytes)).unwrap_err();
        assert!(matches!(err, HiveError::MalformedCell { .. }));
    }

    #[test]
    fn test_corrupt_value_fails_whole_listing() {
        let mut bytes = HiveBuilder::new()
            .value(&["K"], "Good", ValueType::Binary, vec![9; 32])
            .value(&["K"], "Bad", ValueType::Binary, vec![8; 32])
            .build();

        // Locate the second VK cell through the value list and break it.
        let list_offset = {
            let hive = parse(bytes.clone());
            hive.open_key(&["K"]).unwrap().value_list_offset as usize
        };
        let entry = 4096 + list_offset + 4 + 4;
        let vk = u32::from_le_bytes(bytes[entry..entry + 4].try_into().unwrap()) as usize;
        bytes[4096 + vk + 4..4096 + vk + 6].copy_from_slice(b"zz");

        let hive = parse(bytes);
        let key = hive.open_key(&["K"]).unwrap();
        assert!(matches!(
            hive.values(&key),
            Err(HiveError::MalformedCell { .. })
        ));
    }

    fn put(bytes: &mut [u8], at: usize, value: u32) {
        bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn test_index_root_repeating_sub_list() {
        let mut bytes = HiveBuilder::new().key(&["K", "A"]).key(&["K", "B"]).build();
        let key = parse(bytes.clone()).open_key(&["K"]).unwrap();
        assert_eq!(key.subkey_count, 2);

        // An ri cell in the unused tail of the bin that fans out to K's lf
        // list three times.
        let ri_offset = 0x800usize;
        let ri = 4096 + ri_offset;
        put(&mut bytes, ri, (-32i32) as u32);
        bytes[ri + 4..ri + 6].copy_from_slice(b"ri");
        bytes[ri + 6..ri + 8].copy_from_slice(&3u16.to_le_bytes());
        for i in 0..3 {
            put(&mut bytes, ri + 8 + i * 4, key.subkey_list_offset);
        }
        let nk = 4096 + key.cell_offset as usize + 4;
        put(&mut bytes, nk + NK_SUBKEY_LIST, ri_offset as u32);

        let hive = parse(bytes);
        let key = hive.open_key(&["K"]).unwrap();
        assert!(matches!(
            hive.subkeys(&key),
            Err(HiveError::MalformedCell { .. })
        ));
        assert!(hive.open_key(&["K", "A"]).is_none());
    }

    #[test]
    fn test_subkey_list_longer_than_subkey_count() {
        let mut bytes = HiveBuilder::new().key(&["K", "A"]).key(&["K", "B"]).build();
        let key = parse(bytes.clone()).open_key(&["K"]).unwrap();
        let nk = 4096 + key.cell_offset as usize + 4;
        put(&mut bytes, nk + NK_SUBKEY_COUNT, 1);

        let hive = parse(bytes);
        let key = hive.open_key(&["K"]).unwrap();
        assert!(matches!(
            hive.subkeys(&key),
            Err(HiveError::MalformedCell { .. })
        ));
    }
}
