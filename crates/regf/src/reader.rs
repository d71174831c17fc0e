//! Random-access byte sources a hive can be decoded from.

use std::sync::Arc;

/// Trait for reading raw bytes from wherever the hive lives.
///
/// Implementations must return exactly `length` bytes or an error; the
/// decoder treats a short read as corruption.
pub trait HiveSource: Send + Sync {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Total number of readable bytes.
    fn size(&self) -> u64;
}

impl HiveSource for Vec<u8> {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        read_slice(self, offset, length)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl HiveSource for Arc<[u8]> {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        read_slice(self, offset, length)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

fn read_slice(
    data: &[u8],
    offset: u64,
    length: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let start = usize::try_from(offset)?;
    let end = start
        .checked_add(length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| format!("read past end: {:#x}+{} > {:#x}", offset, length, data.len()))?;
    Ok(data[start..end].to_vec())
}

// Little-endian field helpers. Callers index into buffers whose length was
// checked by `Hive::read_cell_bytes`.

pub(crate) fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn i32_at(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_reads_exact() {
        let data = vec![1u8, 2, 3, 4, 5];
        assert_eq!(data.read(1, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(HiveSource::size(&data), 5);
    }

    #[test]
    fn test_vec_source_rejects_short_read() {
        let data = vec![0u8; 4];
        assert!(data.read(2, 4).is_err());
        assert!(data.read(u64::MAX, 1).is_err());
    }

    #[test]
    fn test_field_helpers() {
        let buf = [0x78, 0x56, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(u16_at(&buf, 0), 0x5678);
        assert_eq!(u32_at(&buf, 0), 0x1234_5678);
        assert_eq!(i32_at(&buf, 4), -1);
        assert_eq!(u64_at(&buf, 0), 0xffff_ffff_1234_5678);
    }
}
