//! Page management for PageDB
//!
//! A page is a fixed 4KB block owned by one table. The first four bytes hold the row
//! count (big-endian) and rows follow back to back at the table's fixed stride.
//!
//! ```text
//! +-----------+----------+----------+-----+
//! | row count | row 0    | row 1    | ... |
//! | u32 BE    | stride   | stride   |     |
//! +-----------+----------+----------+-----+
//! ```
//!
//! On disk every page is wrapped in a small container: a 4-byte magic, the page id, then
//! the 4096-byte payload.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Size of the row count header
pub const ROW_COUNT_SIZE: usize = 4;

/// Magic prefix of a page file
pub const PAGE_MAGIC: [u8; 4] = *b"PDBP";

/// Size of a page file: magic, page id, payload
pub const PAGE_FILE_SIZE: usize = PAGE_MAGIC.len() + 4 + PAGE_SIZE;

/// Page ID type, unique within one table
pub type PageId = u32;

/// A database page
#[derive(Debug, Clone)]
pub struct Page {
    page_id: PageId,
    /// Raw page data, always `PAGE_SIZE` bytes
    data: Vec<u8>,
    /// Has this page been modified since it was last written?
    dirty: bool,
}

impl Page {
    /// Create a new empty page
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            data: vec![0u8; PAGE_SIZE],
            dirty: false,
        }
    }

    /// Create a page from a raw payload, padding or truncating to `PAGE_SIZE`
    pub fn from_bytes(page_id: PageId, bytes: &[u8]) -> Self {
        let mut data = vec![0u8; PAGE_SIZE];
        let len = bytes.len().min(PAGE_SIZE);
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            page_id,
            data,
            dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Number of rows stored in this page
    pub fn row_count(&self) -> u32 {
        BigEndian::read_u32(&self.data[..ROW_COUNT_SIZE])
    }

    pub fn set_row_count(&mut self, count: u32) {
        BigEndian::write_u32(&mut self.data[..ROW_COUNT_SIZE], count);
    }

    /// Byte offset of a slot for the given row stride
    pub fn slot_offset(slot: u32, row_size: usize) -> usize {
        ROW_COUNT_SIZE + slot as usize * row_size
    }

    /// Can one more row of `row_size` bytes be appended?
    pub fn has_room(&self, row_size: usize) -> bool {
        Self::slot_offset(self.row_count(), row_size) + row_size <= PAGE_SIZE
    }

    /// Bytes of a stored row, `None` if the slot is past the row count
    pub fn row_bytes(&self, slot: u32, row_size: usize) -> Option<&[u8]> {
        if slot >= self.row_count() {
            return None;
        }
        let start = Self::slot_offset(slot, row_size);
        self.data.get(start..start + row_size)
    }

    /// Append an encoded row at the next free slot and return its slot number
    pub fn append_row(&mut self, row: &[u8]) -> Result<u32> {
        let slot = self.row_count();
        let start = Self::slot_offset(slot, row.len());
        if start + row.len() > PAGE_SIZE {
            return Err(Error::StorageError(format!(
                "page {} has no room for a {}-byte row",
                self.page_id,
                row.len()
            )));
        }
        self.data[start..start + row.len()].copy_from_slice(row);
        self.set_row_count(slot + 1);
        Ok(slot)
    }

    /// Serialize into the on-disk container
    pub fn to_file_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_FILE_SIZE);
        buf.extend_from_slice(&PAGE_MAGIC);
        // Writing into a Vec cannot fail
        let _ = buf.write_u32::<BigEndian>(self.page_id);
        buf.extend_from_slice(&self.data);
        buf
    }

    /// Deserialize from the on-disk container
    pub fn from_file_bytes(table: &str, bytes: &[u8]) -> Result<Self> {
        let corrupted = |page_id| Error::CorruptedPage {
            table: table.to_string(),
            page_id,
        };

        if bytes.len() != PAGE_FILE_SIZE || bytes[..PAGE_MAGIC.len()] != PAGE_MAGIC {
            return Err(corrupted(u32::MAX));
        }

        let mut cursor = Cursor::new(&bytes[PAGE_MAGIC.len()..]);
        let page_id = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| corrupted(u32::MAX))?;
        let mut data = vec![0u8; PAGE_SIZE];
        cursor
            .read_exact(&mut data)
            .map_err(|_| corrupted(page_id))?;

        Ok(Self {
            page_id,
            data,
            dirty: false,
        })
    }
}
