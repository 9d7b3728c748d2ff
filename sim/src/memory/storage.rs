use std::fs;
use std::ops::Range;
use std::path::Path;

use crate::error::{Result, SimError};

/// Owned backing array of a simulated memory.
///
/// The capacity is always a power of two (and at least the alignment the
/// owning device asked for), so any bus address can be folded into range
/// with `addr & mask`.
#[derive(Clone)]
pub struct Storage {
    data: Box<[u8]>,
    mask: usize,
}

impl Storage {
    /// Allocates a zero-filled array of at least `size` bytes.
    ///
    /// `align` must be a power of two; the capacity is rounded up to it and
    /// then to the next power of two.
    #[must_use]
    pub fn new(size: usize, align: usize) -> Self {
        debug_assert!(align.is_power_of_two());
        let capacity = size.max(align).next_power_of_two();

        Self {
            data: vec![0; capacity].into_boxed_slice(),
            mask: capacity - 1,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn mask(&self) -> usize {
        self.mask
    }

    /// Folds a bus address into the array.
    #[must_use]
    pub const fn resolve(&self, addr: u32) -> usize {
        addr as usize & self.mask
    }

    #[must_use]
    pub fn read_u8(&self, addr: u32) -> u8 {
        self.data[self.resolve(addr)]
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        let idx = self.resolve(addr);
        self.data[idx] = value;
    }

    /// Plain index access, for offsets already known to be in range.
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Validates `offset..offset + len` against the capacity. Unlike bus
    /// accesses, bulk ranges are never wrapped.
    pub fn range(&self, offset: usize, len: usize) -> Result<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(offset..end),
            _ => Err(SimError::RangeOutOfBounds {
                offset,
                len,
                capacity: self.capacity(),
            }),
        }
    }

    pub fn read_range(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn write_range(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes `len` bytes starting at `offset` to a raw binary file.
    pub fn dump(&self, path: &Path, offset: usize, len: usize) -> Result<()> {
        let bytes = self.read_range(offset, len)?;
        fs::write(path, bytes)?;
        tracing::info!(
            "Saved {len} bytes to {} from offset 0x{offset:08X}",
            path.display()
        );
        Ok(())
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
