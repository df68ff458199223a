//! One-sector table of sector numbers used by indirect blocks.

use crate::SectorBuf;
use crate::disk::{BlockDevice, DiskError};
use kernel_info::filesys::{SECTOR_NUMBER_SIZE, SECTORS_IN_SECTOR};
use kernel_info::machine::SECTOR_SIZE;
use kernel_memory_addresses::SectorNumber;

/// An index table as stored on disk.
///
/// The table does not know how many of its entries are in use; the owning
/// header's sector count says how far to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    slots: [u32; SECTORS_IN_SECTOR],
}

impl Default for IndexTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [0; SECTORS_IN_SECTOR],
        }
    }

    /// # Errors
    /// Propagates the disk failure.
    pub fn read<D: BlockDevice + ?Sized>(disk: &D, sector: SectorNumber) -> Result<Self, DiskError> {
        let mut buf = [0u8; SECTOR_SIZE];
        disk.read_sector(sector, &mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    /// # Errors
    /// Propagates the disk failure.
    pub fn write<D: BlockDevice + ?Sized>(&self, disk: &D, sector: SectorNumber) -> Result<(), DiskError> {
        disk.write_sector(sector, &self.to_bytes())
    }

    #[must_use]
    pub fn from_bytes(buf: &SectorBuf) -> Self {
        let mut table = Self::new();
        for (slot, raw) in table
            .slots
            .iter_mut()
            .zip(buf.chunks_exact(SECTOR_NUMBER_SIZE))
        {
            *slot = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
        table
    }

    #[must_use]
    pub fn to_bytes(&self) -> SectorBuf {
        let mut buf = [0u8; SECTOR_SIZE];
        for (raw, slot) in buf.chunks_exact_mut(SECTOR_NUMBER_SIZE).zip(self.slots) {
            raw.copy_from_slice(&slot.to_le_bytes());
        }
        buf
    }

    /// Entry `index`, or `None` past the end of the table.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<SectorNumber> {
        self.slots.get(index).copied().map(SectorNumber::new)
    }

    pub const fn set(&mut self, index: usize, sector: SectorNumber) {
        self.slots[index] = sector.as_u32();
    }

    /// Number of leading nonzero entries.
    #[must_use]
    pub fn filled(&self) -> usize {
        self.slots.iter().take_while(|&&s| s != 0).count()
    }

    /// Whether the nonzero entries form one run starting at entry 0.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.slots[self.filled()..].iter().all(|&s| s == 0)
    }

    /// The first `count` entries.
    pub fn entries(&self, count: usize) -> impl Iterator<Item = SectorNumber> + '_ {
        self.slots.iter().take(count).map(|&s| SectorNumber::new(s))
    }
}
