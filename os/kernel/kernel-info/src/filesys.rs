//! # On-Disk File Layout
//!
//! A file header occupies exactly one sector:
//!
//! ```text
//! ┌───────────┬─────────────┬──────────────────────────┬─────────┬─────────┬─────────┬────────┬─────────┐
//! │ num_bytes │ num_sectors │ data_sectors[NUM_DIRECT] │ created │ access  │ modify  │ opens  │ writers │
//! └───────────┴─────────────┴──────────────────────────┴─────────┴─────────┴─────────┴────────┴─────────┘
//! ```
//!
//! The last two `data_sectors` slots are reinterpreted as the single-indirect
//! and double-indirect table pointers once a file outgrows its direct blocks.

use crate::machine::{NUM_SECTORS, SECTOR_SIZE};

/// Width of one on-disk sector number.
pub const SECTOR_NUMBER_SIZE: usize = size_of::<u32>();

/// Sector numbers held by one index table (one sector's worth).
pub const SECTORS_IN_SECTOR: usize = SECTOR_SIZE / SECTOR_NUMBER_SIZE;

/// Fixed 32-bit fields of a header besides the sector slots.
pub const HEADER_FIELDS: usize = 7;

/// Sector slots in a file header.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - HEADER_FIELDS * SECTOR_NUMBER_SIZE) / SECTOR_NUMBER_SIZE;

/// Data sectors reachable without any index table.
pub const DIRECT_CAPACITY: usize = NUM_DIRECT - 2;

/// Slot holding the single-indirect table sector.
pub const INDIRECT_SLOT: usize = NUM_DIRECT - 2;

/// Slot holding the double-indirect table sector.
pub const DOUBLE_INDIRECT_SLOT: usize = NUM_DIRECT - 1;

/// Data sectors reachable through direct blocks plus one single-indirect table.
pub const INDIRECT_CAPACITY: usize = DIRECT_CAPACITY + SECTORS_IN_SECTOR;

/// Largest file, in sectors, the three-level scheme can address.
pub const MAX_FILE_SECTORS: usize = INDIRECT_CAPACITY + SECTORS_IN_SECTOR * SECTORS_IN_SECTOR;

/// Largest file, in bytes.
pub const MAX_FILE_SIZE: usize = MAX_FILE_SECTORS * SECTOR_SIZE;

/// Sector holding the free-map file header.
pub const FREE_MAP_SECTOR: u32 = 0;

/// Bytes needed to persist the free map of the default disk.
pub const FREE_MAP_FILE_SIZE: usize = NUM_SECTORS.div_ceil(8);

const _: () = {
    assert!(NUM_DIRECT >= 3);
    assert!((HEADER_FIELDS + NUM_DIRECT) * SECTOR_NUMBER_SIZE == SECTOR_SIZE);
    assert!(MAX_FILE_SIZE <= u32::MAX as usize);
};
