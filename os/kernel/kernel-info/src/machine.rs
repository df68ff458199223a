//! # Machine Geometry

/// Size of a disk sector in bytes, the atomic unit of disk I/O.
pub const SECTOR_SIZE: usize = 128;

/// Number of sectors on one disk track.
pub const SECTORS_PER_TRACK: usize = 32;

/// Number of tracks on the simulated disk.
pub const NUM_TRACKS: usize = 32;

/// Total number of sectors on the default disk.
pub const NUM_SECTORS: usize = SECTORS_PER_TRACK * NUM_TRACKS;

/// Size of a virtual page and of a physical frame.
///
/// Pages and sectors share a size so a page can be swapped with whole-sector
/// transfers.
pub const PAGE_SIZE: usize = SECTOR_SIZE;

/// Default number of physical page frames.
pub const NUM_PHYS_PAGES: usize = 32;

/// Size of main memory in bytes for the default frame count.
pub const MEMORY_SIZE: usize = NUM_PHYS_PAGES * PAGE_SIZE;

/// Default number of TLB slots.
pub const TLB_SIZE: usize = 4;

/// Bytes reserved for the user stack at the top of each address space.
pub const USER_STACK_SIZE: usize = 1024;

/// Ticks the disk head needs to move across one track.
pub const SEEK_TIME: u64 = 500;

/// Ticks for one full disk rotation.
pub const ROTATION_TIME: u64 = 500;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(SECTOR_SIZE.is_multiple_of(4));
    assert!(USER_STACK_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(TLB_SIZE > 0);
};
