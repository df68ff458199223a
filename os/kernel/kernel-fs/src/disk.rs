//! # Simulated Disk
//!
//! A [`DiskImage`] is a flat array of sectors with a moving head. Every
//! request pays for the seek to the target track, the rotational wait until
//! the target sector passes under the head, and the transfer of one sector.
//! Time is measured in simulated ticks.
//!
//! [`SynchDisk`] serializes requests against one image so that exactly one
//! request is in flight; callers block (spin) until the device is free.

use crate::SectorBuf;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::machine::{ROTATION_TIME, SECTOR_SIZE, SECTORS_PER_TRACK, SEEK_TIME};
use kernel_memory_addresses::SectorNumber;
use kernel_sync::{LockStats, SpinLock};
use log::trace;

/// Ticks for one sector to pass under the head.
const SECTOR_PASS_TIME: u64 = ROTATION_TIME / SECTORS_PER_TRACK as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DiskError {
    #[error("sector {sector} is outside a disk of {len} sectors")]
    OutOfRange { sector: SectorNumber, len: usize },
}

/// Sector-granular storage.
///
/// Both operations transfer exactly one sector and complete before
/// returning.
pub trait BlockDevice {
    /// # Errors
    /// [`DiskError::OutOfRange`] for a sector past the end of the device.
    fn read_sector(&self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), DiskError>;

    /// # Errors
    /// [`DiskError::OutOfRange`] for a sector past the end of the device.
    fn write_sector(&self, sector: SectorNumber, buf: &SectorBuf) -> Result<(), DiskError>;

    fn num_sectors(&self) -> usize;
}

/// Request counters and accumulated latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub reads: u64,
    pub writes: u64,
    /// Requests that moved the head to another track.
    pub seeks: u64,
    /// Total simulated time spent serving requests.
    pub ticks: u64,
}

/// The raw disk: sector contents and head state.
#[derive(Debug, Clone)]
pub struct DiskImage {
    data: Vec<u8>,
    head_track: usize,
    stats: DiskStats,
}

impl DiskImage {
    /// A zero-filled disk of `num_sectors` sectors.
    #[must_use]
    pub fn new(num_sectors: usize) -> Self {
        Self {
            data: vec![0; num_sectors * SECTOR_SIZE],
            head_track: 0,
            stats: DiskStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn num_sectors(&self) -> usize {
        self.data.len() / SECTOR_SIZE
    }

    #[inline]
    #[must_use]
    pub const fn stats(&self) -> DiskStats {
        self.stats
    }

    fn range(&self, sector: SectorNumber) -> Result<core::ops::Range<usize>, DiskError> {
        if sector.index() >= self.num_sectors() {
            return Err(DiskError::OutOfRange {
                sector,
                len: self.num_sectors(),
            });
        }
        let start = sector.byte_offset();
        Ok(start..start + SECTOR_SIZE)
    }

    /// Advances simulated time by the cost of reaching and transferring `sector`.
    fn position_head(&mut self, sector: SectorNumber) -> u64 {
        let track = sector.index() / SECTORS_PER_TRACK;
        let distance = self.head_track.abs_diff(track) as u64;
        let seek = distance * SEEK_TIME;
        if distance > 0 {
            self.stats.seeks += 1;
        }

        let arrival = self.stats.ticks + seek;
        let under_head = (arrival / SECTOR_PASS_TIME) % SECTORS_PER_TRACK as u64;
        let target = (sector.index() % SECTORS_PER_TRACK) as u64;
        let rotation = ((target + SECTORS_PER_TRACK as u64 - under_head)
            % SECTORS_PER_TRACK as u64)
            * SECTOR_PASS_TIME;

        let latency = seek + rotation + SECTOR_PASS_TIME;
        self.head_track = track;
        self.stats.ticks += latency;
        latency
    }

    /// # Errors
    /// [`DiskError::OutOfRange`] for a sector past the end of the disk.
    pub fn read(&mut self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), DiskError> {
        let range = self.range(sector)?;
        let latency = self.position_head(sector);
        buf.copy_from_slice(&self.data[range]);
        self.stats.reads += 1;
        trace!("read sector {sector} in {latency} ticks");
        Ok(())
    }

    /// # Errors
    /// [`DiskError::OutOfRange`] for a sector past the end of the disk.
    pub fn write(&mut self, sector: SectorNumber, buf: &SectorBuf) -> Result<(), DiskError> {
        let range = self.range(sector)?;
        let latency = self.position_head(sector);
        self.data[range].copy_from_slice(buf);
        self.stats.writes += 1;
        trace!("wrote sector {sector} in {latency} ticks");
        Ok(())
    }
}

/// A disk whose requests are served one at a time.
#[derive(Debug)]
pub struct SynchDisk {
    image: SpinLock<DiskImage>,
    num_sectors: usize,
}

impl SynchDisk {
    #[must_use]
    pub fn new(num_sectors: usize) -> Self {
        Self::from_image(DiskImage::new(num_sectors))
    }

    #[must_use]
    pub fn from_image(image: DiskImage) -> Self {
        Self {
            num_sectors: image.num_sectors(),
            image: SpinLock::new(image),
        }
    }

    /// Detaches the image, e.g. to remount it in a fresh file system.
    #[must_use]
    pub fn into_image(self) -> DiskImage {
        self.image.into_inner()
    }

    pub fn stats(&self) -> DiskStats {
        self.image.with_lock(|image| image.stats())
    }

    /// Simulated time the disk has spent serving requests.
    pub fn ticks(&self) -> u64 {
        self.stats().ticks
    }

    pub fn lock_stats(&self) -> LockStats {
        self.image.stats()
    }
}

impl BlockDevice for SynchDisk {
    fn read_sector(&self, sector: SectorNumber, buf: &mut SectorBuf) -> Result<(), DiskError> {
        self.image.with_lock(|image| image.read(sector, buf))
    }

    fn write_sector(&self, sector: SectorNumber, buf: &SectorBuf) -> Result<(), DiskError> {
        self.image.with_lock(|image| image.write(sector, buf))
    }

    fn num_sectors(&self) -> usize {
        self.num_sectors
    }
}
