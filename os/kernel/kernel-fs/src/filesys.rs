//! # File System
//!
//! Files are named by the sector that holds their header. The free-sector
//! bitmap is itself stored as a file whose header lives in
//! [`FREE_MAP_SECTOR`]; every operation that takes or returns sectors writes
//! the updated map back before it returns.
//!
//! The free map is locked only while sectors are taken or returned. Disk
//! I/O happens after the lock is released; writing the map back works from
//! a snapshot taken under the lock.
//!
//! Timestamps are the disk's simulated time in ticks.

use crate::disk::{BlockDevice, DiskError, SynchDisk};
use crate::filehdr::{FileHeader, FileHeaderError, Growth};
use crate::open_file::{OpenFile, read_range, write_range};
use alloc::vec;
use kernel_alloc::bitmap::{Bitmap, BitmapError};
use kernel_info::filesys::FREE_MAP_SECTOR;
use kernel_memory_addresses::SectorNumber;
use kernel_sync::SpinLock;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileSystemError {
    #[error(transparent)]
    Header(#[from] FileHeaderError),
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error("free map: {0}")]
    FreeMap(#[from] BitmapError),
    #[error("no free sector left for a file header")]
    NoHeaderSector,
    #[error("file {sector} is still open {opens} times")]
    InUse { sector: SectorNumber, opens: u32 },
    #[error("file {0} was opened read-only")]
    ReadOnly(SectorNumber),
    #[error("file has no logical sector {0}")]
    ShortFile(usize),
}

impl FileSystemError {
    /// Whether the error reveals broken sector bookkeeping.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Header(e) => e.is_fatal(),
            Self::FreeMap(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// A mounted disk.
#[derive(Debug)]
pub struct FileSystem {
    disk: SynchDisk,
    free_map: SpinLock<Bitmap>,
    free_map_file: FileHeader,
}

impl FileSystem {
    /// Initializes an empty file system on `disk`.
    ///
    /// # Errors
    /// Fails if the disk cannot hold the free-map file.
    pub fn format(disk: SynchDisk) -> Result<Self, FileSystemError> {
        let mut map = Bitmap::new(disk.num_sectors());
        map.mark(FREE_MAP_SECTOR as usize)?;

        let map_size = map.byte_len();
        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, map_size)?;
        header.set_create_time(now(&disk));
        header.write_back(&disk, SectorNumber::new(FREE_MAP_SECTOR))?;
        write_range(&disk, &header, &map.to_bytes(), 0)?;

        info!(
            "formatted {} sectors, {} free",
            disk.num_sectors(),
            map.num_clear()
        );
        Ok(Self {
            disk,
            free_map: SpinLock::new(map),
            free_map_file: header,
        })
    }

    /// Loads the free map persisted by [`format`](Self::format).
    ///
    /// # Errors
    /// Disk failures or a free-map file too short for the disk.
    pub fn mount(disk: SynchDisk) -> Result<Self, FileSystemError> {
        let header = FileHeader::fetch_from(&disk, SectorNumber::new(FREE_MAP_SECTOR))?;
        let mut bytes = vec![0u8; header.file_length()];
        let read = read_range(&disk, &header, &mut bytes, 0)?;
        let map = Bitmap::from_bytes(disk.num_sectors(), &bytes[..read])?;

        info!(
            "mounted {} sectors, {} free",
            disk.num_sectors(),
            map.num_clear()
        );
        Ok(Self {
            disk,
            free_map: SpinLock::new(map),
            free_map_file: header,
        })
    }

    #[inline]
    #[must_use]
    pub const fn disk(&self) -> &SynchDisk {
        &self.disk
    }

    #[must_use]
    pub fn into_disk(self) -> SynchDisk {
        self.disk
    }

    /// Current file-system time.
    pub fn now(&self) -> u32 {
        now(&self.disk)
    }

    pub fn free_sectors(&self) -> usize {
        self.free_map.with_lock(|map| map.num_clear())
    }

    pub fn is_sector_used(&self, sector: SectorNumber) -> bool {
        self.free_map.with_lock(|map| map.test(sector.index()))
    }

    /// Writes the in-memory free map to its file.
    ///
    /// # Errors
    /// Disk failures.
    pub fn flush_free_map(&self) -> Result<(), FileSystemError> {
        let bytes = self.free_map.with_lock(|map| map.to_bytes());
        write_range(&self.disk, &self.free_map_file, &bytes, 0)?;
        Ok(())
    }

    /// Creates a file of `initial_size` bytes and returns its header sector.
    ///
    /// # Errors
    /// [`FileSystemError::NoHeaderSector`] or a header allocation failure; the
    /// free map is unchanged in both cases.
    pub fn create(&self, initial_size: usize) -> Result<SectorNumber, FileSystemError> {
        let mut header = FileHeader::new();
        let (index, mut growth) = self.free_map.with_lock(
            |map| -> Result<(usize, Growth), FileSystemError> {
                let index = map.find().ok_or(FileSystemError::NoHeaderSector)?;
                match header.reserve_growth(map, initial_size) {
                    Ok(growth) => Ok((index, growth)),
                    Err(e) => {
                        map.clear(index)?;
                        Err(e.into())
                    }
                }
            },
        )?;
        let Ok(sector) = u32::try_from(index).map(SectorNumber::new) else {
            self.undo_create(index, growth)?;
            return Err(FileSystemError::NoHeaderSector);
        };
        if let Err(e) = header.apply_growth(&self.disk, &mut growth) {
            self.undo_create(index, growth)?;
            return Err(e.into());
        }
        header.set_create_time(self.now());
        header.write_back(&self.disk, sector)?;
        self.flush_free_map()?;

        debug!("created file {sector} of {initial_size} bytes");
        Ok(sector)
    }

    fn undo_create(&self, header_sector: usize, growth: Growth) -> Result<(), FileSystemError> {
        self.free_map.with_lock(|map| -> Result<(), FileSystemError> {
            growth.abandon(map)?;
            map.clear(header_sector)?;
            Ok(())
        })
    }

    /// Opens the file whose header is in `sector`.
    ///
    /// # Errors
    /// Disk failures.
    pub fn open(
        &self,
        sector: SectorNumber,
        writable: bool,
    ) -> Result<OpenFile<'_>, FileSystemError> {
        let mut header = self.header(sector)?;
        header.open(writable);
        header.touch_access(self.now());
        header.write_back(&self.disk, sector)?;
        Ok(OpenFile::new(self, sector, writable))
    }

    pub(crate) fn release(
        &self,
        sector: SectorNumber,
        writable: bool,
    ) -> Result<(), FileSystemError> {
        let mut header = self.header(sector)?;
        header.close(writable)?;
        header.write_back(&self.disk, sector)?;
        Ok(())
    }

    /// Deletes the file in `sector`, returning its header, index and data
    /// sectors to the free map.
    ///
    /// # Errors
    /// [`FileSystemError::InUse`] while handles are open; a fatal
    /// [`FileHeaderError::Corrupted`] if the file was already removed.
    pub fn remove(&self, sector: SectorNumber) -> Result<(), FileSystemError> {
        let header = self.header(sector)?;
        if header.open_count() > 0 {
            return Err(FileSystemError::InUse {
                sector,
                opens: header.open_count(),
            });
        }
        let owned = header.owned_sectors(&self.disk)?;
        self.free_map.with_lock(|map| -> Result<(), FileSystemError> {
            if !map.test(sector.index()) {
                let e = FileHeaderError::from(BitmapError::AlreadyFree(sector.index()));
                return Err(e.into());
            }
            FileHeader::release_owned(map, &owned)?;
            map.clear(sector.index())?;
            Ok(())
        })?;
        self.flush_free_map()?;
        debug!("removed file {sector}");
        Ok(())
    }

    /// The header stored in `sector`.
    ///
    /// # Errors
    /// Disk failures.
    pub fn header(&self, sector: SectorNumber) -> Result<FileHeader, FileSystemError> {
        Ok(FileHeader::fetch_from(&self.disk, sector)?)
    }

    /// Reads file bytes `position..` into `buf`, stopping at end of file.
    ///
    /// # Errors
    /// Disk and header failures.
    pub fn read_at(
        &self,
        sector: SectorNumber,
        buf: &mut [u8],
        position: usize,
    ) -> Result<usize, FileSystemError> {
        let mut header = self.header(sector)?;
        let n = read_range(&self.disk, &header, buf, position)?;
        header.touch_access(self.now());
        header.write_back(&self.disk, sector)?;
        Ok(n)
    }

    /// Writes `data` at `position`, growing the file if needed.
    ///
    /// # Errors
    /// Allocation, disk and header failures. A failed growth leaves the file
    /// and the free map unchanged.
    pub fn write_at(
        &self,
        sector: SectorNumber,
        data: &[u8],
        position: usize,
    ) -> Result<usize, FileSystemError> {
        let mut header = self.header(sector)?;
        let end = position.saturating_add(data.len());
        if end > header.file_length() {
            let mut growth = self
                .free_map
                .with_lock(|map| header.reserve_growth(map, end))?;
            if let Err(e) = header.apply_growth(&self.disk, &mut growth) {
                self.free_map.with_lock(|map| growth.abandon(map))?;
                return Err(e.into());
            }
            header.write_back(&self.disk, sector)?;
            self.flush_free_map()?;
        }
        let n = write_range(&self.disk, &header, data, position)?;
        header.touch_modify(self.now());
        header.write_back(&self.disk, sector)?;
        Ok(n)
    }
}

fn now(disk: &SynchDisk) -> u32 {
    u32::try_from(disk.ticks()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_reserves_free_map() {
        let fs = FileSystem::format(SynchDisk::new(64)).unwrap();
        // Header sector plus one data sector for the 8-byte map.
        assert_eq!(fs.free_sectors(), 62);
        assert!(fs.is_sector_used(SectorNumber::new(0)));
        assert!(fs.is_sector_used(SectorNumber::new(1)));
    }

    #[test]
    fn create_failure_returns_header_sector() {
        let fs = FileSystem::format(SynchDisk::new(32)).unwrap();
        let before = fs.free_sectors();
        let err = fs.create(64 * 128).unwrap_err();
        assert!(matches!(
            err,
            FileSystemError::Header(FileHeaderError::NoSpace { .. })
        ));
        assert!(!err.is_fatal());
        assert_eq!(fs.free_sectors(), before);
    }

    #[test]
    fn remove_refuses_open_files() {
        let fs = FileSystem::format(SynchDisk::new(64)).unwrap();
        let sector = fs.create(10).unwrap();
        let file = fs.open(sector, false).unwrap();
        assert_eq!(
            fs.remove(sector),
            Err(FileSystemError::InUse { sector, opens: 1 })
        );
        file.close().unwrap();
        fs.remove(sector).unwrap();
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let fs = FileSystem::format(SynchDisk::new(64)).unwrap();
        let sector = fs.create(10).unwrap();
        let file = fs.open(sector, false).unwrap();
        assert_eq!(
            file.write_at(b"x", 0),
            Err(FileSystemError::ReadOnly(sector))
        );
    }
}
