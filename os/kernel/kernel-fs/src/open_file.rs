//! Byte-granular access to a file, and open handles.

use crate::disk::BlockDevice;
use crate::filehdr::FileHeader;
use crate::filesys::{FileSystem, FileSystemError};
use kernel_info::machine::SECTOR_SIZE;
use kernel_memory_addresses::SectorNumber;
use log::warn;

/// Copies file bytes `position..` into `buf`, stopping at end of file.
///
/// Returns the number of bytes read.
pub(crate) fn read_range<D: BlockDevice + ?Sized>(
    disk: &D,
    header: &FileHeader,
    buf: &mut [u8],
    position: usize,
) -> Result<usize, FileSystemError> {
    let length = header.file_length();
    if position >= length || buf.is_empty() {
        return Ok(0);
    }
    let count = buf.len().min(length - position);
    let end = position + count;

    let mut sector_buf = [0u8; SECTOR_SIZE];
    for logical in position / SECTOR_SIZE..=(end - 1) / SECTOR_SIZE {
        let sector = header
            .logical_sector_to_sector(disk, logical)?
            .ok_or(FileSystemError::ShortFile(logical))?;
        disk.read_sector(sector, &mut sector_buf)?;

        let start = logical * SECTOR_SIZE;
        let from = position.max(start);
        let to = end.min(start + SECTOR_SIZE);
        buf[from - position..to - position].copy_from_slice(&sector_buf[from - start..to - start]);
    }
    Ok(count)
}

/// Copies `data` into file bytes `position..`; the file must already be
/// long enough.
///
/// Sectors only partly covered by `data` are read first and written back
/// whole.
pub(crate) fn write_range<D: BlockDevice + ?Sized>(
    disk: &D,
    header: &FileHeader,
    data: &[u8],
    position: usize,
) -> Result<usize, FileSystemError> {
    if data.is_empty() {
        return Ok(0);
    }
    let end = position + data.len();
    if end > header.file_length() {
        return Err(FileSystemError::ShortFile(end.div_ceil(SECTOR_SIZE)));
    }

    let mut sector_buf = [0u8; SECTOR_SIZE];
    for logical in position / SECTOR_SIZE..=(end - 1) / SECTOR_SIZE {
        let sector = header
            .logical_sector_to_sector(disk, logical)?
            .ok_or(FileSystemError::ShortFile(logical))?;

        let start = logical * SECTOR_SIZE;
        let from = position.max(start);
        let to = end.min(start + SECTOR_SIZE);
        if to - from < SECTOR_SIZE {
            disk.read_sector(sector, &mut sector_buf)?;
        }
        sector_buf[from - start..to - start].copy_from_slice(&data[from - position..to - position]);
        disk.write_sector(sector, &sector_buf)?;
    }
    Ok(data.len())
}

/// An open handle on a file, with a seek position.
///
/// Opening counts against the header's open count (and write count for
/// writable handles); [`close`](Self::close) or dropping the handle returns
/// them.
#[derive(Debug)]
pub struct OpenFile<'fs> {
    fs: &'fs FileSystem,
    sector: SectorNumber,
    position: usize,
    writable: bool,
    closed: bool,
}

impl<'fs> OpenFile<'fs> {
    pub(crate) const fn new(fs: &'fs FileSystem, sector: SectorNumber, writable: bool) -> Self {
        Self {
            fs,
            sector,
            position: 0,
            writable,
            closed: false,
        }
    }

    /// Sector of the file's header.
    #[inline]
    #[must_use]
    pub const fn sector(&self) -> SectorNumber {
        self.sector
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    pub const fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// # Errors
    /// Disk and header failures.
    pub fn length(&self) -> Result<usize, FileSystemError> {
        Ok(self.fs.header(self.sector)?.file_length())
    }

    /// Reads at `position` without moving the seek position.
    ///
    /// # Errors
    /// Disk and header failures.
    pub fn read_at(&self, buf: &mut [u8], position: usize) -> Result<usize, FileSystemError> {
        self.fs.read_at(self.sector, buf, position)
    }

    /// Writes at `position`, growing the file if the write ends past it.
    ///
    /// # Errors
    /// [`FileSystemError::ReadOnly`] for a handle opened without write
    /// access; allocation, disk and header failures.
    pub fn write_at(&self, data: &[u8], position: usize) -> Result<usize, FileSystemError> {
        if !self.writable {
            return Err(FileSystemError::ReadOnly(self.sector));
        }
        self.fs.write_at(self.sector, data, position)
    }

    /// Reads at the seek position and advances it.
    ///
    /// # Errors
    /// As for [`read_at`](Self::read_at).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileSystemError> {
        let n = self.read_at(buf, self.position)?;
        self.position += n;
        Ok(n)
    }

    /// Writes at the seek position and advances it.
    ///
    /// # Errors
    /// As for [`write_at`](Self::write_at).
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FileSystemError> {
        let n = self.write_at(data, self.position)?;
        self.position += n;
        Ok(n)
    }

    /// Releases the handle's open (and write) count.
    ///
    /// # Errors
    /// Disk and header failures.
    pub fn close(mut self) -> Result<(), FileSystemError> {
        self.closed = true;
        self.fs.release(self.sector, self.writable)
    }
}

impl Drop for OpenFile<'_> {
    fn drop(&mut self) {
        if !self.closed
            && let Err(e) = self.fs.release(self.sector, self.writable)
        {
            warn!("closing file {} failed: {e}", self.sector);
        }
    }
}
