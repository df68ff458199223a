//! # File Header
//!
//! The on-disk descriptor of one file: its length, the sectors holding its
//! data, three timestamps, and how many handles have it open.
//!
//! ## Layout in One Sector
//!
//! | Bytes                      | Field              |
//! |----------------------------|--------------------|
//! | `0..4`                     | `num_bytes`        |
//! | `4..8`                     | `num_sectors`      |
//! | `8..8 + 4·NUM_DIRECT`      | sector slots       |
//! | next 12                    | create / access / modify time |
//! | last 8                     | open count, write count |
//!
//! All fields are little-endian `u32`. Slot `NUM_DIRECT - 2` holds the
//! single-indirect table once the file needs more than `NUM_DIRECT - 2` data
//! sectors, and slot `NUM_DIRECT - 1` holds the double-indirect table once it
//! outgrows the single-indirect one.
//!
//! ## Growth
//!
//! [`FileHeader::allocate`] and [`FileHeader::allocate_more`] share one path.
//! The number of sectors needed for data *and* for new index tables is known
//! before anything is taken from the free map, so a request either reserves
//! all of them or fails without touching the map. Existing index tables are
//! read back from disk, extended in memory, and only tables that gained
//! entries are written again. If a write fails, every reserved sector is
//! returned and the header's slots are restored.
//!
//! The two halves are also available on their own:
//! [`FileHeader::reserve_growth`] only touches the free map and
//! [`FileHeader::apply_growth`] only touches the disk, so a shared free map
//! need not stay locked while index tables are written.
//!
//! ## Lookups
//!
//! [`FileHeader::logical_sector_to_sector`] reads the index tables it needs
//! on every call; nothing is cached between calls.

use crate::SectorBuf;
use crate::disk::{BlockDevice, DiskError};
use crate::index_table::IndexTable;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;
use kernel_alloc::bitmap::{Bitmap, BitmapError};
use kernel_info::filesys::{
    DIRECT_CAPACITY, DOUBLE_INDIRECT_SLOT, INDIRECT_CAPACITY, INDIRECT_SLOT, MAX_FILE_SECTORS,
    NUM_DIRECT, SECTOR_NUMBER_SIZE, SECTORS_IN_SECTOR,
};
use kernel_info::machine::SECTOR_SIZE;
use kernel_memory_addresses::SectorNumber;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileHeaderError {
    #[error("file of {sectors} sectors exceeds the {max}-sector limit")]
    TooLarge { sectors: usize, max: usize },
    #[error("need {needed} free sectors, only {available} available")]
    NoSpace { needed: usize, available: usize },
    #[error("free map corrupted: {0}")]
    Corrupted(#[from] BitmapError),
    #[error("index table at {table} has no entry {entry}")]
    MissingIndex { table: SectorNumber, entry: usize },
    #[error(transparent)]
    Disk(#[from] DiskError),
    #[error("file closed more often than it was opened")]
    NotOpen,
}

impl FileHeaderError {
    /// Whether the error reveals broken sector bookkeeping rather than a
    /// request that could not be served.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Corrupted(e) => e.is_fatal(),
            Self::MissingIndex { .. } => true,
            _ => false,
        }
    }
}

/// Index-table sectors a file of `sectors` data sectors needs.
#[must_use]
pub const fn index_overhead(sectors: usize) -> usize {
    if sectors <= DIRECT_CAPACITY {
        0
    } else if sectors <= INDIRECT_CAPACITY {
        1
    } else {
        2 + (sectors - INDIRECT_CAPACITY).div_ceil(SECTORS_IN_SECTOR)
    }
}

/// Sectors taken from the free map ahead of placing them.
#[derive(Debug)]
struct Reservation {
    sectors: Vec<usize>,
    next: usize,
}

impl Reservation {
    fn take(free_map: &mut Bitmap, count: usize) -> Result<Self, FileHeaderError> {
        let available = free_map.num_clear();
        if available < count {
            return Err(FileHeaderError::NoSpace {
                needed: count,
                available,
            });
        }
        let mut sectors = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(sector) = free_map.find() {
                sectors.push(sector);
            } else {
                Self { sectors, next: 0 }.release(free_map)?;
                return Err(FileHeaderError::NoSpace {
                    needed: count,
                    available,
                });
            }
        }
        Ok(Self { sectors, next: 0 })
    }

    fn next(&mut self) -> Result<SectorNumber, FileHeaderError> {
        let sector = self
            .sectors
            .get(self.next)
            .and_then(|&s| u32::try_from(s).ok())
            .ok_or(FileHeaderError::NoSpace {
                needed: self.next + 1,
                available: self.sectors.len(),
            })?;
        self.next += 1;
        Ok(SectorNumber::new(sector))
    }

    /// Returns every reserved sector to `free_map`.
    ///
    /// A sector that is already free means the map changed under the
    /// reservation; the remaining sectors are still returned and the first
    /// failure is reported.
    fn release(self, free_map: &mut Bitmap) -> Result<(), BitmapError> {
        let mut first = Ok(());
        for sector in self.sectors {
            if let Err(e) = free_map.clear(sector) {
                warn!("rollback of sector {sector} failed: {e}");
                first = first.and(Err(e));
            }
        }
        first
    }
}

/// Sectors set aside to grow one header, placed later by
/// [`FileHeader::apply_growth`].
///
/// A growth that fails to apply still owns its sectors; hand them back with
/// [`abandon`](Self::abandon).
#[derive(Debug)]
#[must_use]
pub struct Growth {
    from: usize,
    to: usize,
    new_bytes: usize,
    reservation: Reservation,
}

impl Growth {
    /// Sectors taken from the free map, data and index tables together.
    #[inline]
    #[must_use]
    pub const fn reserved(&self) -> usize {
        self.reservation.sectors.len()
    }

    /// Returns every reserved sector to `free_map`.
    ///
    /// # Errors
    /// [`FileHeaderError::Corrupted`] if a reserved sector was already free.
    pub fn abandon(self, free_map: &mut Bitmap) -> Result<(), FileHeaderError> {
        self.reservation.release(free_map)?;
        Ok(())
    }
}

/// Sub-table of the double-indirect tier being filled.
struct OpenSubTable {
    outer: usize,
    sector: SectorNumber,
    table: IndexTable,
}

/// In-memory copy of a file header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileHeader {
    num_bytes: u32,
    num_sectors: u32,
    data_sectors: [u32; NUM_DIRECT],
    create_time: u32,
    last_access_time: u32,
    last_modify_time: u32,
    open_count: u32,
    write_count: u32,
}

impl FileHeader {
    /// An empty header describing a zero-length file.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            num_bytes: 0,
            num_sectors: 0,
            data_sectors: [0; NUM_DIRECT],
            create_time: 0,
            last_access_time: 0,
            last_modify_time: 0,
            open_count: 0,
            write_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn file_length(&self) -> usize {
        self.num_bytes as usize
    }

    #[inline]
    #[must_use]
    pub const fn num_sectors(&self) -> usize {
        self.num_sectors as usize
    }

    #[inline]
    #[must_use]
    pub const fn create_time(&self) -> u32 {
        self.create_time
    }

    #[inline]
    #[must_use]
    pub const fn last_access_time(&self) -> u32 {
        self.last_access_time
    }

    #[inline]
    #[must_use]
    pub const fn last_modify_time(&self) -> u32 {
        self.last_modify_time
    }

    #[inline]
    #[must_use]
    pub const fn open_count(&self) -> u32 {
        self.open_count
    }

    #[inline]
    #[must_use]
    pub const fn write_count(&self) -> u32 {
        self.write_count
    }

    /// Stamps all three times with `now`.
    pub const fn set_create_time(&mut self, now: u32) {
        self.create_time = now;
        self.last_access_time = now;
        self.last_modify_time = now;
    }

    pub const fn touch_access(&mut self, now: u32) {
        self.last_access_time = now;
    }

    /// A modification is also an access.
    pub const fn touch_modify(&mut self, now: u32) {
        self.last_access_time = now;
        self.last_modify_time = now;
    }

    pub const fn open(&mut self, writing: bool) {
        self.open_count += 1;
        if writing {
            self.write_count += 1;
        }
    }

    /// # Errors
    /// [`FileHeaderError::NotOpen`] if no matching handle is open.
    pub const fn close(&mut self, writing: bool) -> Result<(), FileHeaderError> {
        if self.open_count == 0 || (writing && self.write_count == 0) {
            return Err(FileHeaderError::NotOpen);
        }
        self.open_count -= 1;
        if writing {
            self.write_count -= 1;
        }
        Ok(())
    }

    /// Sizes a fresh header for a file of `file_size` bytes and takes its
    /// data and index sectors from `free_map`.
    ///
    /// Any previous contents of the header are discarded.
    ///
    /// # Errors
    /// [`FileHeaderError::NoSpace`] or [`FileHeaderError::TooLarge`] without
    /// any change to `free_map`; disk failures after rollback.
    pub fn allocate<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        free_map: &mut Bitmap,
        file_size: usize,
    ) -> Result<(), FileHeaderError> {
        self.num_bytes = 0;
        self.num_sectors = 0;
        self.data_sectors = [0; NUM_DIRECT];
        self.grow(disk, free_map, file_size)
    }

    /// Extends the file by `extra_bytes`, reusing its existing index tables.
    ///
    /// # Errors
    /// As for [`allocate`](Self::allocate); the header is unchanged on failure.
    pub fn allocate_more<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        free_map: &mut Bitmap,
        extra_bytes: usize,
    ) -> Result<(), FileHeaderError> {
        let target = self.file_length().saturating_add(extra_bytes);
        self.grow(disk, free_map, target)
    }

    fn grow<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        free_map: &mut Bitmap,
        new_bytes: usize,
    ) -> Result<(), FileHeaderError> {
        let mut growth = self.reserve_growth(free_map, new_bytes)?;
        if let Err(e) = self.apply_growth(disk, &mut growth) {
            growth.abandon(free_map)?;
            return Err(e);
        }
        Ok(())
    }

    /// Takes every data and index sector needed to grow the file to
    /// `new_bytes` from `free_map`. Nothing is read from or written to disk.
    ///
    /// # Errors
    /// [`FileHeaderError::NoSpace`] or [`FileHeaderError::TooLarge`] without
    /// any change to `free_map`.
    pub fn reserve_growth(
        &self,
        free_map: &mut Bitmap,
        new_bytes: usize,
    ) -> Result<Growth, FileHeaderError> {
        let from = self.num_sectors();
        let to = new_bytes.div_ceil(SECTOR_SIZE);
        if to > MAX_FILE_SECTORS {
            return Err(FileHeaderError::TooLarge {
                sectors: to,
                max: MAX_FILE_SECTORS,
            });
        }
        let needed = if to > from {
            (to - from) + index_overhead(to) - index_overhead(from)
        } else {
            0
        };
        Ok(Growth {
            from,
            to,
            new_bytes,
            reservation: Reservation::take(free_map, needed)?,
        })
    }

    /// Places the sectors of `growth` and sets the new length, writing the
    /// index tables that changed. The header must not have changed since
    /// [`reserve_growth`](Self::reserve_growth).
    ///
    /// # Errors
    /// Disk failures; the header is unchanged and `growth` keeps its sectors.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_growth<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        growth: &mut Growth,
    ) -> Result<(), FileHeaderError> {
        let (from, to) = (growth.from, growth.to);
        if to > from {
            let saved = self.data_sectors;
            growth.reservation.next = 0;
            if let Err(e) = self.place(disk, from, to, &mut growth.reservation) {
                self.data_sectors = saved;
                return Err(e);
            }
            debug!(
                "file grew from {from} to {to} sectors using {} free sectors",
                growth.reserved()
            );
        }

        self.num_sectors = to as u32;
        self.num_bytes = growth.new_bytes as u32;
        Ok(())
    }

    /// Loads the table in header slot `slot`, or starts a new one there.
    fn table_in_slot<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        slot: usize,
        exists: bool,
        reservation: &mut Reservation,
    ) -> Result<(SectorNumber, IndexTable), FileHeaderError> {
        if exists {
            let sector = SectorNumber::new(self.data_sectors[slot]);
            Ok((sector, IndexTable::read(disk, sector)?))
        } else {
            let sector = reservation.next()?;
            self.data_sectors[slot] = sector.as_u32();
            Ok((sector, IndexTable::new()))
        }
    }

    /// Assigns reserved sectors to logical sectors `from..to`.
    fn place<D: BlockDevice + ?Sized>(
        &mut self,
        disk: &D,
        from: usize,
        to: usize,
        reservation: &mut Reservation,
    ) -> Result<(), FileHeaderError> {
        let mut indirect = if from < INDIRECT_CAPACITY && to > DIRECT_CAPACITY {
            Some(self.table_in_slot(disk, INDIRECT_SLOT, from > DIRECT_CAPACITY, reservation)?)
        } else {
            None
        };
        let mut double = if to > INDIRECT_CAPACITY {
            Some(self.table_in_slot(
                disk,
                DOUBLE_INDIRECT_SLOT,
                from > INDIRECT_CAPACITY,
                reservation,
            )?)
        } else {
            None
        };
        let mut sub: Option<OpenSubTable> = None;

        for logical in from..to {
            let data = reservation.next()?;
            if logical < DIRECT_CAPACITY {
                self.data_sectors[logical] = data.as_u32();
            } else if logical < INDIRECT_CAPACITY {
                if let Some((_, table)) = indirect.as_mut() {
                    table.set(logical - DIRECT_CAPACITY, data);
                }
            } else if let Some((double_sector, outer_table)) = double.as_mut() {
                let rest = logical - INDIRECT_CAPACITY;
                let (outer, inner) = (rest / SECTORS_IN_SECTOR, rest % SECTORS_IN_SECTOR);
                if sub.as_ref().is_none_or(|s| s.outer != outer) {
                    if let Some(done) = sub.take() {
                        done.table.write(disk, done.sector)?;
                    }
                    // A sub-table already has entries only if the file ended inside it.
                    let (sector, table) = if inner == 0 {
                        let sector = reservation.next()?;
                        outer_table.set(outer, sector);
                        (sector, IndexTable::new())
                    } else {
                        let sector =
                            outer_table
                                .get(outer)
                                .ok_or(FileHeaderError::MissingIndex {
                                    table: *double_sector,
                                    entry: outer,
                                })?;
                        (sector, IndexTable::read(disk, sector)?)
                    };
                    sub = Some(OpenSubTable {
                        outer,
                        sector,
                        table,
                    });
                }
                if let Some(open) = sub.as_mut() {
                    open.table.set(inner, data);
                }
            }
        }

        if let Some(done) = sub {
            done.table.write(disk, done.sector)?;
        }
        if let Some((sector, table)) = double {
            table.write(disk, sector)?;
        }
        if let Some((sector, table)) = indirect {
            table.write(disk, sector)?;
        }
        Ok(())
    }

    /// Every sector this header owns: data sectors in logical order, then
    /// the index tables.
    ///
    /// # Errors
    /// Disk failures and missing index entries.
    pub fn owned_sectors<D: BlockDevice + ?Sized>(
        &self,
        disk: &D,
    ) -> Result<Vec<SectorNumber>, FileHeaderError> {
        let n = self.num_sectors();
        let mut data = Vec::with_capacity(n + index_overhead(n));
        let mut tables = Vec::with_capacity(index_overhead(n));

        data.extend(
            self.data_sectors[..n.min(DIRECT_CAPACITY)]
                .iter()
                .map(|&s| SectorNumber::new(s)),
        );

        if n > DIRECT_CAPACITY {
            let sector = SectorNumber::new(self.data_sectors[INDIRECT_SLOT]);
            let table = IndexTable::read(disk, sector)?;
            data.extend(table.entries(n.min(INDIRECT_CAPACITY) - DIRECT_CAPACITY));
            tables.push(sector);
        }

        if n > INDIRECT_CAPACITY {
            let sector = SectorNumber::new(self.data_sectors[DOUBLE_INDIRECT_SLOT]);
            let outer = IndexTable::read(disk, sector)?;
            tables.push(sector);

            let mut left = n - INDIRECT_CAPACITY;
            for entry in 0..left.div_ceil(SECTORS_IN_SECTOR) {
                let sub_sector = outer.get(entry).ok_or(FileHeaderError::MissingIndex {
                    table: sector,
                    entry,
                })?;
                let sub = IndexTable::read(disk, sub_sector)?;
                let fill = left.min(SECTORS_IN_SECTOR);
                data.extend(sub.entries(fill));
                tables.push(sub_sector);
                left -= fill;
            }
        }

        data.extend(tables);
        Ok(data)
    }

    /// Returns every owned sector to `free_map`.
    ///
    /// # Errors
    /// As for [`release_owned`](Self::release_owned); disk failures.
    pub fn deallocate<D: BlockDevice + ?Sized>(
        &self,
        disk: &D,
        free_map: &mut Bitmap,
    ) -> Result<(), FileHeaderError> {
        let owned = self.owned_sectors(disk)?;
        Self::release_owned(free_map, &owned)
    }

    /// Returns `owned`, as listed by [`owned_sectors`](Self::owned_sectors),
    /// to `free_map`.
    ///
    /// All sectors are checked before any is cleared, so a sector that is
    /// already free (for example after a second call) leaves the map as it
    /// was and reports [`BitmapError::AlreadyFree`].
    ///
    /// # Errors
    /// [`FileHeaderError::Corrupted`] on a double free.
    pub fn release_owned(
        free_map: &mut Bitmap,
        owned: &[SectorNumber],
    ) -> Result<(), FileHeaderError> {
        if let Some(&free) = owned.iter().find(|s| !free_map.test(s.index())) {
            warn!("deallocating file that does not own sector {free}");
            return Err(BitmapError::AlreadyFree(free.index()).into());
        }
        for sector in owned {
            free_map.clear(sector.index())?;
        }
        debug!("released {} sectors", owned.len());
        Ok(())
    }

    /// Disk sector holding logical sector `logical`, or `None` past the end.
    ///
    /// # Errors
    /// Disk failures and missing index entries.
    pub fn logical_sector_to_sector<D: BlockDevice + ?Sized>(
        &self,
        disk: &D,
        logical: usize,
    ) -> Result<Option<SectorNumber>, FileHeaderError> {
        if logical >= self.num_sectors() {
            return Ok(None);
        }
        if logical < DIRECT_CAPACITY {
            return Ok(Some(SectorNumber::new(self.data_sectors[logical])));
        }

        let (table_sector, entry) = if logical < INDIRECT_CAPACITY {
            (
                SectorNumber::new(self.data_sectors[INDIRECT_SLOT]),
                logical - DIRECT_CAPACITY,
            )
        } else {
            let rest = logical - INDIRECT_CAPACITY;
            let (outer, inner) = (rest / SECTORS_IN_SECTOR, rest % SECTORS_IN_SECTOR);
            let double_sector = SectorNumber::new(self.data_sectors[DOUBLE_INDIRECT_SLOT]);
            let sub = IndexTable::read(disk, double_sector)?.get(outer).ok_or(
                FileHeaderError::MissingIndex {
                    table: double_sector,
                    entry: outer,
                },
            )?;
            (sub, inner)
        };

        IndexTable::read(disk, table_sector)?
            .get(entry)
            .map(Some)
            .ok_or(FileHeaderError::MissingIndex {
                table: table_sector,
                entry,
            })
    }

    /// Disk sector holding byte `offset` of the file.
    ///
    /// # Errors
    /// As for [`logical_sector_to_sector`](Self::logical_sector_to_sector).
    pub fn byte_to_sector<D: BlockDevice + ?Sized>(
        &self,
        disk: &D,
        offset: usize,
    ) -> Result<Option<SectorNumber>, FileHeaderError> {
        self.logical_sector_to_sector(disk, offset / SECTOR_SIZE)
    }

    /// Loads the header stored in `sector`.
    ///
    /// # Errors
    /// Propagates the disk failure.
    pub fn fetch_from<D: BlockDevice + ?Sized>(
        disk: &D,
        sector: SectorNumber,
    ) -> Result<Self, DiskError> {
        let mut buf = [0u8; SECTOR_SIZE];
        disk.read_sector(sector, &mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    /// Stores the header in `sector`.
    ///
    /// # Errors
    /// Propagates the disk failure.
    pub fn write_back<D: BlockDevice + ?Sized>(
        &self,
        disk: &D,
        sector: SectorNumber,
    ) -> Result<(), DiskError> {
        disk.write_sector(sector, &self.to_bytes())
    }

    #[must_use]
    pub fn to_bytes(&self) -> SectorBuf {
        let words = [self.num_bytes, self.num_sectors]
            .into_iter()
            .chain(self.data_sectors)
            .chain([
                self.create_time,
                self.last_access_time,
                self.last_modify_time,
                self.open_count,
                self.write_count,
            ]);
        let mut buf = [0u8; SECTOR_SIZE];
        for (raw, word) in buf.chunks_exact_mut(SECTOR_NUMBER_SIZE).zip(words) {
            raw.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    #[must_use]
    pub fn from_bytes(buf: &SectorBuf) -> Self {
        let mut words = buf
            .chunks_exact(SECTOR_NUMBER_SIZE)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
        let mut next = || words.next().unwrap_or_default();

        let num_bytes = next();
        let num_sectors = next();
        let mut data_sectors = [0; NUM_DIRECT];
        for slot in &mut data_sectors {
            *slot = next();
        }
        Self {
            num_bytes,
            num_sectors,
            data_sectors,
            create_time: next(),
            last_access_time: next(),
            last_modify_time: next(),
            open_count: next(),
            write_count: next(),
        }
    }

    /// Renders the header, its block list and its contents.
    ///
    /// Printable ASCII is shown as is, other bytes as `\xx`.
    ///
    /// # Errors
    /// Disk failures and missing index entries.
    pub fn render<D: BlockDevice + ?Sized>(&self, disk: &D) -> Result<String, FileHeaderError> {
        let mut out = String::new();
        let _ = write!(
            out,
            "FileHeader contents. File size: {}. Created: {}. Accessed: {}. Modified: {}. Opens: {} ({} writing).\nFile blocks:\n",
            self.num_bytes,
            self.create_time,
            self.last_access_time,
            self.last_modify_time,
            self.open_count,
            self.write_count,
        );

        let owned = self.owned_sectors(disk)?;
        let data = &owned[..self.num_sectors()];
        for sector in data {
            let _ = write!(out, "{} ", sector.as_u32());
        }
        out.push_str("\nFile contents:\n");

        let mut left = self.file_length();
        let mut buf = [0u8; SECTOR_SIZE];
        for &sector in data {
            disk.read_sector(sector, &mut buf)?;
            for &byte in &buf[..left.min(SECTOR_SIZE)] {
                if byte.is_ascii_graphic() || byte == b' ' {
                    out.push(char::from(byte));
                } else {
                    let _ = write!(out, "\\{byte:x}");
                }
            }
            left = left.saturating_sub(SECTOR_SIZE);
            out.push('\n');
        }
        Ok(out)
    }

    /// Logs [`render`](Self::render) at info level.
    ///
    /// # Errors
    /// As for [`render`](Self::render).
    pub fn dump<D: BlockDevice + ?Sized>(&self, disk: &D) -> Result<(), FileHeaderError> {
        info!("{}", self.render(disk)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::SynchDisk;
    use kernel_info::filesys::MAX_FILE_SIZE;

    fn disk_and_map(sectors: usize) -> (SynchDisk, Bitmap) {
        let mut map = Bitmap::new(sectors);
        map.mark(0).unwrap();
        (SynchDisk::new(sectors), map)
    }

    #[test]
    fn overhead_per_tier() {
        assert_eq!(index_overhead(0), 0);
        assert_eq!(index_overhead(DIRECT_CAPACITY), 0);
        assert_eq!(index_overhead(DIRECT_CAPACITY + 1), 1);
        assert_eq!(index_overhead(INDIRECT_CAPACITY), 1);
        assert_eq!(index_overhead(INDIRECT_CAPACITY + 1), 3);
        assert_eq!(index_overhead(INDIRECT_CAPACITY + SECTORS_IN_SECTOR), 3);
        assert_eq!(index_overhead(INDIRECT_CAPACITY + SECTORS_IN_SECTOR + 1), 4);
        assert_eq!(index_overhead(MAX_FILE_SECTORS), 2 + SECTORS_IN_SECTOR);
    }

    #[test]
    fn header_fills_one_sector() {
        let mut header = FileHeader::new();
        header.num_bytes = 1000;
        header.num_sectors = 8;
        header.data_sectors[NUM_DIRECT - 1] = 77;
        header.set_create_time(5);
        header.touch_modify(9);
        header.open(true);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], &1000u32.to_le_bytes());
        assert_eq!(&bytes[SECTOR_SIZE - 4..], &1u32.to_le_bytes());
        assert_eq!(FileHeader::from_bytes(&bytes), header);
    }

    #[test]
    fn timestamps_follow_access_rules() {
        let mut header = FileHeader::new();
        header.set_create_time(10);
        assert_eq!(
            (header.create_time(), header.last_access_time(), header.last_modify_time()),
            (10, 10, 10)
        );
        header.touch_access(11);
        assert_eq!(header.last_modify_time(), 10);
        header.touch_modify(12);
        assert_eq!((header.last_access_time(), header.last_modify_time()), (12, 12));
    }

    #[test]
    fn open_close_accounting() {
        let mut header = FileHeader::new();
        header.open(false);
        header.open(true);
        assert_eq!((header.open_count(), header.write_count()), (2, 1));
        header.close(true).unwrap();
        assert_eq!(header.close(true), Err(FileHeaderError::NotOpen));
        header.close(false).unwrap();
        assert_eq!(header.close(false), Err(FileHeaderError::NotOpen));
    }

    #[test]
    fn rollback_reports_a_sector_freed_behind_its_back() {
        let (_, mut map) = disk_and_map(16);
        let reservation = Reservation::take(&mut map, 3).unwrap();
        assert_eq!(map.num_clear(), 12);

        map.clear(2).unwrap();
        assert_eq!(
            reservation.release(&mut map),
            Err(BitmapError::AlreadyFree(2))
        );
        // The other sectors still went back.
        assert_eq!(map.num_clear(), 15);
    }

    #[test]
    fn direct_only_file() {
        let (disk, mut map) = disk_and_map(128);
        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, 3 * SECTOR_SIZE + 1).unwrap();
        assert_eq!(header.num_sectors(), 4);
        assert_eq!(map.num_clear(), 128 - 1 - 4);
        assert_eq!(
            header.byte_to_sector(&disk, 3 * SECTOR_SIZE).unwrap(),
            Some(SectorNumber::new(4))
        );
        assert_eq!(header.logical_sector_to_sector(&disk, 4).unwrap(), None);
    }

    #[test]
    fn no_space_leaves_map_untouched() {
        let (disk, mut map) = disk_and_map(24);
        let before = map.clone();
        let mut header = FileHeader::new();
        // 23 data sectors fit exactly, 24 would need a table sector too.
        let err = header
            .allocate(&disk, &mut map, (DIRECT_CAPACITY + 1) * SECTOR_SIZE)
            .unwrap_err();
        assert_eq!(
            err,
            FileHeaderError::NoSpace {
                needed: DIRECT_CAPACITY + 2,
                available: 23
            }
        );
        assert!(!err.is_fatal());
        assert_eq!(map, before);
    }

    #[test]
    fn too_large_rejected() {
        let (disk, mut map) = disk_and_map(64);
        let mut header = FileHeader::new();
        assert!(matches!(
            header.allocate(&disk, &mut map, MAX_FILE_SIZE + 1),
            Err(FileHeaderError::TooLarge { .. })
        ));
    }

    #[test]
    fn render_shows_blocks_and_contents() {
        let (disk, mut map) = disk_and_map(32);
        let mut header = FileHeader::new();
        header.allocate(&disk, &mut map, 4).unwrap();
        let mut buf = [0u8; SECTOR_SIZE];
        buf[..4].copy_from_slice(b"hi\n!");
        disk.write_sector(SectorNumber::new(1), &buf).unwrap();

        let text = header.render(&disk).unwrap();
        assert!(text.contains("File size: 4."));
        assert!(text.contains("File blocks:\n1 \n"));
        assert!(text.contains("hi\\a!"));
        header.dump(&disk).unwrap();
    }
}
