use core::fmt;

/// Index of a disk sector.
///
/// Stored on disk as a little-endian `u32`.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SectorNumber(u32);

impl SectorNumber {
    #[inline]
    #[must_use]
    pub const fn new(sector: u32) -> Self {
        Self(sector)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Byte offset of the sector's first byte on the disk.
    #[inline]
    #[must_use]
    pub const fn byte_offset(self) -> usize {
        self.0 as usize * kernel_info::machine::SECTOR_SIZE
    }
}

impl fmt::Display for SectorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for SectorNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sector({})", self.0)
    }
}

impl From<u32> for SectorNumber {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}
