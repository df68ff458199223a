//! Translation entries shared by the TLB and the page tables.

use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::{PhysicalFrame, VirtualPage};

/// Identity of an address space; tags page-table entries with their owner.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SpaceId(u32);

impl SpaceId {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space {}", self.0)
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceId({})", self.0)
    }
}

/// Status bits of a [`TranslationEntry`].
///
/// | Bit | Name        | Meaning                                   |
/// |-----|-------------|-------------------------------------------|
/// | 0   | `valid`     | the mapping may be used                   |
/// | 1   | `read_only` | writes raise a read-only fault            |
/// | 2   | `used`      | referenced since it was loaded            |
/// | 3   | `dirty`     | written since it was loaded from swap     |
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct EntryFlags {
    pub valid: bool,
    pub read_only: bool,
    pub used: bool,
    pub dirty: bool,
    #[bits(4)]
    __reserved: u8,
}

/// One virtual page → physical frame mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationEntry {
    pub virtual_page: VirtualPage,
    pub physical_frame: PhysicalFrame,
    pub flags: EntryFlags,
    /// Machine time of the most recent reference.
    pub last_use: u64,
    /// Owning address space; `None` for a never-filled slot.
    pub owner: Option<SpaceId>,
}

impl TranslationEntry {
    /// A freshly loaded page: valid, used, clean and writable.
    #[must_use]
    pub const fn resident(
        owner: SpaceId,
        virtual_page: VirtualPage,
        physical_frame: PhysicalFrame,
        now: u64,
    ) -> Self {
        Self {
            virtual_page,
            physical_frame,
            flags: EntryFlags::new().with_valid(true).with_used(true),
            last_use: now,
            owner: Some(owner),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.flags.valid()
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.flags.dirty()
    }

    /// Whether this is the valid mapping of `vpn` in `owner`.
    #[inline]
    #[must_use]
    pub fn maps(&self, owner: SpaceId, vpn: VirtualPage) -> bool {
        self.is_valid() && self.owner == Some(owner) && self.virtual_page == vpn
    }

    pub fn invalidate(&mut self) {
        self.flags.set_valid(false);
    }

    /// Folds the reference state of a cached copy into this entry.
    ///
    /// Bits are only ever added, so an older copy cannot clear a dirty bit.
    pub fn merge_from(&mut self, cached: &Self) {
        self.flags.set_used(self.flags.used() || cached.flags.used());
        self.flags.set_dirty(self.flags.dirty() || cached.flags.dirty());
        self.last_use = self.last_use.max(cached.last_use);
    }
}
