//! # Runtime Machine Configuration
//!
//! Compile-time constants fix the *shape* of pages and sectors; this module
//! fixes the *amount* of each resource for a single run, and picks the
//! replacement strategies.
//!
//! | Knob                | Default              | Constraint                   |
//! |---------------------|----------------------|------------------------------|
//! | `num_phys_pages`    | [`NUM_PHYS_PAGES`]   | at least one frame           |
//! | `tlb_size`          | [`TLB_SIZE`]         | at least one slot            |
//! | `num_sectors`       | [`NUM_SECTORS`]      | room for the free-map file   |
//! | `page_table`        | [`PageTableKind::Inverted`] | linear cap ≤ frames   |
//! | `tlb_policy`        | [`TlbPolicyKind::Fifo`] | none                      |

use crate::filesys::SECTORS_IN_SECTOR;
use crate::machine::{NUM_PHYS_PAGES, NUM_SECTORS, TLB_SIZE};

/// Which page-table design backs address translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTableKind {
    /// One shared table with one entry per physical frame, tagged by owner.
    Inverted,
    /// One table per address space indexed by virtual page number.
    ///
    /// At most `max_resident` pages of a single space are resident at once;
    /// loading one more evicts a page from that same space.
    Linear { max_resident: usize },
}

/// How a TLB slot is chosen when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbPolicyKind {
    /// Evict the slot filled longest ago.
    Fifo,
    /// Evict the slot used longest ago.
    Lru,
}

/// A rejected [`MachineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("machine needs at least one physical page frame")]
    NoFrames,
    #[error("machine needs at least one TLB slot")]
    NoTlbSlots,
    #[error("disk of {0} sectors cannot hold the free map and a file header")]
    DiskTooSmall(usize),
    #[error("linear page table residency cap {cap} must be between 1 and {frames}")]
    InvalidResidency { cap: usize, frames: usize },
}

/// Resource amounts and strategies for one simulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    num_phys_pages: usize,
    tlb_size: usize,
    num_sectors: usize,
    page_table: PageTableKind,
    tlb_policy: TlbPolicyKind,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            num_phys_pages: NUM_PHYS_PAGES,
            tlb_size: TLB_SIZE,
            num_sectors: NUM_SECTORS,
            page_table: PageTableKind::Inverted,
            tlb_policy: TlbPolicyKind::Fifo,
        }
    }

    #[must_use]
    pub const fn with_num_phys_pages(mut self, frames: usize) -> Self {
        self.num_phys_pages = frames;
        self
    }

    #[must_use]
    pub const fn with_tlb_size(mut self, slots: usize) -> Self {
        self.tlb_size = slots;
        self
    }

    #[must_use]
    pub const fn with_num_sectors(mut self, sectors: usize) -> Self {
        self.num_sectors = sectors;
        self
    }

    #[must_use]
    pub const fn with_page_table(mut self, kind: PageTableKind) -> Self {
        self.page_table = kind;
        self
    }

    #[must_use]
    pub const fn with_tlb_policy(mut self, policy: TlbPolicyKind) -> Self {
        self.tlb_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub const fn num_phys_pages(&self) -> usize {
        self.num_phys_pages
    }

    #[inline]
    #[must_use]
    pub const fn tlb_size(&self) -> usize {
        self.tlb_size
    }

    #[inline]
    #[must_use]
    pub const fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    #[inline]
    #[must_use]
    pub const fn page_table(&self) -> PageTableKind {
        self.page_table
    }

    #[inline]
    #[must_use]
    pub const fn tlb_policy(&self) -> TlbPolicyKind {
        self.tlb_policy
    }

    /// Checks that the configuration describes a machine that can run.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.num_phys_pages == 0 {
            return Err(ConfigError::NoFrames);
        }
        if self.tlb_size == 0 {
            return Err(ConfigError::NoTlbSlots);
        }
        // Free-map header, its data sectors, and at least one more header.
        let map_sectors = self.num_sectors.div_ceil(8).div_ceil(SECTORS_IN_SECTOR * 4);
        if self.num_sectors < map_sectors + 2 {
            return Err(ConfigError::DiskTooSmall(self.num_sectors));
        }
        if let PageTableKind::Linear { max_resident } = self.page_table
            && (max_resident == 0 || max_resident > self.num_phys_pages)
        {
            return Err(ConfigError::InvalidResidency {
                cap: max_resident,
                frames: self.num_phys_pages,
            });
        }
        Ok(())
    }
}
