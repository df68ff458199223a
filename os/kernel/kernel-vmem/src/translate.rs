//! # The Memory-Management Unit
//!
//! [`Mmu`] owns the TLB and the authoritative [`PageMapping`] and resolves
//! virtual addresses against either of them. It never loads pages itself;
//! a miss is reported as an [`ExceptionType`] and resolved by the kernel.

use crate::entry::{SpaceId, TranslationEntry};
use crate::page_table::{MappingError, PageMapping, new_mapping};
use crate::tlb::Tlb;
use alloc::boxed::Box;
use alloc::vec::Vec;
use kernel_info::config::MachineConfig;
use kernel_memory_addresses::{PageOffset, PhysicalAddress, VirtualAddress, VirtualPage};
use log::{debug, trace};

/// Faults raised by [`Mmu::translate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ExceptionType {
    /// Misaligned access, or an address past the end of the space.
    #[error("address error")]
    AddressError,
    #[error("TLB miss")]
    TlbMiss,
    #[error("page fault")]
    PageFault,
    #[error("write to a read-only page")]
    ReadOnly,
    /// A translation resolved to a frame the machine does not have.
    #[error("bus error")]
    BusError,
}

impl ExceptionType {
    /// Whether the kernel can resolve the fault and retry the access.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::TlbMiss | Self::PageFault)
    }
}

/// Width of a single memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSize {
    Byte,
    Half,
    Word,
}

impl AccessSize {
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Half => 2,
            Self::Word => 4,
        }
    }
}

/// Which structure [`Mmu::translate`] consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Tlb,
    PageTable,
}

/// TLB plus authoritative page table of one machine.
#[derive(Debug)]
pub struct Mmu {
    tlb: Tlb,
    mapping: Box<dyn PageMapping>,
    num_frames: usize,
}

impl Mmu {
    /// Builds the TLB and page table selected by `config`.
    #[must_use]
    pub fn new(config: &MachineConfig) -> Self {
        Self::with_parts(
            Tlb::new(config.tlb_size(), config.tlb_policy()),
            new_mapping(config.page_table(), config.num_phys_pages()),
            config.num_phys_pages(),
        )
    }

    #[must_use]
    pub fn with_parts(tlb: Tlb, mapping: Box<dyn PageMapping>, num_frames: usize) -> Self {
        Self {
            tlb,
            mapping,
            num_frames,
        }
    }

    #[inline]
    #[must_use]
    pub const fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[inline]
    #[must_use]
    pub const fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    #[inline]
    pub const fn tlb_mut(&mut self) -> &mut Tlb {
        &mut self.tlb
    }

    #[inline]
    #[must_use]
    pub fn mapping(&self) -> &dyn PageMapping {
        self.mapping.as_ref()
    }

    #[inline]
    pub fn mapping_mut(&mut self) -> &mut dyn PageMapping {
        self.mapping.as_mut()
    }

    /// Resolves `va` for an access of `size` bytes by `owner`.
    ///
    /// The checks run in a fixed order: alignment and bounds, lookup in the
    /// structure named by `via`, write protection, frame range. On success
    /// the resolving entry is marked used (and dirty when `writing`) and
    /// stamped with `now`.
    ///
    /// # Errors
    /// The first [`ExceptionType`] raised by the checks above.
    pub fn translate(
        &mut self,
        owner: SpaceId,
        va: VirtualAddress,
        size: AccessSize,
        writing: bool,
        via: Lookup,
        now: u64,
    ) -> Result<PhysicalAddress, ExceptionType> {
        if !va.is_aligned(size.bytes()) {
            trace!("{va} is not aligned for a {}-byte access", size.bytes());
            return Err(ExceptionType::AddressError);
        }

        let (vpn, offset) = va.split();
        let in_range = self
            .mapping
            .num_pages(owner)
            .is_some_and(|pages| vpn.index() < pages);
        if !in_range {
            trace!("{va} lies outside {owner}");
            return Err(ExceptionType::AddressError);
        }

        let num_frames = self.num_frames;
        let entry = match via {
            Lookup::Tlb => {
                let Some(entry) = self.tlb.find_mut(vpn) else {
                    trace!("TLB miss on {va}");
                    return Err(ExceptionType::TlbMiss);
                };
                entry.last_use = now;
                entry
            }
            Lookup::PageTable => {
                let Some(entry) = self.mapping.lookup_mut(owner, vpn) else {
                    trace!("page fault on {va}");
                    return Err(ExceptionType::PageFault);
                };
                entry
            }
        };
        resolve(entry, offset, writing, now, num_frames)
    }

    /// Caches the page-table entry of `vpn` in the TLB and returns its slot.
    ///
    /// A page that is already cached keeps its slot. A displaced valid entry
    /// is folded back into the page table first.
    ///
    /// # Errors
    /// [`ExceptionType::PageFault`] if `vpn` is not resident.
    pub fn refill_tlb(
        &mut self,
        owner: SpaceId,
        vpn: VirtualPage,
        now: u64,
    ) -> Result<usize, ExceptionType> {
        let entry = *self
            .mapping
            .lookup(owner, vpn)
            .ok_or(ExceptionType::PageFault)?;
        if let Some(slot) = self.tlb.slot_of(vpn) {
            return Ok(slot);
        }
        let Some(fill) = self.tlb.install(entry, now) else {
            return Ok(0);
        };
        if let Some(evicted) = fill.evicted {
            trace!("TLB slot {} drops {}", fill.slot, evicted.virtual_page);
            self.fold_back(&evicted);
        }
        Ok(fill.slot)
    }

    /// Merges every valid TLB entry into the page table.
    pub fn sync_tlb(&mut self) {
        let cached: Vec<TranslationEntry> = self
            .tlb
            .entries()
            .iter()
            .filter(|e| e.is_valid())
            .copied()
            .collect();
        for entry in &cached {
            self.fold_back(entry);
        }
    }

    /// Merges the TLB into the page table and empties it.
    pub fn flush_tlb(&mut self) {
        self.sync_tlb();
        self.tlb.flush();
    }

    /// Least recently used page that may be evicted for `owner`, after
    /// bringing the page table up to date with the TLB.
    pub fn select_victim(&mut self, owner: SpaceId) -> Option<TranslationEntry> {
        self.sync_tlb();
        self.mapping.scan_for_victim(owner)
    }

    /// Removes the mapping of `vpn` from both the TLB and the page table.
    ///
    /// Returns the final merged entry, whose dirty bit decides whether the
    /// frame must be written back.
    pub fn evict(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<TranslationEntry> {
        let cached = self.tlb.invalidate(owner, vpn);
        let entry = self.mapping.lookup_mut(owner, vpn)?;
        if let Some(cached) = cached {
            entry.merge_from(&cached);
        }
        let last = *entry;
        entry.invalidate();
        debug!("evicted {vpn} of {owner} from frame {}", last.physical_frame);
        Some(last)
    }

    /// Installs a freshly loaded page in the page table.
    ///
    /// # Errors
    /// See [`PageMapping::insert`].
    pub fn map(&mut self, entry: TranslationEntry) -> Result<(), MappingError> {
        self.mapping.insert(entry)
    }

    /// Registers a new address space of `num_pages` pages.
    ///
    /// # Errors
    /// [`MappingError::AlreadyRegistered`] for a known space.
    pub fn register(&mut self, owner: SpaceId, num_pages: usize) -> Result<(), MappingError> {
        self.mapping.register(owner, num_pages)
    }

    /// Drops `owner` from the TLB and page table, returning its resident
    /// entries.
    pub fn unregister(&mut self, owner: SpaceId) -> Vec<TranslationEntry> {
        self.tlb.invalidate_owner(owner);
        self.mapping.unregister(owner)
    }

    fn fold_back(&mut self, cached: &TranslationEntry) {
        let Some(owner) = cached.owner else {
            return;
        };
        if let Some(entry) = self.mapping.lookup_mut(owner, cached.virtual_page) {
            entry.merge_from(cached);
        }
    }
}

/// Protection and range checks, then reference bookkeeping.
fn resolve(
    entry: &mut TranslationEntry,
    offset: PageOffset,
    writing: bool,
    now: u64,
    num_frames: usize,
) -> Result<PhysicalAddress, ExceptionType> {
    if writing && entry.flags.read_only() {
        trace!("write to read-only {}", entry.virtual_page);
        return Err(ExceptionType::ReadOnly);
    }
    if entry.physical_frame.index() >= num_frames {
        trace!("{} maps to missing frame {}", entry.virtual_page, entry.physical_frame);
        return Err(ExceptionType::BusError);
    }
    entry.flags.set_used(true);
    if writing {
        entry.flags.set_dirty(true);
    }
    entry.last_use = now;
    Ok(entry.physical_frame.join(offset))
}
