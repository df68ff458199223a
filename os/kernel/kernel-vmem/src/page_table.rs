//! # Authoritative Page Tables
//!
//! The [`PageMapping`] trait is the capability set both page-table designs
//! expose to translation and page replacement. Exactly one instance exists
//! per machine and it is selected at runtime from
//! [`PageTableKind`](kernel_info::config::PageTableKind).
//!
//! An entry in a page table is authoritative: a TLB slot is only ever a copy
//! of one, and the copy's use and dirty state is merged back before the slot
//! is reused or the page is evicted.

mod inverted;
mod linear;

pub use inverted::InvertedPageTable;
pub use linear::LinearPageTable;

use crate::entry::{SpaceId, TranslationEntry};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::config::PageTableKind;
use kernel_memory_addresses::{PhysicalFrame, VirtualPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("{0} is not registered")]
    UnknownSpace(SpaceId),
    #[error("{0} is already registered")]
    AlreadyRegistered(SpaceId),
    #[error("page {vpn} is outside a space of {pages} pages")]
    PageOutOfRange { vpn: VirtualPage, pages: usize },
    #[error("frame {frame} is outside a memory of {frames} frames")]
    FrameOutOfRange { frame: PhysicalFrame, frames: usize },
    #[error("frame {0} already holds a valid page")]
    FrameInUse(PhysicalFrame),
    #[error("page {vpn} of {owner} is already resident")]
    AlreadyMapped { owner: SpaceId, vpn: VirtualPage },
    #[error("entry has no owner")]
    NoOwner,
}

/// Virtual → physical mapping for every address space on the machine.
pub trait PageMapping: fmt::Debug + Send {
    /// Sets up bookkeeping for a space of `num_pages` pages.
    ///
    /// # Errors
    /// [`MappingError::AlreadyRegistered`] for a known space.
    fn register(&mut self, owner: SpaceId, num_pages: usize) -> Result<(), MappingError>;

    /// Forgets `owner`, returning its resident entries so the caller can
    /// release their frames.
    fn unregister(&mut self, owner: SpaceId) -> Vec<TranslationEntry>;

    /// Size of `owner` in pages, or `None` if unknown.
    fn num_pages(&self, owner: SpaceId) -> Option<usize>;

    fn lookup(&self, owner: SpaceId, vpn: VirtualPage) -> Option<&TranslationEntry>;

    fn lookup_mut(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<&mut TranslationEntry>;

    /// Installs a valid entry for `entry.owner`.
    ///
    /// # Errors
    /// When the owner, page or frame is out of range or already mapped.
    fn insert(&mut self, entry: TranslationEntry) -> Result<(), MappingError>;

    /// Marks the mapping invalid and returns its final state.
    fn invalidate(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<TranslationEntry>;

    /// The least recently used resident entry that may be evicted to make
    /// room for a page of `owner`. Ties go to the first entry scanned.
    fn scan_for_victim(&self, owner: SpaceId) -> Option<TranslationEntry>;

    /// Whether loading a page of `owner` must evict first.
    fn needs_eviction(&self, owner: SpaceId, free_frames: usize) -> bool;

    fn resident_count(&self, owner: SpaceId) -> usize;

    fn kind(&self) -> PageTableKind;
}

/// Builds the mapping named by `kind` for a machine of `num_frames` frames.
#[must_use]
pub fn new_mapping(kind: PageTableKind, num_frames: usize) -> Box<dyn PageMapping> {
    match kind {
        PageTableKind::Inverted => Box::new(InvertedPageTable::new(num_frames)),
        PageTableKind::Linear { max_resident } => Box::new(LinearPageTable::new(max_resident)),
    }
}

/// Index of the least recently used valid entry; first wins ties.
fn least_recently_used<'a>(
    entries: impl Iterator<Item = &'a TranslationEntry>,
) -> Option<&'a TranslationEntry> {
    let mut victim: Option<&TranslationEntry> = None;
    for entry in entries.filter(|e| e.is_valid()) {
        if victim.is_none_or(|v| entry.last_use < v.last_use) {
            victim = Some(entry);
        }
    }
    victim
}
