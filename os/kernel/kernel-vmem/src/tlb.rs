//! # Translation Lookaside Buffer
//!
//! A fixed number of slots, each a cached copy of a page-table entry of the
//! running address space. Lookups are associative on the virtual page
//! number. The TLB is flushed on every address-space switch, so entries of
//! two spaces never coexist.

use crate::entry::{SpaceId, TranslationEntry};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::config::TlbPolicyKind;
use kernel_memory_addresses::VirtualPage;

/// Chooses which slot to overwrite when every slot is valid.
pub trait TlbPolicy: fmt::Debug + Send {
    /// Slot to evict; called only when no slot is invalid.
    fn choose_victim(&mut self, entries: &[TranslationEntry]) -> usize;

    /// `slot` has just been filled with `entry`.
    fn on_fill(&mut self, slot: usize, entry: &mut TranslationEntry, now: u64);

    /// Every slot has been invalidated.
    fn on_flush(&mut self);
}

/// Evicts the slot filled longest ago.
#[derive(Debug, Default, Clone)]
pub struct FifoPolicy {
    order: VecDeque<usize>,
}

impl TlbPolicy for FifoPolicy {
    fn choose_victim(&mut self, _entries: &[TranslationEntry]) -> usize {
        self.order.pop_front().unwrap_or(0)
    }

    fn on_fill(&mut self, slot: usize, _entry: &mut TranslationEntry, _now: u64) {
        self.order.retain(|&s| s != slot);
        self.order.push_back(slot);
    }

    fn on_flush(&mut self) {
        self.order.clear();
    }
}

/// Evicts the slot with the oldest reference among slots used since load.
///
/// Slot 0 is the candidate unless a later used slot is strictly older.
#[derive(Debug, Default, Clone, Copy)]
pub struct LruPolicy;

impl TlbPolicy for LruPolicy {
    fn choose_victim(&mut self, entries: &[TranslationEntry]) -> usize {
        let Some(first) = entries.first() else {
            return 0;
        };
        let mut victim = 0;
        let mut oldest = first.last_use;
        for (slot, entry) in entries.iter().enumerate().skip(1) {
            if entry.flags.used() && entry.last_use < oldest {
                victim = slot;
                oldest = entry.last_use;
            }
        }
        victim
    }

    fn on_fill(&mut self, _slot: usize, entry: &mut TranslationEntry, now: u64) {
        entry.flags.set_used(true);
        entry.last_use = now;
    }

    fn on_flush(&mut self) {}
}

/// Outcome of [`Tlb::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub slot: usize,
    /// The valid entry the new one displaced.
    pub evicted: Option<TranslationEntry>,
}

/// The TLB slots and their replacement policy.
#[derive(Debug)]
pub struct Tlb {
    entries: Vec<TranslationEntry>,
    policy: Box<dyn TlbPolicy>,
}

impl Tlb {
    #[must_use]
    pub fn new(size: usize, kind: TlbPolicyKind) -> Self {
        let policy: Box<dyn TlbPolicy> = match kind {
            TlbPolicyKind::Fifo => Box::new(FifoPolicy::default()),
            TlbPolicyKind::Lru => Box::new(LruPolicy),
        };
        Self::with_policy(size, policy)
    }

    #[must_use]
    pub fn with_policy(size: usize, policy: Box<dyn TlbPolicy>) -> Self {
        Self {
            entries: vec![TranslationEntry::default(); size],
            policy,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    /// Valid slot caching `vpn`.
    #[must_use]
    pub fn find(&self, vpn: VirtualPage) -> Option<&TranslationEntry> {
        self.entries
            .iter()
            .find(|e| e.is_valid() && e.virtual_page == vpn)
    }

    pub fn find_mut(&mut self, vpn: VirtualPage) -> Option<&mut TranslationEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.is_valid() && e.virtual_page == vpn)
    }

    /// Index of the valid slot caching `vpn`.
    #[must_use]
    pub fn slot_of(&self, vpn: VirtualPage) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.is_valid() && e.virtual_page == vpn)
    }

    /// The lowest invalid slot, or the policy's victim.
    fn choose_slot(&mut self) -> usize {
        match self.entries.iter().position(|e| !e.is_valid()) {
            Some(slot) => slot,
            None => self.policy.choose_victim(&self.entries) % self.entries.len(),
        }
    }

    /// Caches `entry` in a free slot or the policy's victim.
    ///
    /// Returns `None` without caching if the TLB has no slots.
    pub fn install(&mut self, mut entry: TranslationEntry, now: u64) -> Option<Fill> {
        if self.entries.is_empty() {
            return None;
        }
        let slot = self.choose_slot();
        self.policy.on_fill(slot, &mut entry, now);
        let old = core::mem::replace(&mut self.entries[slot], entry);
        Some(Fill {
            slot,
            evicted: old.is_valid().then_some(old),
        })
    }

    /// Overwrites `slot` directly, bypassing the policy.
    pub fn set(&mut self, slot: usize, entry: TranslationEntry) {
        if let Some(e) = self.entries.get_mut(slot) {
            *e = entry;
        }
    }

    /// Drops the cached mapping of `vpn` in `owner`, returning it.
    pub fn invalidate(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<TranslationEntry> {
        let e = self.entries.iter_mut().find(|e| e.maps(owner, vpn))?;
        let copy = *e;
        e.invalidate();
        Some(copy)
    }

    /// Drops every cached mapping of `owner`.
    pub fn invalidate_owner(&mut self, owner: SpaceId) {
        for e in self
            .entries
            .iter_mut()
            .filter(|e| e.is_valid() && e.owner == Some(owner))
        {
            e.invalidate();
        }
    }

    /// Invalidates every slot, returning the entries that were valid.
    pub fn flush(&mut self) -> Vec<TranslationEntry> {
        let valid = self.entries.iter().filter(|e| e.is_valid()).copied().collect();
        for e in &mut self.entries {
            e.invalidate();
        }
        self.policy.on_flush();
        valid
    }
}
