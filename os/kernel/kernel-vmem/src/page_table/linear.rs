use super::{MappingError, PageMapping, least_recently_used};
use crate::entry::{SpaceId, TranslationEntry};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use kernel_info::config::PageTableKind;
use kernel_memory_addresses::VirtualPage;

/// One table per address space, indexed by virtual page number.
///
/// Each space may keep at most `max_resident` pages in memory; victims are
/// always chosen from the space that needs the frame.
#[derive(Debug, Clone)]
pub struct LinearPageTable {
    tables: BTreeMap<SpaceId, Vec<TranslationEntry>>,
    max_resident: usize,
}

impl LinearPageTable {
    #[must_use]
    pub const fn new(max_resident: usize) -> Self {
        Self {
            tables: BTreeMap::new(),
            max_resident,
        }
    }

    #[inline]
    #[must_use]
    pub const fn max_resident(&self) -> usize {
        self.max_resident
    }
}

impl PageMapping for LinearPageTable {
    fn register(&mut self, owner: SpaceId, num_pages: usize) -> Result<(), MappingError> {
        if self.tables.contains_key(&owner) {
            return Err(MappingError::AlreadyRegistered(owner));
        }
        let table = (0..num_pages)
            .map(|vpn| TranslationEntry {
                virtual_page: VirtualPage::new(u32::try_from(vpn).unwrap_or(u32::MAX)),
                owner: Some(owner),
                ..TranslationEntry::default()
            })
            .collect();
        self.tables.insert(owner, table);
        Ok(())
    }

    fn unregister(&mut self, owner: SpaceId) -> Vec<TranslationEntry> {
        self.tables
            .remove(&owner)
            .map(|table| table.into_iter().filter(TranslationEntry::is_valid).collect())
            .unwrap_or_default()
    }

    fn num_pages(&self, owner: SpaceId) -> Option<usize> {
        self.tables.get(&owner).map(Vec::len)
    }

    fn lookup(&self, owner: SpaceId, vpn: VirtualPage) -> Option<&TranslationEntry> {
        self.tables
            .get(&owner)?
            .get(vpn.index())
            .filter(|e| e.is_valid())
    }

    fn lookup_mut(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<&mut TranslationEntry> {
        self.tables
            .get_mut(&owner)?
            .get_mut(vpn.index())
            .filter(|e| e.is_valid())
    }

    fn insert(&mut self, entry: TranslationEntry) -> Result<(), MappingError> {
        let owner = entry.owner.ok_or(MappingError::NoOwner)?;
        let table = self
            .tables
            .get_mut(&owner)
            .ok_or(MappingError::UnknownSpace(owner))?;
        let pages = table.len();
        let slot = table
            .get_mut(entry.virtual_page.index())
            .ok_or(MappingError::PageOutOfRange {
                vpn: entry.virtual_page,
                pages,
            })?;
        if slot.is_valid() {
            return Err(MappingError::AlreadyMapped {
                owner,
                vpn: entry.virtual_page,
            });
        }
        *slot = entry;
        Ok(())
    }

    fn invalidate(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<TranslationEntry> {
        let entry = self.lookup_mut(owner, vpn)?;
        let last = *entry;
        entry.invalidate();
        Some(last)
    }

    fn scan_for_victim(&self, owner: SpaceId) -> Option<TranslationEntry> {
        least_recently_used(self.tables.get(&owner)?.iter()).copied()
    }

    fn needs_eviction(&self, owner: SpaceId, free_frames: usize) -> bool {
        free_frames == 0 || self.resident_count(owner) >= self.max_resident
    }

    fn resident_count(&self, owner: SpaceId) -> usize {
        self.tables
            .get(&owner)
            .map_or(0, |t| t.iter().filter(|e| e.is_valid()).count())
    }

    fn kind(&self) -> PageTableKind {
        PageTableKind::Linear {
            max_resident: self.max_resident,
        }
    }
}
