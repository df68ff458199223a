use super::{MappingError, PageMapping, least_recently_used};
use crate::entry::{SpaceId, TranslationEntry};
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::config::PageTableKind;
use kernel_memory_addresses::{PhysicalFrame, VirtualPage};

/// One entry per physical frame, tagged with the owning space.
///
/// Lookups scan all frames for a valid entry matching `(owner, vpn)`.
/// Victims are chosen across every space.
#[derive(Debug, Clone)]
pub struct InvertedPageTable {
    frames: Vec<TranslationEntry>,
    spaces: BTreeMap<SpaceId, usize>,
}

impl InvertedPageTable {
    #[must_use]
    pub fn new(num_frames: usize) -> Self {
        let frames = (0..num_frames)
            .map(|i| TranslationEntry {
                physical_frame: PhysicalFrame::new(u32::try_from(i).unwrap_or(u32::MAX)),
                ..TranslationEntry::default()
            })
            .collect();
        Self {
            frames,
            spaces: BTreeMap::new(),
        }
    }

    /// The entry describing `frame`.
    #[must_use]
    pub fn frame(&self, frame: PhysicalFrame) -> Option<&TranslationEntry> {
        self.frames.get(frame.index())
    }
}

impl PageMapping for InvertedPageTable {
    fn register(&mut self, owner: SpaceId, num_pages: usize) -> Result<(), MappingError> {
        if self.spaces.contains_key(&owner) {
            return Err(MappingError::AlreadyRegistered(owner));
        }
        self.spaces.insert(owner, num_pages);
        Ok(())
    }

    fn unregister(&mut self, owner: SpaceId) -> Vec<TranslationEntry> {
        self.spaces.remove(&owner);
        let mut released = vec![];
        for entry in self
            .frames
            .iter_mut()
            .filter(|e| e.is_valid() && e.owner == Some(owner))
        {
            released.push(*entry);
            entry.invalidate();
        }
        released
    }

    fn num_pages(&self, owner: SpaceId) -> Option<usize> {
        self.spaces.get(&owner).copied()
    }

    fn lookup(&self, owner: SpaceId, vpn: VirtualPage) -> Option<&TranslationEntry> {
        self.frames.iter().find(|e| e.maps(owner, vpn))
    }

    fn lookup_mut(&mut self, owner: SpaceId, vpn: VirtualPage) -> Option<&mut TranslationEntry> {
        self.frames.iter_mut().find(|e| e.maps(owner, vpn))
    }

    fn insert(&mut self, entry: TranslationEntry) -> Result<(), MappingError> {
        let owner = entry.owner.ok_or(MappingError::NoOwner)?;
        let pages = self
            .num_pages(owner)
            .ok_or(MappingError::UnknownSpace(owner))?;
        if entry.virtual_page.index() >= pages {
            return Err(MappingError::PageOutOfRange {
                vpn: entry.virtual_page,
                pages,
            });
        }
        if self.lookup(owner, entry.virtual_page).is_some() {
            return Err(MappingError::AlreadyMapped {
                owner,
                vpn: entry.virtual_page,
            });
        }
        let frames = self.frames.len();
        let slot = self
            .frames
            .get_mut(entry.physical_frame.index())
            .ok_or(MappingError::FrameOutOfRange {
                frame: entry.physical_frame,
                frames,
            })?;
        if slot.is_valid() {
            return Err(MappingError::FrameInUse(entry.physical_frame));
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

    fn scan_for_victim(&self, _owner: SpaceId) -> Option<TranslationEntry> {
        least_recently_used(self.frames.iter()).copied()
    }

    fn needs_eviction(&self, _owner: SpaceId, free_frames: usize) -> bool {
        free_frames == 0
    }

    fn resident_count(&self, owner: SpaceId) -> usize {
        self.frames
            .iter()
            .filter(|e| e.is_valid() && e.owner == Some(owner))
            .count()
    }

    fn kind(&self) -> PageTableKind {
        PageTableKind::Inverted
    }
}
