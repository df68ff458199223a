//! # Demand Paging
//!
//! Pages enter memory only when first touched. A page fault loads the page
//! from its space's swap store into a free frame, evicting the least
//! recently used page first when no frame is available.
//!
//! ```text
//! page fault on (space, vpn)
//!      │
//!      ├── eviction needed? ──► page_swap: sync TLB, pick LRU victim,
//!      │                         write back if dirty, free its frame
//!      ▼
//! allocate frame ──► read page from swap ──► map (valid, used, clean)
//!      │
//!      ▼
//! refill the TLB
//! ```
//!
//! The victim is chosen among all resident pages with an inverted page
//! table, and among the faulting space's pages with linear tables.

use crate::error::KernelError;
use crate::kernel::Kernel;
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_vmem::{ExceptionType, SpaceId, TranslationEntry};
use log::{debug, trace};

impl Kernel {
    /// Loads the page containing `va` into memory for the running space
    /// and caches its translation in the TLB.
    ///
    /// # Errors
    /// [`ExceptionType::AddressError`] as a [`KernelError::Fault`] if `va`
    /// lies outside the space; swap and bookkeeping failures otherwise.
    pub fn page_load(&mut self, va: VirtualAddress) -> Result<PhysicalFrame, KernelError> {
        let owner = self.current()?;
        let vpn = va.page();
        let pages = self.space(owner)?.num_pages();
        if vpn.index() >= pages {
            return Err(KernelError::Fault {
                space: owner,
                address: va,
                kind: ExceptionType::AddressError,
            });
        }
        let resident = self
            .machine
            .mmu
            .mapping()
            .lookup(owner, vpn)
            .map(|e| e.physical_frame);
        if let Some(frame) = resident {
            self.refill(owner, va)?;
            return Ok(frame);
        }

        if self
            .machine
            .mmu
            .mapping()
            .needs_eviction(owner, self.machine.frames.num_free())
        {
            self.page_swap(owner)?;
        }
        let frame = self
            .machine
            .frames
            .alloc_frame()
            .ok_or(KernelError::NoFreeFrame)?;

        if let Err(e) = self.fill_frame(owner, vpn, frame) {
            self.machine.frames.free_frame(frame)?;
            return Err(e);
        }
        let now = self.machine.now();
        self.machine
            .mmu
            .map(TranslationEntry::resident(owner, vpn, frame, now))?;

        self.space_mut(owner)?.page_fault_count += 1;
        self.machine.stats.page_faults += 1;
        debug!("loaded {vpn} of {owner} into frame {frame}");

        self.refill(owner, va)?;
        Ok(frame)
    }

    fn fill_frame(
        &mut self,
        owner: SpaceId,
        vpn: VirtualPage,
        frame: PhysicalFrame,
    ) -> Result<(), KernelError> {
        let bytes = self.machine.memory.frame_mut(frame)?;
        let space = self
            .spaces
            .get_mut(&owner)
            .ok_or(KernelError::UnknownSpace(owner))?;
        space.swap_mut().read_page(vpn, bytes)?;
        Ok(())
    }

    /// Evicts the least recently used page that may make room for a page of
    /// `owner`, returning the frame it freed.
    ///
    /// TLB reference state is merged into the page table before the victim
    /// is chosen. A dirty victim is written to its owner's swap store.
    ///
    /// # Errors
    /// [`KernelError::NoVictim`] if no page may be evicted; swap failures.
    pub fn page_swap(&mut self, owner: SpaceId) -> Result<PhysicalFrame, KernelError> {
        let victim = self
            .machine
            .mmu
            .select_victim(owner)
            .ok_or(KernelError::NoVictim(owner))?;
        let victim_owner = victim.owner.ok_or(KernelError::NoVictim(owner))?;
        let (vpn, frame) = (victim.virtual_page, victim.physical_frame);

        if victim.is_dirty() {
            let bytes = self.machine.memory.frame(frame)?;
            let space = self
                .spaces
                .get_mut(&victim_owner)
                .ok_or(KernelError::UnknownSpace(victim_owner))?;
            space.swap_mut().write_page(vpn, bytes)?;
            self.machine.stats.write_backs += 1;
            trace!("wrote {vpn} of {victim_owner} back to swap");
        }

        self.machine.mmu.evict(victim_owner, vpn);
        self.machine.memory.frame_mut(frame)?.fill(0);
        self.machine.frames.free_frame(frame)?;
        self.machine.stats.evictions += 1;
        Ok(frame)
    }

    /// Caches the translation of `va` for the running space in the TLB.
    ///
    /// # Errors
    /// [`ExceptionType::PageFault`] as a [`KernelError::Fault`] if the page
    /// is not resident.
    pub fn tlb_load(&mut self, va: VirtualAddress) -> Result<(), KernelError> {
        let owner = self.current()?;
        self.refill(owner, va)
    }

    pub(crate) fn refill(&mut self, owner: SpaceId, va: VirtualAddress) -> Result<(), KernelError> {
        let now = self.machine.now();
        let slot = self
            .machine
            .mmu
            .refill_tlb(owner, va.page(), now)
            .map_err(|kind| KernelError::Fault {
                space: owner,
                address: va,
                kind,
            })?;
        trace!("TLB slot {slot} now maps {}", va.page());
        Ok(())
    }
}
